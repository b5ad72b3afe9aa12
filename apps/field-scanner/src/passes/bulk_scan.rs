// [apps/field-scanner/src/passes/bulk_scan.rs]
/*!
 * =================================================================
 * APARATO: BULK SCAN PASS (V5.5 - PASE 1)
 * CLASIFICACIÓN: BATCH ENGINE (ESTRATO L5)
 * RESPONSABILIDAD: NDVI MASIVO + ZONA DE INUNDACIÓN (10 WORKERS)
 *
 * VISION HIPER-HOLÍSTICA:
 * Selecciona parcelas con coordenadas aún no escaneadas a pase ≥ 1
 * y las procesa con 10 workers paralelos sobre UNA sesión HTTP
 * compartida (segura para GETs concurrentes). Por parcela: variante
 * aérea rápida + capa de inundación, evaluadores, puntaje de
 * deterioro y la marca `sentinel_worthy`. Rendimiento objetivo
 * ≈ 10 parcelas/s.
 * =================================================================
 */

use crate::{scan_date_today, PassContext, CHUNK_COMMIT_SIZE};
use anyhow::Result;
use catastro_domain_evaluators::{bundle_diagnostics, evaluate_all};
use catastro_domain_models::{
    BatchSummary, BulkScanBand, EvidenceBundle, FlagSheet, FloodDetermination,
    NdviCategory, NdviReading, NdviSource, ParcelIdentity, ParcelWorkItem,
};
use catastro_domain_scoring::weighted_distress_score;
use catastro_infra_db::repositories::ParcelRepository;
use catastro_infra_remote::RemoteError;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, instrument, warn};

/// Abanico de workers del Pase 1.
const BULK_WORKER_COUNT: usize = 10;

/// Umbral de puntaje que marca una parcela como digna de
/// enriquecimiento satelital (además del abandono vegetal).
pub const SENTINEL_WORTHY_THRESHOLD: f64 = 2.0;

/// Resultado por parcela del pipeline del Pase 1.
enum ParcelOutcome {
    Banded(ParcelIdentity, BulkScanBand),
    Faulted(ParcelIdentity, &'static str),
}

pub struct BulkScanPass {
    context: PassContext,
}

impl BulkScanPass {
    pub fn new(context: PassContext) -> Self {
        Self { context }
    }

    #[instrument(skip(self))]
    pub async fn execute(&self, batch_limit: usize) -> Result<BatchSummary> {
        let repository = ParcelRepository::new(self.context.ledger.clone());
        let candidates = repository.select_bulk_candidates(batch_limit).await?;

        if candidates.is_empty() {
            info!("⚪ [PASS_1]: No eligible parcels. Ledger already level.");
            return Ok(BatchSummary::default());
        }

        info!("🛰️ [PASS_1]: Igniting bulk scan over {} parcel(s), {} workers.",
            candidates.len(), BULK_WORKER_COUNT);

        let progress = ProgressBar::new(candidates.len() as u64);
        progress.set_style(ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec})"
        ).expect("static template"));

        let scan_date = scan_date_today();
        let mut summary = BatchSummary::default();
        let mut pending_bands: Vec<(ParcelIdentity, BulkScanBand)> = Vec::with_capacity(CHUNK_COMMIT_SIZE);

        // Abanico: 10 workers compartiendo la sesión HTTP del registro.
        let mut outcome_stream = stream::iter(candidates.into_iter().map(|parcel| {
            let context = self.context.clone();
            let scan_date = scan_date.clone();
            async move { scan_single_parcel(&context, parcel, &scan_date).await }
        }))
        .buffer_unordered(BULK_WORKER_COUNT);

        while let Some(outcome) = outcome_stream.next().await {
            progress.inc(1);

            match outcome {
                ParcelOutcome::Banded(identity, band) => {
                    if band.flags.any_flagged() {
                        summary.flagged += 1;
                    }
                    pending_bands.push((identity, band));
                }
                ParcelOutcome::Faulted(identity, error_code) => {
                    summary.errors += 1;
                    if let Err(record_fault) = repository
                        .record_scan_error(&identity, error_code, &scan_date).await
                    {
                        warn!("⚠️ [PASS_1]: Error column write bypassed for {identity}: {record_fault}");
                    }
                }
            }

            if pending_bands.len() >= CHUNK_COMMIT_SIZE {
                summary.scanned += repository.persist_bulk_band(&pending_bands).await? as u64;
                pending_bands.clear();
            }

            // Cancelación cooperativa: el chunk comprometido queda, el
            // resto del lote se abandona en estado consistente.
            if self.context.is_cancelled() {
                warn!("🛑 [PASS_1]: Cooperative cancellation requested. Flushing tail chunk.");
                break;
            }
        }

        summary.scanned += repository.persist_bulk_band(&pending_bands).await? as u64;
        progress.finish_and_clear();

        info!("✅ [PASS_1]: Batch verdict: {summary}");
        Ok(summary)
    }
}

async fn scan_single_parcel(
    context: &PassContext,
    parcel: ParcelWorkItem,
    scan_date: &str,
) -> ParcelOutcome {
    let (ndvi_verdict, flood_verdict) = tokio::join!(
        context.remotes.aerial.current_ndvi_fast(parcel.latitude, parcel.longitude),
        context.remotes.flood.classify_point(parcel.latitude, parcel.longitude),
    );

    let (aerial_ndvi, ndvi_fault) = match ndvi_verdict {
        Ok(reading) => (reading, None),
        Err(fault) => (None, Some(fault)),
    };
    let (flood, flood_fault): (Option<FloodDetermination>, Option<RemoteError>) = match flood_verdict {
        Ok(determination) => (Some(determination), None),
        Err(fault) => (None, Some(fault)),
    };

    // Ambas fuentes caídas: fallo de parcela, sin avance de pase.
    if let (Some(ndvi_fault), Some(_)) = (&ndvi_fault, &flood_fault) {
        return ParcelOutcome::Faulted(parcel.identity, ndvi_fault.parcel_error_code());
    }

    let evidence = EvidenceBundle {
        aerial_ndvi: aerial_ndvi.map(|value| NdviReading::new(value, NdviSource::Aerial)),
        satellite_ndvi: None,
        historical_baseline: None,
        flood,
        vacancy: None,
    };

    for diagnostic in bundle_diagnostics(&evidence) {
        warn!("🧪 [PASS_1]: {} -> {}", parcel.identity, diagnostic);
    }

    let partial_fault_code = ndvi_fault.as_ref().or(flood_fault.as_ref())
        .map(RemoteError::parcel_error_code);

    let band = compose_bulk_band(&evidence, scan_date, partial_fault_code);
    ParcelOutcome::Banded(parcel.identity, band)
}

/// Composición pura de la banda del Pase 1 desde la evidencia.
pub fn compose_bulk_band(
    evidence: &EvidenceBundle,
    scan_date: &str,
    partial_fault_code: Option<&str>,
) -> BulkScanBand {
    let assessments = evaluate_all(evidence);
    let distress_score = weighted_distress_score(&assessments);
    let flags = FlagSheet::from_assessments(&assessments);

    let current_ndvi = evidence.current_ndvi().map(|reading| reading.value);
    let sentinel_worthy = distress_score >= SENTINEL_WORTHY_THRESHOLD || flags.flag_neglect;

    BulkScanBand {
        ndvi_current: current_ndvi,
        ndvi_category: current_ndvi.map(|value| NdviCategory::from_value(value).as_label().to_string()),
        fema_flood_zone: evidence.flood.as_ref().and_then(|f| f.zone.clone()),
        fema_sfha: evidence.flood.as_ref().map(|f| f.special_hazard).unwrap_or(false),
        fema_risk_tier: evidence.flood.as_ref().map(|f| f.risk).unwrap_or_default(),
        distress_score,
        flags,
        sentinel_worthy,
        scan_date: scan_date.to_string(),
        scan_error: partial_fault_code.map(str::to_string),
    }
}
