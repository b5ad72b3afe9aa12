// [apps/field-scanner/src/passes/sentinel_enrichment.rs]
/*!
 * =================================================================
 * APARATO: SENTINEL ENRICHMENT PASS (V5.4 - PASE 1.5B)
 * CLASIFICACIÓN: BATCH ENGINE (ESTRATO L5)
 * RESPONSABILIDAD: ENRIQUECIMIENTO SATELITAL DE PARCELAS MARCADAS
 *
 * VISION HIPER-HOLÍSTICA:
 * Selección restringida a `sentinel_worthy = true` sin enriquecer.
 * El acelerador adaptativo vive dentro del cliente satelital
 * (presupuesto de 300 req/min); cuando el primario retorna vacío
 * para un punto, el respaldo gratuito toma el relevo. Escribe las
 * columnas `sentinel_*` y avanza `scan_pass` a 2 (el invariante
 * `scan_pass ≥ 2 ⇒ sentinel_scan_date` se sella en la misma fila).
 * =================================================================
 */

use crate::{scan_date_today, PassContext, CHUNK_COMMIT_SIZE};
use anyhow::{bail, Result};
use catastro_domain_models::{BatchSummary, ParcelIdentity, SentinelBand};
use catastro_domain_scoring::monthly_trend;
use catastro_infra_db::repositories::{
    ParcelRepository, SystemStateRepository, SATELLITE_MONTHLY_CONSUMPTION_KEY,
};
use catastro_infra_remote::{MonthlyNdvi, RemoteError};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, instrument, warn};

/// Meses de historia solicitados al endpoint estadístico.
const SENTINEL_HISTORY_MONTHS: u32 = 24;

pub struct SentinelEnrichmentPass {
    context: PassContext,
}

impl SentinelEnrichmentPass {
    pub fn new(context: PassContext) -> Self {
        Self { context }
    }

    #[instrument(skip(self))]
    pub async fn execute(&self, batch_limit: usize) -> Result<BatchSummary> {
        let repository = ParcelRepository::new(self.context.ledger.clone());
        let system_state = SystemStateRepository::new(self.context.ledger.clone());

        // Siembra del presupuesto mensual desde el marcador persistente.
        if let Some(satellite) = &self.context.remotes.satellite {
            let already_consumed = system_state
                .read_marker(SATELLITE_MONTHLY_CONSUMPTION_KEY).await?
                .unwrap_or(0);
            satellite.seed_monthly_consumption(already_consumed.max(0) as u32);
        }

        let candidates = repository.select_sentinel_candidates(batch_limit).await?;
        if candidates.is_empty() {
            info!("⚪ [PASS_1_5B]: No sentinel-worthy parcels awaiting enrichment.");
            return Ok(BatchSummary::default());
        }

        info!("🛰️ [PASS_1_5B]: Enriching {} sentinel-worthy parcel(s).", candidates.len());
        let progress = ProgressBar::new(candidates.len() as u64);
        progress.set_style(ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len}"
        ).expect("static template"));

        let scan_date = scan_date_today();
        let mut summary = BatchSummary::default();
        let mut pending_bands: Vec<(ParcelIdentity, SentinelBand)> = Vec::with_capacity(CHUNK_COMMIT_SIZE);

        for parcel in candidates {
            progress.inc(1);

            match self.acquire_monthly_series(parcel.latitude, parcel.longitude).await {
                Ok((monthly_series, source_tag)) => {
                    let band = compose_sentinel_band(&monthly_series, source_tag, &scan_date);
                    pending_bands.push((parcel.identity, band));
                }
                // Presupuesto agotado o credencial muerta: el pase se
                // detiene ordenadamente (accionable por el operador).
                Err(fault @ RemoteError::QuotaExhausted(_))
                | Err(fault @ RemoteError::AuthenticationExpired) => {
                    summary.scanned += repository.persist_sentinel_band(&pending_bands).await? as u64;
                    self.seal_consumption_marker(&system_state).await;
                    bail!("PASS_1_5B_HALTED: {fault}");
                }
                Err(fault) => {
                    summary.errors += 1;
                    if let Err(record_fault) = repository
                        .record_scan_error(&parcel.identity, fault.parcel_error_code(), &scan_date)
                        .await
                    {
                        warn!("⚠️ [PASS_1_5B]: Error column write bypassed: {record_fault}");
                    }
                }
            }

            if pending_bands.len() >= CHUNK_COMMIT_SIZE {
                summary.scanned += repository.persist_sentinel_band(&pending_bands).await? as u64;
                pending_bands.clear();
            }

            if self.context.is_cancelled() {
                warn!("🛑 [PASS_1_5B]: Cooperative cancellation requested.");
                break;
            }
        }

        summary.scanned += repository.persist_sentinel_band(&pending_bands).await? as u64;
        progress.finish_and_clear();
        self.seal_consumption_marker(&system_state).await;

        info!("✅ [PASS_1_5B]: Batch verdict: {summary}");
        Ok(summary)
    }

    /// Serie mensual: primario con cuota cuando existe; respaldo
    /// gratuito cuando el primario retorna vacío o no está aprovisionado.
    async fn acquire_monthly_series(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<(Vec<MonthlyNdvi>, &'static str), RemoteError> {
        if let Some(satellite) = &self.context.remotes.satellite {
            let primary_series = satellite
                .monthly_mean_ndvi(latitude, longitude, SENTINEL_HISTORY_MONTHS)
                .await?;
            if !primary_series.is_empty() {
                return Ok((primary_series, "sentinel"));
            }
            info!("🛟 [PASS_1_5B]: Primary returned empty for ({latitude:.4}, {longitude:.4}). Falling back.");
        }

        let fallback_series = self.context.remotes.satellite_fallback
            .monthly_mean_ndvi(latitude, longitude)
            .await?;
        Ok((fallback_series, "sentinel_fallback"))
    }

    async fn seal_consumption_marker(&self, system_state: &SystemStateRepository) {
        if let Some(satellite) = &self.context.remotes.satellite {
            if let Err(marker_fault) = system_state
                .seal_marker(SATELLITE_MONTHLY_CONSUMPTION_KEY, i64::from(satellite.monthly_consumed()))
                .await
            {
                warn!("⚠️ [PASS_1_5B]: Consumption marker seal bypassed: {marker_fault}");
            }
        }
    }
}

/// Composición pura de la banda satelital desde la serie mensual.
pub fn compose_sentinel_band(
    monthly_series: &[MonthlyNdvi],
    source_tag: &str,
    scan_date: &str,
) -> SentinelBand {
    let means: Vec<f64> = monthly_series.iter().map(|entry| entry.mean).collect();
    let (trend, slope) = monthly_trend(&means);

    let ndvi_mean = if means.is_empty() {
        None
    } else {
        Some(means.iter().sum::<f64>() / means.len() as f64)
    };

    SentinelBand {
        trend,
        slope,
        ndvi_latest: means.last().copied(),
        month_count: means.len() as i64,
        ndvi_mean,
        source: source_tag.to_string(),
        // El render de gráficos vive en el almacén de objetos externo;
        // sin artefacto no hay URL.
        chart_url: None,
        scan_date: scan_date.to_string(),
    }
}
