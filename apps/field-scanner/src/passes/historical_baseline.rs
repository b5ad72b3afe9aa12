// [apps/field-scanner/src/passes/historical_baseline.rs]
/*!
 * =================================================================
 * APARATO: HISTORICAL BASELINE PASS (V5.3 - PASE 1.5)
 * CLASIFICACIÓN: BATCH ENGINE (ESTRATO L5)
 * RESPONSABILIDAD: PENDIENTE NDVI QUINQUENAL + COMPUESTO POR CONDADO
 *
 * VISION HIPER-HOLÍSTICA:
 * Las lecturas STAC son pesadas: el barrido es SERIAL, jamás en
 * abanico. Por parcela se registra la pendiente OLS, el conteo de
 * añadas y la amplitud de años. Al cerrar el barrido del condado,
 * UNA transacción SQL computa el percentil de pendiente (ventana de
 * ranking acotada al condado) y el compuesto de deterioro.
 * =================================================================
 */

use crate::{scan_date_today, PassContext, CHUNK_COMMIT_SIZE};
use anyhow::Result;
use catastro_domain_models::{BatchSummary, HistoricalBand, ParcelIdentity};
use catastro_domain_scoring::least_squares_slope;
use catastro_infra_db::repositories::{CompositeRepository, ParcelRepository};
use chrono::Datelike;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, instrument, warn};

pub struct HistoricalBaselinePass {
    context: PassContext,
}

impl HistoricalBaselinePass {
    pub fn new(context: PassContext) -> Self {
        Self { context }
    }

    #[instrument(skip(self))]
    pub async fn execute(
        &self,
        county_name: &str,
        state_code: &str,
        batch_limit: usize,
    ) -> Result<BatchSummary> {
        let repository = ParcelRepository::new(self.context.ledger.clone());
        let composite_repository = CompositeRepository::new(self.context.ledger.clone());

        let candidates = repository
            .select_baseline_candidates(county_name, state_code, batch_limit)
            .await?;

        let mut summary = BatchSummary::default();
        let scan_date = scan_date_today();
        let current_year = chrono::Utc::now().year();

        if candidates.is_empty() {
            info!("⚪ [PASS_1_5]: No baseline candidates for {}/{}.", state_code, county_name);
        } else {
            info!("🗂️ [PASS_1_5]: Serial historical sweep over {} parcel(s).", candidates.len());

            let progress = ProgressBar::new(candidates.len() as u64);
            progress.set_style(ProgressStyle::with_template(
                "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len}"
            ).expect("static template"));

            let mut pending_bands: Vec<(ParcelIdentity, HistoricalBand)> = Vec::with_capacity(CHUNK_COMMIT_SIZE);

            for parcel in candidates {
                progress.inc(1);

                match self.context.remotes.historical
                    .ndvi_vintages(parcel.latitude, parcel.longitude, current_year)
                    .await
                {
                    Ok(series) => {
                        let deduplicated_pairs = series.collect_deduplicated();
                        let band = HistoricalBand {
                            ndvi_slope_5yr: least_squares_slope(&deduplicated_pairs),
                            ndvi_vintage_count: series.vintage_count(),
                            ndvi_year_span: series.year_span(),
                        };
                        pending_bands.push((parcel.identity, band));
                    }
                    Err(fault) => {
                        summary.errors += 1;
                        if let Err(record_fault) = repository
                            .record_scan_error(&parcel.identity, fault.parcel_error_code(), &scan_date)
                            .await
                        {
                            warn!("⚠️ [PASS_1_5]: Error column write bypassed: {record_fault}");
                        }
                    }
                }

                if pending_bands.len() >= CHUNK_COMMIT_SIZE {
                    summary.scanned += repository.persist_historical_band(&pending_bands).await? as u64;
                    pending_bands.clear();
                }

                if self.context.is_cancelled() {
                    warn!("🛑 [PASS_1_5]: Cooperative cancellation requested.");
                    break;
                }
            }

            summary.scanned += repository.persist_historical_band(&pending_bands).await? as u64;
            progress.finish_and_clear();
        }

        // Cierre del condado: percentil + compuesto en UNA transacción.
        let ranked = composite_repository
            .recompute_county_composite(county_name, state_code, &scan_date)
            .await?;
        info!("✅ [PASS_1_5]: {summary}; composite recomputed for {ranked} parcel(s).");

        Ok(summary)
    }
}
