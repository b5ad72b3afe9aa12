// [apps/field-scanner/src/passes/conviction_fusion.rs]
/*!
 * =================================================================
 * APARATO: CONVICTION FUSION PASS (V5.5 - PASE 2.5)
 * CLASIFICACIÓN: BATCH ENGINE (ESTRATO L5)
 * RESPONSABILIDAD: FUSIÓN REPONDERADA Y BACKFILL DE PUNTAJES
 *
 * VISION HIPER-HOLÍSTICA:
 * Lee el compuesto vigente, las señales de motivación (join por la
 * llave compuesta condado+estado, jamás por parcel_id pelado) y la
 * confianza de vacancia; escribe la banda de convicción y rellena
 * `motivation_scores`. La reescritura del backfill es DELETE +
 * INSERT acotado al condado: la unicidad es (parcel_id,
 * computed_at), no parcel_id a secas.
 * =================================================================
 */

use crate::{scan_date_today, PassContext, CHUNK_COMMIT_SIZE};
use anyhow::Result;
use catastro_domain_models::{BatchSummary, ConvictionBand, ParcelIdentity};
use catastro_domain_scoring::{fuse_conviction, ConvictionInputs};
use catastro_infra_db::repositories::{
    ConvictionCandidate, MotivationRepository, MotivationRollup, MotivationScoreRow,
    ParcelRepository,
};
use tracing::{info, instrument, warn};

pub struct ConvictionFusionPass {
    context: PassContext,
}

impl ConvictionFusionPass {
    pub fn new(context: PassContext) -> Self {
        Self { context }
    }

    #[instrument(skip(self))]
    pub async fn execute(&self, county_name: &str, state_code: &str) -> Result<BatchSummary> {
        let repository = ParcelRepository::new(self.context.ledger.clone());
        let motivation = MotivationRepository::new(self.context.ledger.clone());

        // Join de señales SIEMPRE por condado+estado.
        let signal_rollup = motivation.county_signal_rollup(county_name, state_code).await?;
        let candidates = repository.select_conviction_candidates(county_name, state_code).await?;

        if candidates.is_empty() {
            info!("⚪ [PASS_2_5]: No fusion candidates for {}/{}.", state_code, county_name);
            return Ok(BatchSummary::default());
        }

        info!(
            "⚖️ [PASS_2_5]: Fusing {} parcel(s) against {} signal rollup(s).",
            candidates.len(), signal_rollup.len()
        );

        let conviction_date = scan_date_today();
        let mut summary = BatchSummary::default();
        let mut pending_bands: Vec<(ParcelIdentity, ConvictionBand)> = Vec::with_capacity(CHUNK_COMMIT_SIZE);
        let mut backfill_rows: Vec<MotivationScoreRow> = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let rollup_entry = signal_rollup.get(&candidate.identity.parcel_id);
            let (band, score_row) = compose_conviction_band(&candidate, rollup_entry, &conviction_date);

            if band.conviction_score > 0.0 {
                summary.flagged += 1;
            }
            backfill_rows.push(score_row);
            pending_bands.push((candidate.identity, band));

            if pending_bands.len() >= CHUNK_COMMIT_SIZE {
                summary.scanned += repository.persist_conviction_band(&pending_bands).await? as u64;
                pending_bands.clear();
            }

            if self.context.is_cancelled() {
                warn!("🛑 [PASS_2_5]: Cooperative cancellation requested.");
                break;
            }
        }

        summary.scanned += repository.persist_conviction_band(&pending_bands).await? as u64;

        motivation
            .backfill_scores(county_name, state_code, &conviction_date, &backfill_rows)
            .await?;

        info!("✅ [PASS_2_5]: Batch verdict: {summary}");
        Ok(summary)
    }
}

/// Composición pura de la banda de convicción de una parcela.
pub fn compose_conviction_band(
    candidate: &ConvictionCandidate,
    rollup_entry: Option<&MotivationRollup>,
    conviction_date: &str,
) -> (ConvictionBand, MotivationScoreRow) {
    // mc_raw ausente (no cero) cuando la parcela no tiene señales:
    // la regla reponderada lo excluye del denominador.
    let mc_raw = rollup_entry
        .filter(|entry| entry.signal_count > 0)
        .map(|entry| entry.raw_confidence_sum);

    let signal_count = rollup_entry.map(|entry| entry.signal_count).unwrap_or(0);
    let signal_codes = rollup_entry
        .map(|entry| entry.signal_codes.join(","))
        .unwrap_or_default();

    let inputs = ConvictionInputs {
        distress_composite: candidate.distress_composite,
        mc_raw,
        mc_signal_count: signal_count,
        mc_signal_codes: rollup_entry.map(|entry| entry.signal_codes.clone()).unwrap_or_default(),
        usps_vacant: candidate.usps_vacant,
        vacancy_confidence: candidate.vacancy_confidence,
    };

    let verdict = fuse_conviction(&inputs);
    let components_json = verdict.components_json(&inputs);

    let band = ConvictionBand {
        conviction_score: verdict.score,
        conviction_base_score: verdict.base_score,
        conviction_vacancy_bonus: verdict.vacancy_bonus,
        conviction_mc_score: mc_raw,
        conviction_components: components_json,
        mc_signal_count: signal_count,
        mc_signal_codes: signal_codes.clone(),
        conviction_date: conviction_date.to_string(),
    };

    let score_row = MotivationScoreRow {
        parcel_id: candidate.identity.parcel_id.clone(),
        mc_score: mc_raw,
        signal_count,
        signal_codes,
        conviction_score: verdict.score,
    };

    (band, score_row)
}
