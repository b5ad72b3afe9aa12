// [libs/infra/db/src/repositories/motivation.rs]
/*!
 * =================================================================
 * APARATO: MOTIVATION SIGNAL REPOSITORY (V5.4 - COMPOUND KEY)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: LECTURA DE SEÑALES EXTERNAS Y BACKFILL DE PUNTAJES
 *
 * VISION HIPER-HOLÍSTICA:
 * 1. SOLO LECTURA: la tabla `motivation_signals` pertenece al
 *    curador externo; este sistema jamás la muta.
 * 2. LLAVE COMPUESTA: todo join pasa por (county_name, state_code):
 *    `parcel_id` NO es único entre condados (≈1,870 colisiones
 *    observadas) y un join por id pelado fuga señales entre condados.
 * 3. BACKFILL: `motivation_scores` tiene unicidad
 *    (parcel_id, computed_at); la reescritura es DELETE + INSERT
 *    acotado al condado, nunca ON CONFLICT.
 * =================================================================
 */

use crate::client::LedgerClient;
use crate::errors::DbError;
use libsql::params;
use std::collections::HashMap;
use tracing::{info, instrument};

/// Acumulado de señales de motivación de una parcela.
#[derive(Debug, Clone, Default)]
pub struct MotivationRollup {
    /// Suma cruda de confianzas (el `mc_raw` de la fusión).
    pub raw_confidence_sum: f64,
    pub signal_count: i64,
    pub signal_codes: Vec<String>,
}

/// Fila de backfill hacia `motivation_scores`.
#[derive(Debug, Clone)]
pub struct MotivationScoreRow {
    pub parcel_id: String,
    pub mc_score: Option<f64>,
    pub signal_count: i64,
    pub signal_codes: String,
    pub conviction_score: f64,
}

pub struct MotivationRepository {
    ledger: LedgerClient,
}

impl MotivationRepository {
    pub fn new(ledger: LedgerClient) -> Self {
        Self { ledger }
    }

    /// Acumula las señales de un condado, indexadas por `parcel_id`.
    /// El mapa resultante solo es válido DENTRO del condado consultado.
    #[instrument(skip(self))]
    pub async fn county_signal_rollup(
        &self,
        county_name: &str,
        state_code: &str,
    ) -> Result<HashMap<String, MotivationRollup>, DbError> {
        let connection = self.ledger.fresh_connection()?;
        let mut rows = connection.query(
            "SELECT parcel_id, signal_code, confidence
             FROM motivation_signals
             WHERE county_name = ?1 AND state_code = ?2",
            params![county_name.to_string(), state_code.to_string()],
        ).await?;

        let mut rollup: HashMap<String, MotivationRollup> = HashMap::new();
        while let Some(row) = rows.next().await? {
            let parcel_id: String = row.get(0)?;
            let signal_code: String = row.get(1)?;
            let confidence: f64 = row.get(2)?;

            let entry = rollup.entry(parcel_id).or_default();
            entry.raw_confidence_sum += confidence;
            entry.signal_count += 1;
            entry.signal_codes.push(signal_code);
        }

        Ok(rollup)
    }

    /// Backfill de puntajes del condado: DELETE acotado + INSERT.
    /// La unicidad es (parcel_id, computed_at), no parcel_id a secas.
    #[instrument(skip(self, score_rows))]
    pub async fn backfill_scores(
        &self,
        county_name: &str,
        state_code: &str,
        computed_at: &str,
        score_rows: &[MotivationScoreRow],
    ) -> Result<usize, DbError> {
        let connection = self.ledger.fresh_connection()?;
        let transaction = connection.transaction().await?;

        transaction.execute(
            "DELETE FROM motivation_scores
             WHERE county_name = ?1 AND state_code = ?2 AND computed_at = ?3",
            params![county_name.to_string(), state_code.to_string(), computed_at.to_string()],
        ).await?;

        let insert_sql = r#"
            INSERT INTO motivation_scores (
                parcel_id, county_name, state_code, computed_at,
                mc_score, signal_count, signal_codes, conviction_score
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#;

        for score_row in score_rows {
            transaction.execute(insert_sql, params![
                score_row.parcel_id.clone(),
                county_name.to_string(),
                state_code.to_string(),
                computed_at.to_string(),
                score_row.mc_score,
                score_row.signal_count,
                score_row.signal_codes.clone(),
                score_row.conviction_score
            ]).await?;
        }

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;

        info!(
            "🧾 [MOTIVATION]: Backfilled {} score row(s) for {}/{} at {}.",
            score_rows.len(), state_code, county_name, computed_at
        );
        Ok(score_rows.len())
    }
}
