// [libs/infra/db/src/repositories/composite.rs]
/*!
 * =================================================================
 * APARATO: COMPOSITE RANKING REPOSITORY (V5.3 - COUNTY SCOPED)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: PERCENTIL DE PENDIENTE Y COMPUESTO EN SQL
 *
 * VISION HIPER-HOLÍSTICA:
 * Tras el barrido histórico de un condado, una ÚNICA transacción
 * SQL computa `ndvi_slope_pctile` con una ventana de ranking
 * percentil acotada a las parcelas del condado con pendiente, y el
 * `distress_composite` con la mezcla 0.70/0.30. El percentil es por
 * población del condado al momento del cómputo, jamás global, y es
 * monótono respecto de la pendiente subyacente.
 * =================================================================
 */

use crate::client::LedgerClient;
use crate::errors::DbError;
use catastro_domain_scoring::composite::{COMPOSITE_FLOOD_WEIGHT, COMPOSITE_SLOPE_WEIGHT};
use libsql::params;
use tracing::{info, instrument};

pub struct CompositeRepository {
    ledger: LedgerClient,
}

impl CompositeRepository {
    pub fn new(ledger: LedgerClient) -> Self {
        Self { ledger }
    }

    /// Recomputa percentil y compuesto para un condado completo en una
    /// sola transacción. `composite_date` llega del orquestador del
    /// pase para que corridas repetidas con los mismos insumos sellen
    /// valores idénticos.
    #[instrument(skip(self))]
    pub async fn recompute_county_composite(
        &self,
        county_name: &str,
        state_code: &str,
        composite_date: &str,
    ) -> Result<u64, DbError> {
        let connection = self.ledger.fresh_connection()?;
        let transaction = connection.transaction().await?;

        // 1. Percentil por ventana de ranking acotada al condado.
        transaction.execute(
            r#"
            UPDATE parcels SET ndvi_slope_pctile = ranked.pctile
            FROM (
                SELECT rowid AS ranked_rowid,
                       PERCENT_RANK() OVER (ORDER BY ndvi_slope_5yr) AS pctile
                FROM parcels
                WHERE county_name = ?1 AND state_code = ?2
                  AND ndvi_slope_5yr IS NOT NULL
            ) AS ranked
            WHERE parcels.rowid = ranked.ranked_rowid
            "#,
            params![county_name.to_string(), state_code.to_string()],
        ).await?;

        // 2. Compuesto: mezcla de percentil y riesgo FEMA normalizado,
        //    escalada a [0, 10].
        let composite_sql = format!(
            r#"
            UPDATE parcels SET
                distress_composite = MIN(10.0, MAX(0.0,
                    ({COMPOSITE_SLOPE_WEIGHT} * ndvi_slope_pctile
                     + {COMPOSITE_FLOOD_WEIGHT} * CASE COALESCE(fema_risk_tier, 'NONE')
                           WHEN 'HIGH' THEN 1.0
                           WHEN 'MODERATE' THEN 0.5
                           WHEN 'LOW' THEN 0.1
                           ELSE 0.0
                       END) * 10.0)),
                composite_date = ?3
            WHERE county_name = ?1 AND state_code = ?2
              AND ndvi_slope_pctile IS NOT NULL
            "#
        );

        let recomputed_rows = transaction.execute(&composite_sql, params![
            county_name.to_string(),
            state_code.to_string(),
            composite_date.to_string()
        ]).await?;

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;

        info!(
            "📊 [COMPOSITE]: County {}/{} re-ranked ({} parcels with composite).",
            state_code, county_name, recomputed_rows
        );
        Ok(recomputed_rows)
    }
}
