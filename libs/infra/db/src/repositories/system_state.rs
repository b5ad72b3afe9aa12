// [libs/infra/db/src/repositories/system_state.rs]
// =================================================================
// APARATO: SYSTEM STATE REPOSITORY (V5.0)
// RESPONSABILIDAD: MARCADORES OPERACIONALES PERSISTENTES
// =================================================================

use crate::client::LedgerClient;
use crate::errors::DbError;
use libsql::params;

/// Llave del consumo mensual de la cuota satelital.
pub const SATELLITE_MONTHLY_CONSUMPTION_KEY: &str = "satellite_monthly_consumption";

pub struct SystemStateRepository {
    ledger: LedgerClient,
}

impl SystemStateRepository {
    pub fn new(ledger: LedgerClient) -> Self {
        Self { ledger }
    }

    pub async fn read_marker(&self, marker_key: &str) -> Result<Option<i64>, DbError> {
        let connection = self.ledger.fresh_connection()?;
        let mut rows = connection.query(
            "SELECT value_int FROM system_state WHERE key = ?1",
            params![marker_key.to_string()],
        ).await?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<Option<i64>>(0).ok().flatten()),
            None => Ok(None),
        }
    }

    pub async fn seal_marker(&self, marker_key: &str, marker_value: i64) -> Result<(), DbError> {
        let connection = self.ledger.fresh_connection()?;
        connection.execute(
            "INSERT INTO system_state (key, value_int, updated_at)
             VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET
                value_int = excluded.value_int,
                updated_at = CURRENT_TIMESTAMP",
            params![marker_key.to_string(), marker_value],
        ).await?;
        Ok(())
    }
}
