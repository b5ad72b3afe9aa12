// [libs/infra/db/src/client.rs]
/*!
 * =================================================================
 * APARATO: LEDGER CONNECTION CLIENT (V5.2 - MEMORY ANCHORED)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GESTIÓN DE ENLACES CORTOS Y MIGRACIÓN AL ARRANQUE
 *
 * VISION HIPER-HOLÍSTICA:
 * El host gestionado corta conexiones ociosas (> ~60 s), por eso la
 * política del pipeline es una conexión fresca por volcado y jamás
 * una conexión viva a lo largo de un lote completo. En modo RAM el
 * cliente detecta URLs de memoria y abre el ancla de persistencia
 * ANTES del bootstrap del esquema, para que las tablas residan en el
 * segmento de memoria compartido entre conexiones.
 * =================================================================
 */

use crate::errors::DbError;
use crate::schema::apply_catastral_schema;
use libsql::{Builder, Connection, Database};
use std::sync::Arc;
use tracing::{error, info, instrument};

#[derive(Clone)]
pub struct LedgerClient {
    internal_database_driver: Arc<Database>,
    /// Mantiene viva la base en memoria evitando que SQLite la purgue.
    _memory_persistence_anchor: Option<Arc<Connection>>,
}

impl LedgerClient {
    #[instrument(skip(database_access_token))]
    pub async fn connect(
        database_connection_url: &str,
        database_access_token: Option<String>,
    ) -> Result<Self, DbError> {
        if database_connection_url.is_empty() {
            return Err(DbError::ConfigurationError("DATABASE_URL_UNDEFINED".into()));
        }

        info!("🔌 [LEDGER]: Initiating link synchronization to [{}]", database_connection_url);

        let is_remote = database_connection_url.starts_with("libsql://")
            || database_connection_url.starts_with("https://");

        let is_memory = database_connection_url.contains(":memory:")
            || database_connection_url.contains("mode=memory");

        let database_driver = if is_remote {
            let token = database_access_token.ok_or_else(|| {
                DbError::ConfigurationError("Remote access denied (token missing)".into())
            })?;
            Builder::new_remote(database_connection_url.to_string(), token).build().await
        } else {
            Builder::new_local(database_connection_url).build().await
        }.map_err(|fault| DbError::ConnectionError(format!("DRIVER_IGNITION_FAILURE: {fault}")))?;

        let shared_driver = Arc::new(database_driver);
        let mut anchor = None;

        if is_memory {
            // El ancla se abre ANTES de cualquier otra operación.
            let anchor_connection = shared_driver.connect()
                .map_err(|fault| DbError::ConnectionError(format!("ANCHOR_FAULT: {fault}")))?;

            apply_catastral_schema(&anchor_connection).await
                .map_err(|fault| DbError::ConnectionError(format!("SCHEMA_SYNC_FAULT: {fault}")))?;

            anchor = Some(Arc::new(anchor_connection));
            info!("⚓ [LEDGER]: Memory strata solidified and anchored.");
        } else {
            // En modo disco/remoto, una conexión temporal hace el bootstrap.
            let bootstrap_connection = shared_driver.connect()
                .map_err(|fault| DbError::ConnectionError(format!("BOOTSTRAP_LINK_FAULT: {fault}")))?;
            apply_catastral_schema(&bootstrap_connection).await
                .map_err(|fault| DbError::ConnectionError(format!("SCHEMA_SYNC_FAULT: {fault}")))?;
        }

        Ok(Self {
            internal_database_driver: shared_driver,
            _memory_persistence_anchor: anchor,
        })
    }

    /// Conexión fresca de vida corta: una por volcado, liberada en
    /// toda ruta de salida (incluidos los errores).
    pub fn fresh_connection(&self) -> Result<Connection, DbError> {
        self.internal_database_driver.connect().map_err(|fault| {
            error!("⚠️ [LEDGER_FAULT]: Connection allocation failed: {fault}");
            DbError::ConnectionError(fault.to_string())
        })
    }
}
