// [apps/orchestrator/src/state/mod.rs]
/*!
 * =================================================================
 * APARATO: APPLICATION SHARED STATE (V5.0)
 * CLASIFICACIÓN: APPLICATION LAYER (ESTRATO L1-APP)
 * RESPONSABILIDAD: ESTADO MAESTRO COMPARTIDO DEL ORQUESTADOR
 * =================================================================
 */

use catastro_infra_db::LedgerClient;
use catastro_infra_remote::RemoteSourceRegistry;
use std::sync::Arc;

/// Estado compartido entre handlers: el ledger y el registro único
/// de clientes remotos (los mismos que usan los pases por lotes).
#[derive(Clone)]
pub struct AppState {
    pub ledger: LedgerClient,
    pub remotes: Arc<RemoteSourceRegistry>,
}

impl AppState {
    pub fn new(ledger: LedgerClient, remotes: Arc<RemoteSourceRegistry>) -> Self {
        Self { ledger, remotes }
    }
}
