// [apps/orchestrator/src/kernel.rs]
/**
 * =================================================================
 * APARATO: ORCHESTRATOR SOVEREIGN KERNEL (V5.3 - GUARD ACTIVE)
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L1-APP)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN SEGURA
 *
 * VISION HIPER-HOLÍSTICA:
 * Placa base donde se conectan el ledger catastral (las migraciones
 * idempotentes corren al conectar, ANTES de abrir el socket) y el
 * registro único de clientes remotos; después levanta el transporte
 * HTTP de Axum.
 * =================================================================
 */

use crate::routes::create_sovereign_router;
use crate::state::AppState;
use catastro_infra_db::LedgerClient;
use catastro_infra_remote::RemoteSourceRegistry;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{error, info, instrument};

pub struct OrchestratorKernel {
    pub server_network_port: u16,
    pub application_shared_state: AppState,
}

impl OrchestratorKernel {
    /**
     * Ignición del ledger y del registro remoto. La conexión aplica
     * los grupos de migración (catálogo de columnas primero) antes
     * de que cualquier handler quede expuesto.
     */
    #[instrument(skip(database_access_token))]
    pub async fn ignite(
        database_connection_url: &str,
        database_access_token: Option<String>,
        listening_port: u16,
    ) -> Self {
        let ledger = LedgerClient::connect(database_connection_url, database_access_token)
            .await
            .expect("FATAL: Ledger link collapse. Ignition aborted.");

        let remotes = Arc::new(
            RemoteSourceRegistry::provision_from_env()
                .expect("FATAL: Remote source registry provisioning failed."),
        );

        Self {
            server_network_port: listening_port,
            application_shared_state: AppState::new(ledger, remotes),
        }
    }

    /// Levanta el transporte HTTP (Axum) y bloquea hasta el colapso.
    pub async fn launch_sovereign_operations(self) {
        let sovereign_router = create_sovereign_router(self.application_shared_state);

        let bind_address = SocketAddr::new(
            "0.0.0.0".parse::<IpAddr>().expect("static address"),
            self.server_network_port,
        );

        info!("🚀 [KERNEL_ONLINE]: Catastro query surface listening at {bind_address}");

        let tcp_listener = tokio::net::TcpListener::bind(bind_address)
            .await
            .expect("CRITICAL_FAULT: Failed to bind network port.");

        if let Err(server_error) = axum::serve(tcp_listener, sovereign_router).await {
            error!("💀 [KERNEL_COLLAPSE]: Runtime failure: {server_error}");
            std::process::exit(1);
        }
    }
}
