// [apps/field-scanner/src/lib.rs]
/*!
 * =================================================================
 * APARATO: FIELD SCANNER LIBRARY (V5.0 - PASS ORCHESTRATION)
 * CLASIFICACIÓN: BATCH ENGINE (ESTRATO L5)
 * RESPONSABILIDAD: ORQUESTACIÓN DE LOS CINCO PASES DE ENRIQUECIMIENTO
 *
 * VISION HIPER-HOLÍSTICA:
 * Cada pase comparte la misma forma: seleccionar → abanico →
 * pipeline por parcela → persistencia por lotes → avance de pase.
 * Los predicados de selección y las envolventes de concurrencia
 * difieren por pase; todos son independientes, idempotentes y
 * reanudables, con compromisos en chunks pequeños para que una
 * cancelación cooperativa deje el ledger consistente.
 * =================================================================
 */

pub mod passes;

use catastro_infra_db::LedgerClient;
use catastro_infra_remote::RemoteSourceRegistry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Tamaño del chunk de compromiso: una cancelación pierde a lo sumo
/// el chunk en vuelo, jamás la consistencia.
pub const CHUNK_COMMIT_SIZE: usize = 100;

/// Contexto compartido por los pases: ledger, registro de clientes
/// remotos y la bandera de cancelación cooperativa.
#[derive(Clone)]
pub struct PassContext {
    pub ledger: LedgerClient,
    pub remotes: Arc<RemoteSourceRegistry>,
    cancellation_flag: Arc<AtomicBool>,
}

impl PassContext {
    pub fn new(ledger: LedgerClient, remotes: Arc<RemoteSourceRegistry>) -> Self {
        Self {
            ledger,
            remotes,
            cancellation_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Bandera compartida con el manejador de señales del binario.
    pub fn cancellation_handle(&self) -> Arc<AtomicBool> {
        self.cancellation_flag.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_flag.load(Ordering::Relaxed)
    }
}

/// Fecha de escaneo canónica (UTC, `YYYY-MM-DD`), derivada una vez
/// por corrida para que los chunks de un mismo barrido sellen la
/// misma fecha.
pub fn scan_date_today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}
