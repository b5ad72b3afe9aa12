// [apps/orchestrator/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ORCHESTRATOR LIBRARY (V5.0)
 * CLASIFICACIÓN: APPLICATION LAYER (ESTRATO L1-APP)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DE LA SUPERFICIE DE CONSULTA
 * =================================================================
 */

pub mod kernel;
pub mod routes;
pub mod state;
pub mod handlers;

pub mod prelude {
    pub use crate::kernel::OrchestratorKernel;
    pub use crate::state::AppState;
}
