// [apps/orchestrator/src/handlers/mod.rs]
// =================================================================
// APARATO: HANDLER REGISTRY (V5.0)
// RESPONSABILIDAD: EXPOSICIÓN NOMINAL DE LOS ADAPTADORES DE API
// =================================================================

pub mod parcels;
pub mod scan;

pub use parcels::ParcelQueryHandler;
pub use scan::ScanHandler;
