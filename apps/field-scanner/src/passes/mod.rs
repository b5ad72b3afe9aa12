// [apps/field-scanner/src/passes/mod.rs]
// =================================================================
// APARATO: PASS REGISTRY (V5.0)
// RESPONSABILIDAD: EXPOSICIÓN NOMINAL DE LOS PASES DE ENRIQUECIMIENTO
// =================================================================

pub mod bulk_scan;
pub mod historical_baseline;
pub mod sentinel_enrichment;
pub mod vacancy_sweep;
pub mod conviction_fusion;

pub use bulk_scan::BulkScanPass;
pub use historical_baseline::HistoricalBaselinePass;
pub use sentinel_enrichment::SentinelEnrichmentPass;
pub use vacancy_sweep::VacancySweepPass;
pub use conviction_fusion::ConvictionFusionPass;
