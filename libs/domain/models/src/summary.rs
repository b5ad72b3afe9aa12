// [libs/domain/models/src/summary.rs]
// =================================================================
// APARATO: BATCH SUMMARY MODEL (V7.0)
// RESPONSABILIDAD: VEREDICTO AGREGADO DE UN PASE POR LOTES
// =================================================================

use serde::{Deserialize, Serialize};

/// Resumen visible al operador de la ejecución de un pase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub scanned: u64,
    pub flagged: u64,
    pub errors: u64,
    pub skipped: u64,
}

impl BatchSummary {
    pub fn absorb(&mut self, other: BatchSummary) {
        self.scanned += other.scanned;
        self.flagged += other.flagged;
        self.errors += other.errors;
        self.skipped += other.skipped;
    }
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "scanned={} flagged={} errors={} skipped={}",
            self.scanned, self.flagged, self.errors, self.skipped
        )
    }
}
