// [libs/domain/models/src/lib.rs]
/*!
 * =================================================================
 * APARATO: CATASTRO DOMAIN MODELS (V7.0 - PRODUCTION MASTER)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS SOBERANOS DEL DOMINIO CATASTRAL
 *
 * VISION HIPER-HOLÍSTICA:
 * Fuente única de verdad para las entidades del pipeline de
 * enriquecimiento: identidad de parcela, bandas de escaneo, evidencia
 * multi-fuente, banderas de deterioro y registro de señales.
 * =================================================================
 */

pub mod parcel;
pub mod evidence;
pub mod flags;
pub mod bands;
pub mod signals;
pub mod filters;
pub mod summary;

pub use parcel::{ParcelIdentity, ParcelWorkItem, ParcelAddressCard, VacancyWorkItem};
pub use evidence::{
    EvidenceBundle, NdviReading, NdviSource, NdviCategory,
    FloodDetermination, FloodRiskTier, TrendDirection, VacancyProbe,
};
pub use flags::{DistressFlag, FlagAssessment};
pub use bands::{
    BulkScanBand, FlagSheet, HistoricalBand, SentinelBand,
    VacancyBand, PlanetBand, ConvictionBand,
};
pub use signals::{SignalDefinition, SignalOrigin, signal_weight};
pub use filters::{ParcelQueryFilters, SortColumn};
pub use summary::BatchSummary;
