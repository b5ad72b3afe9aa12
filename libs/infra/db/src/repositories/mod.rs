// [libs/infra/db/src/repositories/mod.rs]
// =================================================================
// APARATO: REPOSITORY REGISTRY (V5.0)
// RESPONSABILIDAD: EXPOSICIÓN NOMINAL DE LOS REPOSITORIOS DEL LEDGER
// =================================================================

pub mod parcel;
pub mod composite;
pub mod vacancy_audit;
pub mod motivation;
pub mod system_state;

pub use parcel::{ConvictionCandidate, ParcelRepository, VacancyCandidate};
pub use composite::CompositeRepository;
pub use vacancy_audit::VacancyAuditRepository;
pub use motivation::{MotivationRepository, MotivationRollup, MotivationScoreRow};
pub use system_state::{SystemStateRepository, SATELLITE_MONTHLY_CONSUMPTION_KEY};
