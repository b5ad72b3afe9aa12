// [libs/infra/db/src/lib.rs]
/*!
 * =================================================================
 * APARATO: CATASTRAL LEDGER (V5.6 - GOLD MASTER)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA ACID DEL PIPELINE DE ENRIQUECIMIENTO
 *
 * VISION HIPER-HOLÍSTICA:
 * Migraciones idempotentes que evitan candados, repositorios por
 * banda con avance monotónico de `scan_pass` en SQL, ranking
 * percentil por condado, bitácora de auditoría best-effort y
 * señales de motivación tras la llave compuesta condado+estado.
 * =================================================================
 */

pub mod client;
pub mod errors;
pub mod schema;
pub mod repositories;

pub use client::LedgerClient;
pub use errors::DbError;
pub use schema::apply_catastral_schema;
