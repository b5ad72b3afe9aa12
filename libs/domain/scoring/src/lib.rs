// [libs/domain/scoring/src/lib.rs]
/*!
 * =================================================================
 * APARATO: CATASTRO SCORING ENGINE (V9.0 - GOLD MASTER)
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L2)
 * RESPONSABILIDAD: PUNTUACIÓN DETERMINISTA DEL DETERIORO CATASTRAL
 *
 * VISION HIPER-HOLÍSTICA:
 * Tres puntajes soberanos: el puntaje de deterioro ponderado (tiempo
 * real, por parcela), el compuesto de deterioro (masivo, por condado)
 * y el puntaje de convicción (fusión reponderada con señales de
 * motivación y vacancia postal). Todas las funciones son puras y
 * deterministas: mismos insumos, mismos puntajes bit-perfectos.
 * =================================================================
 */

pub mod distress;
pub mod regression;
pub mod composite;
pub mod conviction;

pub use distress::weighted_distress_score;
pub use regression::{least_squares_slope, monthly_trend, MIN_MONTHS_FOR_TREND};
pub use composite::distress_composite;
pub use conviction::{fuse_conviction, ConvictionInputs, ConvictionVerdict};
