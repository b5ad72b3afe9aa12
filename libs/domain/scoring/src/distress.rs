// [libs/domain/scoring/src/distress.rs]
/*!
 * =================================================================
 * APARATO: WEIGHTED DISTRESS SCORE (V9.0)
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L2)
 * RESPONSABILIDAD: PUNTAJE DE DETERIORO EN TIEMPO REAL POR PARCELA
 * =================================================================
 */

use catastro_domain_models::FlagAssessment;

/// Cota superior del puntaje de deterioro.
pub const DISTRESS_SCORE_CEILING: f64 = 10.0;

/// Puntaje de deterioro ponderado:
/// `score = Σ weight[flag] × confidence[flag]`, sellado a [0, 10].
///
/// Los pesos viven en `DistressFlag::weight()` (overgrowth 2.0,
/// neglect 1.5, flood 1.5, structural 2.5, vacancy 2.5).
pub fn weighted_distress_score(assessments: &[FlagAssessment]) -> f64 {
    let raw_sum: f64 = assessments.iter()
        .map(FlagAssessment::weighted_contribution)
        .sum();

    raw_sum.clamp(0.0, DISTRESS_SCORE_CEILING)
}
