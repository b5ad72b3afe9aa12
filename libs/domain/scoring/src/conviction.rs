// [libs/domain/scoring/src/conviction.rs]
/*!
 * =================================================================
 * APARATO: CONVICTION FUSION ENGINE (V9.2 - REWEIGHTED MASTER)
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L2)
 * RESPONSABILIDAD: FUSIÓN REPONDERADA DE COMPUESTO, MOTIVACIÓN Y VACANCIA
 *
 * # Regla de promedio reponderado (esencial):
 * Un componente ausente se excluye del numerador Y del denominador.
 * Jamás se trata como cero: ausencia y cero son estados distintos,
 * por eso los componentes son `Option<f64>` tipados y el denominador
 * se construye a partir de CUÁLES componentes están presentes.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Peso del compuesto de deterioro en la fusión.
pub const W_DS: f64 = 0.35;
/// Peso de las señales de motivación en la fusión.
pub const W_MC: f64 = 0.40;
/// Tope de saturación para la suma cruda de confianzas de motivación.
pub const MC_CAP: f64 = 7.0;
/// Bono máximo por vacancia confirmada por el cartero.
pub const VAC_BONUS_MAX: f64 = 2.5;

/// Insumos de la fusión de convicción para una parcela.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvictionInputs {
    /// Compuesto de deterioro en [0,10]; `None` = aún no computado.
    pub distress_composite: Option<f64>,
    /// Suma cruda de confianzas de motivación; `None` cuando mc_count = 0.
    pub mc_raw: Option<f64>,
    pub mc_signal_count: i64,
    pub mc_signal_codes: Vec<String>,
    pub usps_vacant: bool,
    pub vacancy_confidence: Option<f64>,
}

/// Veredicto de la fusión con su desglose auditable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvictionVerdict {
    pub score: f64,
    pub base_score: f64,
    pub vacancy_bonus: f64,
    /// ds_comp = composite/10 en [0,1], si estuvo presente.
    pub ds_component: Option<f64>,
    /// mc_comp = mc_raw/MC_CAP en [0,1], si estuvo presente.
    pub mc_component: Option<f64>,
}

impl ConvictionVerdict {
    /// JSON compacto para la columna `conviction_components`.
    pub fn components_json(&self, inputs: &ConvictionInputs) -> String {
        json!({
            "w_ds": W_DS,
            "w_mc": W_MC,
            "ds_comp": self.ds_component,
            "mc_comp": self.mc_component,
            "mc_raw": inputs.mc_raw,
            "mc_cap": MC_CAP,
            "base": self.base_score,
            "vac_bonus": self.vacancy_bonus,
            "vacant": inputs.usps_vacant,
        }).to_string()
    }
}

/// Fusión de convicción con semántica de promedio reponderado.
///
/// ```text
/// ds_comp = clamp(distress_composite / 10, 0, 1)        # o ausente
/// mc_comp = clamp(mc_raw / MC_CAP, 0, 1)                # o ausente
/// base    = 10 × Σ(wᵢ·compᵢ presentes) / Σ(wᵢ presentes)   # 0 si no hay ninguno
/// bonus   = VAC_BONUS_MAX × vacancy_confidence  si vacante confirmada
/// score   = clamp(base + bonus, 0, 10)
/// ```
pub fn fuse_conviction(inputs: &ConvictionInputs) -> ConvictionVerdict {
    let ds_component = inputs.distress_composite
        .filter(|value| value.is_finite())
        .map(|value| (value / 10.0).clamp(0.0, 1.0));

    let mc_component = inputs.mc_raw
        .filter(|value| value.is_finite())
        .map(|value| (value / MC_CAP).clamp(0.0, 1.0));

    let mut weighted_numerator = 0.0;
    let mut present_weight_sum = 0.0;

    if let Some(ds_value) = ds_component {
        weighted_numerator += W_DS * ds_value;
        present_weight_sum += W_DS;
    }
    if let Some(mc_value) = mc_component {
        weighted_numerator += W_MC * mc_value;
        present_weight_sum += W_MC;
    }

    let base_score = if present_weight_sum > 0.0 {
        10.0 * weighted_numerator / present_weight_sum
    } else {
        0.0
    };

    let vacancy_bonus = if inputs.usps_vacant {
        VAC_BONUS_MAX * inputs.vacancy_confidence.unwrap_or(0.0).clamp(0.0, 1.0)
    } else {
        0.0
    };

    ConvictionVerdict {
        score: (base_score + vacancy_bonus).clamp(0.0, 10.0),
        base_score,
        vacancy_bonus,
        ds_component,
        mc_component,
    }
}
