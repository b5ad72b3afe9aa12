// [libs/domain/scoring/src/composite.rs]
/*!
 * =================================================================
 * APARATO: DISTRESS COMPOSITE BLEND (V9.0)
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L2)
 * RESPONSABILIDAD: MEZCLA COMPUESTA DE PENDIENTE NDVI Y RIESGO FEMA
 * =================================================================
 */

use catastro_domain_models::FloodRiskTier;

/// Peso del percentil de pendiente NDVI en el compuesto.
pub const COMPOSITE_SLOPE_WEIGHT: f64 = 0.70;
/// Peso del riesgo de inundación normalizado en el compuesto.
pub const COMPOSITE_FLOOD_WEIGHT: f64 = 0.30;

/// Compuesto de deterioro, escalado a [0, 10]:
/// `composite = (0.70 × slope_pctile + 0.30 × fema_norm) × 10`.
///
/// El percentil llega del ranking SQL por condado (siempre en [0,1]);
/// la normalización FEMA es HIGH=1.0, MODERATE=0.5, LOW=0.1, NONE=0.
pub fn distress_composite(slope_pctile: f64, flood_risk: FloodRiskTier) -> f64 {
    let blended = COMPOSITE_SLOPE_WEIGHT * slope_pctile.clamp(0.0, 1.0)
        + COMPOSITE_FLOOD_WEIGHT * flood_risk.normalized();

    (blended * 10.0).clamp(0.0, 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_composite_extremes() {
        assert_eq!(distress_composite(0.0, FloodRiskTier::None), 0.0);
        assert_eq!(distress_composite(1.0, FloodRiskTier::High), 10.0);
    }

    #[test]
    fn certify_composite_blend_values() {
        // Percentil alto sin riesgo de inundación.
        let dry = distress_composite(0.90, FloodRiskTier::None);
        assert!((dry - 6.3).abs() < 1e-12);

        // Percentil medio en zona moderada: 0.7*0.5 + 0.3*0.5 = 0.5 -> 5.0.
        let moderate = distress_composite(0.5, FloodRiskTier::Moderate);
        assert!((moderate - 5.0).abs() < 1e-12);

        // Zona LOW aporta 0.3*0.1 = 0.03 -> 0.3 puntos.
        let low_only = distress_composite(0.0, FloodRiskTier::Low);
        assert!((low_only - 0.3).abs() < 1e-12);
    }

    #[test]
    fn certify_composite_is_monotone_in_pctile() {
        let mut previous = -1.0;
        for step in 0..=100 {
            let pctile = step as f64 / 100.0;
            let value = distress_composite(pctile, FloodRiskTier::Moderate);
            assert!(value >= previous, "composite must not decrease as pctile grows");
            previous = value;
        }
    }
}
