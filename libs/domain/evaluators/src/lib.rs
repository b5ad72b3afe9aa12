// [libs/domain/evaluators/src/lib.rs]
/*!
 * =================================================================
 * APARATO: DISTRESS FLAG EVALUATORS (V6.3 - GOLD MASTER)
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L2)
 * RESPONSABILIDAD: EVALUACIÓN PURA DE BANDERAS SOBRE LA EVIDENCIA
 *
 * VISION HIPER-HOLÍSTICA:
 * Cada evaluador es una función pura del paquete de evidencia hacia
 * `(bandera, confianza ∈ [0,1], evidencia contribuyente)`. La
 * adquisición (HTTP, cachés, cuotas) ocurre aguas arriba; aquí no
 * hay efectos. Las lecturas NDVI fuera del rango físico [-1, 1]
 * descalifican a su fuente sin contaminar al resto del paquete.
 *
 * # Regla de combinación:
 * Al combinar señales de varias fuentes se usa `max`, nunca un OR
 * lógico: una confianza de 0.0 es un valor legítimo y no debe
 * tratarse como ausencia.
 * =================================================================
 */

use catastro_domain_models::{DistressFlag, EvidenceBundle, FlagAssessment, FloodRiskTier};

/// Umbral NDVI del nivel fuerte de sobrecrecimiento (sin historia).
pub const OVERGROWTH_STRONG_THRESHOLD: f64 = 0.65;
/// Piso del nivel moderado de sobrecrecimiento.
pub const OVERGROWTH_MODERATE_FLOOR: f64 = 0.50;
/// Delta histórico mínimo exigido por el nivel moderado.
pub const OVERGROWTH_DELTA_THRESHOLD: f64 = 0.15;
/// Confianza base del nivel fuerte.
pub const OVERGROWTH_STRONG_CONFIDENCE: f64 = 0.6;
/// Confianza base del nivel moderado (respaldado por historia).
pub const OVERGROWTH_MODERATE_CONFIDENCE: f64 = 0.45;

/// Banda NDVI del abandono vegetal.
pub const NEGLECT_BAND_LOW: f64 = 0.10;
pub const NEGLECT_BAND_HIGH: f64 = 0.30;
/// Refuerzo por zona de inundación de alto riesgo.
pub const NEGLECT_FLOOD_BONUS: f64 = 0.15;

/// Caída NDVI mínima para el cambio estructural.
pub const STRUCTURAL_DROP_THRESHOLD: f64 = 0.20;
/// Confianza base del cambio estructural en el umbral exacto.
pub const STRUCTURAL_BASE_CONFIDENCE: f64 = 0.5;

/// Tolerancia de paridad aérea/satelital (unidades NDVI).
pub const SOURCE_AGREEMENT_TOLERANCE: f64 = 0.10;
/// Refuerzo aditivo cuando ambas fuentes concuerdan.
pub const SOURCE_AGREEMENT_BOOST: f64 = 0.10;

/// Confianzas canónicas de la vacancia postal.
pub const VACANCY_CONFIDENCE_DPV: f64 = 0.90;
pub const VACANCY_CONFIDENCE_UNKNOWN_DPV: f64 = 0.75;
pub const VACANCY_CONFIDENCE_MISMATCH_CAP: f64 = 0.70;

/// Sobrecrecimiento vegetal, en dos niveles:
/// (a) fuerte: NDVI ≥ 0.65 marca con confianza 0.6 aun sin historia;
/// (b) moderado: 0.50 ≤ NDVI < 0.65 marca solo si el delta histórico
///     (actual − línea base) supera 0.15.
/// La concordancia aérea/satelital refuerza aditivamente (tope 1.0).
pub fn evaluate_overgrowth(bundle: &EvidenceBundle) -> Option<FlagAssessment> {
    let reading = bundle.current_ndvi()?;
    let ndvi = reading.value;

    let mut evidence_trail = vec![format!("ndvi={:.4} source={}", ndvi, reading.source.as_label())];

    let base_confidence = if ndvi >= OVERGROWTH_STRONG_THRESHOLD {
        evidence_trail.push("tier=strong".to_string());
        OVERGROWTH_STRONG_CONFIDENCE
    } else if ndvi >= OVERGROWTH_MODERATE_FLOOR {
        let baseline = bundle.historical_baseline?;
        let historical_delta = ndvi - baseline;
        if historical_delta <= OVERGROWTH_DELTA_THRESHOLD {
            return None;
        }
        evidence_trail.push(format!("tier=moderate delta={:.4} baseline={:.4}", historical_delta, baseline));
        OVERGROWTH_MODERATE_CONFIDENCE
    } else {
        return None;
    };

    let confidence = apply_agreement_boost(bundle, base_confidence, &mut evidence_trail);
    Some(FlagAssessment::new(DistressFlag::VegetationOvergrowth, confidence, evidence_trail))
}

/// Abandono vegetal: NDVI ∈ [0.10, 0.30].
///
/// La confianza es inversamente proporcional al NDVI dentro de la
/// banda, lineal entre (0.10 → 1.0) y (0.30 → 0.0). Cada fuente
/// física aporta su propia confianza y se combinan con `max`. Una
/// zona de inundación de alto riesgo suma 0.15 (tope 1.0).
pub fn evaluate_neglect(bundle: &EvidenceBundle) -> Option<FlagAssessment> {
    let mut best_band_confidence: Option<f64> = None;
    let mut evidence_trail = Vec::new();

    for reading in [bundle.aerial_ndvi, bundle.satellite_ndvi].into_iter().flatten() {
        if !reading.is_physical() {
            continue;
        }
        if let Some(band_confidence) = neglect_band_confidence(reading.value) {
            evidence_trail.push(format!(
                "ndvi={:.4} source={} band_conf={:.4}",
                reading.value, reading.source.as_label(), band_confidence
            ));
            // Combinación por máximo: un 0.0 es un valor, no una ausencia.
            best_band_confidence = Some(match best_band_confidence {
                Some(current_best) => current_best.max(band_confidence),
                None => band_confidence,
            });
        }
    }

    let mut confidence = best_band_confidence?;

    if bundle.in_high_risk_flood_zone() {
        confidence = (confidence + NEGLECT_FLOOD_BONUS).min(1.0);
        evidence_trail.push(format!("flood_bonus=+{NEGLECT_FLOOD_BONUS}"));
    }

    Some(FlagAssessment::new(DistressFlag::VegetationNeglect, confidence, evidence_trail))
}

fn neglect_band_confidence(ndvi: f64) -> Option<f64> {
    if !(NEGLECT_BAND_LOW..=NEGLECT_BAND_HIGH).contains(&ndvi) {
        return None;
    }
    let linear = (NEGLECT_BAND_HIGH - ndvi) / (NEGLECT_BAND_HIGH - NEGLECT_BAND_LOW);
    Some(linear.clamp(0.0, 1.0))
}

/// Riesgo de inundación por zona: HIGH ⇒ 1.0, MODERATE ⇒ 0.6, resto sin bandera.
pub fn evaluate_flood(bundle: &EvidenceBundle) -> Option<FlagAssessment> {
    let determination = bundle.flood.as_ref()?;

    let confidence = match determination.risk {
        FloodRiskTier::High => 1.0,
        FloodRiskTier::Moderate => 0.6,
        FloodRiskTier::Low | FloodRiskTier::None => return None,
    };

    let evidence_trail = vec![format!(
        "zone={} tier={}",
        determination.zone.as_deref().unwrap_or("?"),
        determination.risk.as_label()
    )];
    Some(FlagAssessment::new(DistressFlag::FloodRisk, confidence, evidence_trail))
}

/// Cambio estructural: caída NDVI > 0.20 frente a la línea base histórica.
///
/// La confianza crece linealmente con la magnitud de la caída desde
/// 0.5 en el umbral; la concordancia aérea/satelital refuerza.
pub fn evaluate_structural_change(bundle: &EvidenceBundle) -> Option<FlagAssessment> {
    let reading = bundle.current_ndvi()?;
    let baseline = bundle.historical_baseline?;

    let drop = baseline - reading.value;
    if drop <= STRUCTURAL_DROP_THRESHOLD {
        return None;
    }

    let mut evidence_trail = vec![format!(
        "ndvi={:.4} baseline={:.4} drop={:.4} source={}",
        reading.value, baseline, drop, reading.source.as_label()
    )];

    let base_confidence = (STRUCTURAL_BASE_CONFIDENCE + (drop - STRUCTURAL_DROP_THRESHOLD)).min(1.0);
    let confidence = apply_agreement_boost(bundle, base_confidence, &mut evidence_trail);

    Some(FlagAssessment::new(DistressFlag::StructuralChange, confidence, evidence_trail))
}

/// Vacancia confirmada por el cartero (≥ 90 días sin entrega).
///
/// Confianza: 0.90 vacante con DPV confirmado; 0.75 vacante con DPV
/// desconocido; tope 0.70 cuando la dirección resuelta difiere de la
/// de entrada (`address_mismatch`), sin importar el DPV.
pub fn evaluate_vacancy(bundle: &EvidenceBundle) -> Option<FlagAssessment> {
    let probe = bundle.vacancy.as_ref()?;
    if !probe.vacant {
        return None;
    }

    let mut confidence = match probe.dpv_confirmed {
        Some(true) => VACANCY_CONFIDENCE_DPV,
        _ => VACANCY_CONFIDENCE_UNKNOWN_DPV,
    };

    let mut evidence_trail = vec![format!("vacant=true dpv={:?}", probe.dpv_confirmed)];

    if probe.address_mismatch {
        confidence = confidence.min(VACANCY_CONFIDENCE_MISMATCH_CAP);
        evidence_trail.push("address_mismatch=true".to_string());
    }

    Some(FlagAssessment::new(DistressFlag::UspsVacancy, confidence, evidence_trail))
}

/// Ejecuta todos los evaluadores sobre el paquete de evidencia.
pub fn evaluate_all(bundle: &EvidenceBundle) -> Vec<FlagAssessment> {
    [
        evaluate_overgrowth(bundle),
        evaluate_neglect(bundle),
        evaluate_flood(bundle),
        evaluate_structural_change(bundle),
        evaluate_vacancy(bundle),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Diagnósticos de invariante: lecturas NDVI fuera del rango físico.
/// La fuente queda descalificada para esta parcela; las demás siguen.
pub fn bundle_diagnostics(bundle: &EvidenceBundle) -> Vec<String> {
    let mut diagnostics = Vec::new();
    for reading in [bundle.aerial_ndvi, bundle.satellite_ndvi].into_iter().flatten() {
        if !reading.is_physical() {
            diagnostics.push(format!(
                "NDVI_RANGE_VIOLATION: value={} source={} (outside [-1, 1], source disqualified)",
                reading.value, reading.source.as_label()
            ));
        }
    }
    diagnostics
}

fn apply_agreement_boost(
    bundle: &EvidenceBundle,
    base_confidence: f64,
    evidence_trail: &mut Vec<String>,
) -> f64 {
    if bundle.sources_agree(SOURCE_AGREEMENT_TOLERANCE) {
        evidence_trail.push(format!("source_agreement=+{SOURCE_AGREEMENT_BOOST}"));
        (base_confidence + SOURCE_AGREEMENT_BOOST).min(1.0)
    } else {
        base_confidence
    }
}
