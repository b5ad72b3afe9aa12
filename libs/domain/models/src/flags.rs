// [libs/domain/models/src/flags.rs]
/*!
 * =================================================================
 * APARATO: DISTRESS FLAG MODEL (V7.0)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: BANDERAS TIPADAS DE DETERIORO Y SUS PESOS
 * =================================================================
 */

use serde::{Deserialize, Serialize};

/// Bandera tipada de deterioro emitida por los evaluadores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistressFlag {
    VegetationOvergrowth,
    VegetationNeglect,
    FloodRisk,
    StructuralChange,
    UspsVacancy,
}

impl DistressFlag {
    /// Código estable registrado en el registro de señales.
    pub fn code(&self) -> &'static str {
        match self {
            DistressFlag::VegetationOvergrowth => "vegetation_overgrowth",
            DistressFlag::VegetationNeglect => "vegetation_neglect",
            DistressFlag::FloodRisk => "flood_risk",
            DistressFlag::StructuralChange => "structural_change",
            DistressFlag::UspsVacancy => "usps_vacancy",
        }
    }

    /// Peso de la bandera en el puntaje de deterioro ponderado.
    pub fn weight(&self) -> f64 {
        match self {
            DistressFlag::VegetationOvergrowth => 2.0,
            DistressFlag::VegetationNeglect => 1.5,
            DistressFlag::FloodRisk => 1.5,
            DistressFlag::StructuralChange => 2.5,
            DistressFlag::UspsVacancy => 2.5,
        }
    }
}

/// Veredicto de un evaluador: bandera, confianza en [0,1] y el rastro
/// de evidencia que contribuyó a la decisión.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagAssessment {
    pub flag: DistressFlag,
    pub confidence: f64,
    pub contributing_evidence: Vec<String>,
}

impl FlagAssessment {
    /// Construye un veredicto sellando la confianza al rango [0, 1].
    pub fn new(flag: DistressFlag, confidence: f64, contributing_evidence: Vec<String>) -> Self {
        Self {
            flag,
            confidence: confidence.clamp(0.0, 1.0),
            contributing_evidence,
        }
    }

    /// Contribución ponderada al puntaje de deterioro.
    pub fn weighted_contribution(&self) -> f64 {
        self.flag.weight() * self.confidence
    }
}
