// [libs/domain/models/src/bands.rs]
/*!
 * =================================================================
 * APARATO: SCAN BAND PAYLOADS (V7.2 - BAND ALIGNED)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CARGAS DE ESCRITURA POR BANDA DE COLUMNAS
 *
 * VISION HIPER-HOLÍSTICA:
 * Cada pase del pipeline escribe exactamente una banda angosta de
 * columnas sobre la fila canónica de la parcela. Estas cargas son
 * deterministas: mismos insumos producen bandas bit-idénticas, lo
 * que sostiene la idempotencia de los pases.
 * =================================================================
 */

use crate::evidence::{FloodRiskTier, TrendDirection};
use crate::flags::{DistressFlag, FlagAssessment};
use serde::{Deserialize, Serialize};

/// Hoja plana de banderas y confianzas persistida en la banda del Pase 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlagSheet {
    pub flag_overgrowth: bool,
    pub conf_overgrowth: Option<f64>,
    pub flag_neglect: bool,
    pub conf_neglect: Option<f64>,
    pub flag_flood: bool,
    pub conf_flood: Option<f64>,
    pub flag_structural: bool,
    pub conf_structural: Option<f64>,
}

impl FlagSheet {
    /// Aplana los veredictos de los evaluadores en columnas persistibles.
    pub fn from_assessments(assessments: &[FlagAssessment]) -> Self {
        let mut sheet = FlagSheet::default();
        for assessment in assessments {
            match assessment.flag {
                DistressFlag::VegetationOvergrowth => {
                    sheet.flag_overgrowth = true;
                    sheet.conf_overgrowth = Some(assessment.confidence);
                }
                DistressFlag::VegetationNeglect => {
                    sheet.flag_neglect = true;
                    sheet.conf_neglect = Some(assessment.confidence);
                }
                DistressFlag::FloodRisk => {
                    sheet.flag_flood = true;
                    sheet.conf_flood = Some(assessment.confidence);
                }
                DistressFlag::StructuralChange => {
                    sheet.flag_structural = true;
                    sheet.conf_structural = Some(assessment.confidence);
                }
                // La vacancia postal vive en su propia banda (Pase 2).
                DistressFlag::UspsVacancy => {}
            }
        }
        sheet
    }

    pub fn any_flagged(&self) -> bool {
        self.flag_overgrowth || self.flag_neglect || self.flag_flood || self.flag_structural
    }
}

/// Banda del Pase 1: NDVI actual + zona de inundación + puntaje.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkScanBand {
    pub ndvi_current: Option<f64>,
    pub ndvi_category: Option<String>,
    pub fema_flood_zone: Option<String>,
    pub fema_sfha: bool,
    pub fema_risk_tier: FloodRiskTier,
    pub distress_score: f64,
    pub flags: FlagSheet,
    pub sentinel_worthy: bool,
    pub scan_date: String,
    pub scan_error: Option<String>,
}

/// Banda histórica del Pase 1.5 (pendiente NDVI quinquenal).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalBand {
    pub ndvi_slope_5yr: Option<f64>,
    pub ndvi_vintage_count: i64,
    pub ndvi_year_span: i64,
}

/// Banda satelital del Pase 1.5b.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelBand {
    pub trend: TrendDirection,
    pub slope: Option<f64>,
    pub ndvi_latest: Option<f64>,
    pub month_count: i64,
    pub ndvi_mean: Option<f64>,
    pub source: String,
    pub chart_url: Option<String>,
    pub scan_date: String,
}

/// Banda de vacancia postal del Pase 2.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VacancyBand {
    pub usps_address: Option<String>,
    pub usps_city: Option<String>,
    pub usps_zip: Option<String>,
    pub usps_zip4: Option<String>,
    pub usps_vacant: bool,
    pub usps_dpv_confirmed: Option<bool>,
    pub usps_business: Option<bool>,
    pub usps_address_mismatch: bool,
    pub usps_check_date: String,
    pub usps_error: Option<String>,
    pub flag_vacancy: bool,
    pub vacancy_confidence: Option<f64>,
}

/// Banda de imágenes de alta resolución (cliente pago, presupuestado).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanetBand {
    pub scene_count: i64,
    pub change_score: Option<f64>,
    pub span_days: Option<i64>,
    pub earliest_date: Option<String>,
    pub latest_date: Option<String>,
    pub earliest_thumb: Option<String>,
    pub latest_thumb: Option<String>,
    pub scan_date: String,
}

/// Banda de convicción del Pase 2.5 (fusión reponderada).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvictionBand {
    pub conviction_score: f64,
    pub conviction_base_score: f64,
    pub conviction_vacancy_bonus: f64,
    pub conviction_mc_score: Option<f64>,
    /// JSON compacto que describe los insumos de la fusión.
    pub conviction_components: String,
    pub mc_signal_count: i64,
    pub mc_signal_codes: String,
    pub conviction_date: String,
}
