// [libs/domain/models/src/evidence.rs]
/*!
 * =================================================================
 * APARATO: EVIDENCE DOMAIN MODEL (V7.1 - MULTI-SOURCE)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: PAQUETE DE EVIDENCIA MULTI-FUENTE POR PARCELA
 *
 * VISION HIPER-HOLÍSTICA:
 * El paquete de evidencia es la entrada única de los evaluadores de
 * banderas. Cada lectura NDVI conserva su fuente de origen para que
 * la concordancia aérea/satelital pueda auditarse, y las lecturas
 * fuera del rango físico [-1, 1] se descalifican por fuente sin
 * contaminar al resto del paquete.
 * =================================================================
 */

use serde::{Deserialize, Serialize};

/// Fuente de origen de una lectura NDVI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NdviSource {
    /// Imagen aérea de 1m (RGB+NIR, gratuita).
    Aerial,
    /// Estadística satelital mensual (cuota OAuth).
    Satellite,
    /// Respaldo satelital gratuito (misma forma REST que el aéreo).
    SatelliteFallback,
}

impl NdviSource {
    pub fn as_label(&self) -> &'static str {
        match self {
            NdviSource::Aerial => "aerial",
            NdviSource::Satellite => "sentinel",
            NdviSource::SatelliteFallback => "sentinel_fallback",
        }
    }
}

/// Lectura NDVI puntual con rastreo de fuente.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NdviReading {
    pub value: f64,
    pub source: NdviSource,
}

impl NdviReading {
    pub fn new(value: f64, source: NdviSource) -> Self {
        Self { value, source }
    }

    /// NDVI = (NIR − Red)/(NIR + Red) reside por definición en [-1, 1].
    /// Una lectura fuera de ese rango es una violación de invariante y
    /// descalifica a la fuente para esta parcela.
    pub fn is_physical(&self) -> bool {
        self.value.is_finite() && (-1.0..=1.0).contains(&self.value)
    }
}

/// Categoría cualitativa del NDVI actual, persistida junto al valor crudo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NdviCategory {
    Bare,
    Sparse,
    Moderate,
    Dense,
}

impl NdviCategory {
    pub fn from_value(ndvi: f64) -> Self {
        if ndvi < 0.10 {
            NdviCategory::Bare
        } else if ndvi < 0.30 {
            NdviCategory::Sparse
        } else if ndvi < 0.50 {
            NdviCategory::Moderate
        } else {
            NdviCategory::Dense
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            NdviCategory::Bare => "bare",
            NdviCategory::Sparse => "sparse",
            NdviCategory::Moderate => "moderate",
            NdviCategory::Dense => "dense",
        }
    }
}

/// Nivel de riesgo de inundación derivado de la capa de peligro pública.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FloodRiskTier {
    High,
    Moderate,
    Low,
    None,
}

impl FloodRiskTier {
    /// Conjunto de alto riesgo: {A, AE, AO, VE, V}. La zona X exige
    /// inspeccionar el subtipo: "MINIMAL" = bajo, "500" = moderado.
    /// Sin impacto en la capa -> None.
    pub fn classify(zone: Option<&str>, zone_subtype: Option<&str>) -> Self {
        let Some(zone_code) = zone else {
            return FloodRiskTier::None;
        };

        match zone_code.trim().to_ascii_uppercase().as_str() {
            "A" | "AE" | "AO" | "VE" | "V" => FloodRiskTier::High,
            "X" => {
                let subtype = zone_subtype.unwrap_or("").to_ascii_uppercase();
                if subtype.contains("500") {
                    FloodRiskTier::Moderate
                } else if subtype.contains("MINIMAL") {
                    FloodRiskTier::Low
                } else {
                    // Zona X sin subtipo utilizable se trata como mínima.
                    FloodRiskTier::Low
                }
            }
            _ => FloodRiskTier::None,
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            FloodRiskTier::High => "HIGH",
            FloodRiskTier::Moderate => "MODERATE",
            FloodRiskTier::Low => "LOW",
            FloodRiskTier::None => "NONE",
        }
    }

    pub fn parse_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "HIGH" => FloodRiskTier::High,
            "MODERATE" => FloodRiskTier::Moderate,
            "LOW" => FloodRiskTier::Low,
            _ => FloodRiskTier::None,
        }
    }

    /// Normalización numérica para el compuesto de deterioro:
    /// HIGH=1.0, MODERATE=0.5, LOW=0.1, NONE=0.0.
    pub fn normalized(&self) -> f64 {
        match self {
            FloodRiskTier::High => 1.0,
            FloodRiskTier::Moderate => 0.5,
            FloodRiskTier::Low => 0.1,
            FloodRiskTier::None => 0.0,
        }
    }

    pub fn is_high(&self) -> bool {
        matches!(self, FloodRiskTier::High)
    }
}

/// Determinación de zona de inundación para un punto.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FloodDetermination {
    pub zone: Option<String>,
    pub zone_subtype: Option<String>,
    pub special_hazard: bool,
    pub area_id: Option<String>,
    pub static_bfe: Option<f64>,
    pub risk: FloodRiskTier,
}

impl Default for FloodRiskTier {
    fn default() -> Self {
        FloodRiskTier::None
    }
}

/// Dirección de tendencia de la serie NDVI satelital mensual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
    Insufficient,
}

impl TrendDirection {
    pub fn as_label(&self) -> &'static str {
        match self {
            TrendDirection::Rising => "rising",
            TrendDirection::Falling => "falling",
            TrendDirection::Stable => "stable",
            TrendDirection::Insufficient => "insufficient",
        }
    }

    pub fn parse_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "rising" => TrendDirection::Rising,
            "falling" => TrendDirection::Falling,
            "stable" => TrendDirection::Stable,
            _ => TrendDirection::Insufficient,
        }
    }
}

/// Resultado normalizado de una sonda de vacancia postal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VacancyProbe {
    pub normalized_address: Option<String>,
    pub normalized_city: Option<String>,
    pub normalized_zip: Option<String>,
    pub normalized_zip4: Option<String>,
    /// El cartero ha marcado el punto de entrega como vacante (≥ 90 días sin correo).
    pub vacant: bool,
    /// Validación del punto de entrega (DPV). `None` = desconocida.
    pub dpv_confirmed: Option<bool>,
    pub business: Option<bool>,
    /// La dirección resuelta difiere de la dirección de entrada.
    pub address_mismatch: bool,
    pub error_code: Option<String>,
}

/// Paquete de evidencia completo de una parcela.
///
/// Los evaluadores son funciones puras de este paquete; la adquisición
/// (HTTP, caché, cuotas) ocurre aguas arriba en los clientes remotos.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceBundle {
    pub aerial_ndvi: Option<NdviReading>,
    pub satellite_ndvi: Option<NdviReading>,
    /// Línea base histórica (media de las añadas NDVI del archivo aéreo).
    pub historical_baseline: Option<f64>,
    pub flood: Option<FloodDetermination>,
    pub vacancy: Option<VacancyProbe>,
}

impl EvidenceBundle {
    /// Lectura NDVI actual preferida: aérea primero, satelital después.
    /// Las lecturas no físicas quedan descalificadas por fuente.
    pub fn current_ndvi(&self) -> Option<NdviReading> {
        self.aerial_ndvi.filter(NdviReading::is_physical)
            .or(self.satellite_ndvi.filter(NdviReading::is_physical))
    }

    /// Paridad de fuentes: ambas lecturas físicas presentes y separadas
    /// por no más de `tolerance` unidades NDVI.
    pub fn sources_agree(&self, tolerance: f64) -> bool {
        match (self.aerial_ndvi, self.satellite_ndvi) {
            (Some(aerial), Some(satellite))
                if aerial.is_physical() && satellite.is_physical() =>
            {
                (aerial.value - satellite.value).abs() <= tolerance
            }
            _ => false,
        }
    }

    pub fn in_high_risk_flood_zone(&self) -> bool {
        self.flood.as_ref().map(|f| f.risk.is_high()).unwrap_or(false)
    }
}
