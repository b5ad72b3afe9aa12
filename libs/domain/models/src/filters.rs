// [libs/domain/models/src/filters.rs]
/*!
 * =================================================================
 * APARATO: PARCEL QUERY FILTERS (V7.0)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATO DE FILTRADO DE LA SUPERFICIE DE CONSULTA
 * =================================================================
 */

use serde::{Deserialize, Serialize};

/// Columna de ordenamiento admitida por la consulta de parcelas.
///
/// Enumerada (jamás texto libre) para que el constructor SQL nunca
/// interpole entrada del consumidor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    DistressScore,
    DistressComposite,
    ConvictionScore,
    NdviCurrent,
    ScanDate,
    AssessedValue,
}

impl SortColumn {
    pub fn column_name(&self) -> &'static str {
        match self {
            SortColumn::DistressScore => "distress_score",
            SortColumn::DistressComposite => "distress_composite",
            SortColumn::ConvictionScore => "conviction_score",
            SortColumn::NdviCurrent => "ndvi_current",
            SortColumn::ScanDate => "scan_date",
            SortColumn::AssessedValue => "assessed_value",
        }
    }
}

/// Filtros aceptados por el endpoint de lectura de parcelas.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParcelQueryFilters {
    pub county: Option<String>,
    pub state: Option<String>,
    pub property_class: Option<String>,
    pub zip: Option<String>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub min_acreage: Option<f64>,
    pub max_acreage: Option<f64>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    pub min_composite: Option<f64>,
    pub min_conviction: Option<f64>,
    pub flag_overgrowth: Option<bool>,
    pub flag_neglect: Option<bool>,
    pub flag_flood: Option<bool>,
    pub flag_structural: Option<bool>,
    pub flag_vacancy: Option<bool>,
    pub fema_zone: Option<String>,
    /// Solo parcelas que ya pasaron al menos por el Pase 1.
    pub scanned_only: Option<bool>,
    pub sort_by: Option<SortColumn>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ParcelQueryFilters {
    /// Límite efectivo, acotado para proteger al almacén compartido.
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(100).min(1_000)
    }

    pub fn effective_offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }
}
