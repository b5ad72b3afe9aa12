// [libs/domain/models/src/parcel.rs]
/*!
 * =================================================================
 * APARATO: PARCEL DOMAIN MODEL (V7.0)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: IDENTIDAD CANÓNICA Y UNIDADES DE TRABAJO DE PARCELA
 * =================================================================
 */

use serde::{Deserialize, Serialize};

/// Identidad canónica de una parcela.
///
/// `parcel_id` es estable pero único SOLO dentro de un condado; la
/// identidad completa es la tupla `(parcel_id, county_name, state_code)`.
/// Todo join contra tablas externas usa la llave compuesta, jamás el
/// `parcel_id` desnudo (≈1,870 colisiones observadas entre condados).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParcelIdentity {
    pub parcel_id: String,
    pub county_name: String,
    pub state_code: String,
}

impl ParcelIdentity {
    pub fn new(parcel_id: &str, county_name: &str, state_code: &str) -> Self {
        Self {
            parcel_id: parcel_id.to_string(),
            county_name: county_name.to_string(),
            state_code: state_code.to_string(),
        }
    }
}

impl std::fmt::Display for ParcelIdentity {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}/{}/{}", self.state_code, self.county_name, self.parcel_id)
    }
}

/// Unidad de trabajo mínima para los pases geográficos (1, 1.5, 1.5b).
/// Solo parcelas con coordenadas válidas entran a la cola de selección.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParcelWorkItem {
    pub identity: ParcelIdentity,
    pub latitude: f64,
    pub longitude: f64,
}

/// Tarjeta de direcciones de una parcela (situs + mailing).
///
/// La dirección situs puede venir incompleta del geocodificador externo;
/// el Pase 2 aplica el fallback de mailing bajo la regla
/// `mailing_state = state_code`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParcelAddressCard {
    pub situs_address: Option<String>,
    pub situs_city: Option<String>,
    pub situs_zip: Option<String>,
    pub mailing_address: Option<String>,
    pub mailing_city: Option<String>,
    pub mailing_state: Option<String>,
    pub mailing_zip: Option<String>,
}

/// Unidad de trabajo del Pase 2 (verificación de vacancia postal).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VacancyWorkItem {
    pub identity: ParcelIdentity,
    pub addresses: ParcelAddressCard,
    pub distress_composite: Option<f64>,
}

impl VacancyWorkItem {
    /// Resuelve la dirección a consultar contra el servicio postal.
    ///
    /// Regla de fallback: si la ciudad o el ZIP situs faltan (fallo del
    /// geocodificador), se usan los de mailing SOLO cuando
    /// `mailing_state` coincide con el `state_code` de la parcela.
    /// Retorna `None` cuando la parcela debe saltarse.
    pub fn resolve_probe_address(&self) -> Option<(String, String, String)> {
        let street = self.addresses.situs_address.clone()
            .filter(|value| !value.trim().is_empty())?;

        let situs_city = self.addresses.situs_city.clone().filter(|v| !v.trim().is_empty());
        let situs_zip = self.addresses.situs_zip.clone().filter(|v| !v.trim().is_empty());

        if let (Some(city), Some(zip)) = (situs_city.clone(), situs_zip.clone()) {
            return Some((street, city, zip));
        }

        // Fallback de mailing, restringido al mismo estado.
        let mailing_in_state = self.addresses.mailing_state.as_deref()
            .map(|state| state.eq_ignore_ascii_case(&self.identity.state_code))
            .unwrap_or(false);

        if !mailing_in_state {
            return None;
        }

        let city = situs_city.or_else(|| self.addresses.mailing_city.clone())
            .filter(|value| !value.trim().is_empty())?;
        let zip = situs_zip.or_else(|| self.addresses.mailing_zip.clone())
            .filter(|value| !value.trim().is_empty())?;

        Some((street, city, zip))
    }
}
