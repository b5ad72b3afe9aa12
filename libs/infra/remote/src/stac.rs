// [libs/infra/remote/src/stac.rs]
/*!
 * =================================================================
 * APARATO: HISTORICAL VINTAGE STAC CLIENT (V5.2)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L4)
 * RESPONSABILIDAD: SERIE NDVI MULTI-AÑADA DESDE CATÁLOGO STAC
 *
 * VISION HIPER-HOLÍSTICA:
 * Lee las añadas históricas de un punto desde el catálogo STAC y un
 * muestreador de rásteres cloud-optimized. Los puntos que caen sobre
 * fronteras de tesela producen dos items por año; la deduplicación
 * ocurre en el iterador perezoso con su set `seen_years`. La serie
 * resultante es finita, ordenada y reiniciable.
 * =================================================================
 */

use crate::errors::RemoteError;
use crate::limiter::retry_transient;
use crate::naip::ndvi_from_bands;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, instrument};

const STAC_MAX_ATTEMPTS: u32 = 3;
/// Ventana de búsqueda histórica (añadas quinquenales + margen).
const HISTORY_SEARCH_YEARS: i32 = 7;

/// Serie de pares `(año, NDVI)` de un punto.
///
/// Conserva los duplicados crudos de frontera de tesela; la vista
/// canónica es `iter_deduplicated()`, que puede recorrerse cuantas
/// veces haga falta (reiniciable).
#[derive(Debug, Clone, Default)]
pub struct VintageSeries {
    raw_pairs: Vec<(i32, f64)>,
}

impl VintageSeries {
    pub fn from_raw(mut raw_pairs: Vec<(i32, f64)>) -> Self {
        raw_pairs.sort_by_key(|(year, _)| *year);
        Self { raw_pairs }
    }

    /// Iterador perezoso con deduplicación por año.
    pub fn iter_deduplicated(&self) -> VintageIter<'_> {
        VintageIter {
            inner: self.raw_pairs.iter(),
            seen_years: HashSet::new(),
        }
    }

    pub fn collect_deduplicated(&self) -> Vec<(i32, f64)> {
        self.iter_deduplicated().collect()
    }

    pub fn vintage_count(&self) -> i64 {
        self.iter_deduplicated().count() as i64
    }

    /// Amplitud en años entre la añada más vieja y la más nueva.
    pub fn year_span(&self) -> i64 {
        let deduplicated = self.collect_deduplicated();
        match (deduplicated.first(), deduplicated.last()) {
            (Some((first_year, _)), Some((last_year, _))) => i64::from(last_year - first_year),
            _ => 0,
        }
    }

    /// Media de la serie deduplicada: línea base histórica del punto.
    pub fn baseline_mean(&self) -> Option<f64> {
        let deduplicated = self.collect_deduplicated();
        if deduplicated.is_empty() {
            return None;
        }
        let sum: f64 = deduplicated.iter().map(|(_, ndvi)| ndvi).sum();
        Some(sum / deduplicated.len() as f64)
    }
}

/// Iterador pull-based sobre la serie, un `(año, NDVI)` por año.
pub struct VintageIter<'series> {
    inner: std::slice::Iter<'series, (i32, f64)>,
    seen_years: HashSet<i32>,
}

impl Iterator for VintageIter<'_> {
    type Item = (i32, f64);

    fn next(&mut self) -> Option<Self::Item> {
        for (year, ndvi) in self.inner.by_ref() {
            // Dedup de frontera de tesela: el primer item del año gana.
            if self.seen_years.insert(*year) {
                return Some((*year, *ndvi));
            }
        }
        None
    }
}

// --- ESQUEMA DE RESPUESTA STAC ---

#[derive(Deserialize)]
struct StacSearchEnvelope {
    #[serde(default)]
    features: Vec<StacFeature>,
}

#[derive(Deserialize)]
struct StacFeature {
    id: String,
    properties: StacProperties,
}

#[derive(Deserialize)]
struct StacProperties {
    /// Año de añada; algunos catálogos lo publican como texto.
    #[serde(rename = "naip:year")]
    naip_year: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct PointSampleEnvelope {
    /// Valores de banda en orden R, G, B, NIR.
    #[serde(default)]
    values: Vec<f64>,
}

pub struct HistoricalVintageClient {
    http_session: Client,
    search_endpoint: String,
    sampler_endpoint: String,
}

impl HistoricalVintageClient {
    pub fn new(catalog_endpoint: &str, sampler_endpoint: &str) -> Self {
        Self {
            http_session: Client::builder()
                .timeout(Duration::from_secs(60))
                .user_agent("Catastro-Field-Engine/V5.2")
                .build()
                .expect("CRITICAL: Failed to initialize STAC HTTP session"),
            search_endpoint: format!("{}/search", catalog_endpoint.trim_end_matches('/')),
            sampler_endpoint: sampler_endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// Serie NDVI multi-añada de un punto. Lecturas pesadas: el Pase
    /// 1.5 las consume en serie, jamás en abanico.
    #[instrument(skip(self))]
    pub async fn ndvi_vintages(
        &self,
        latitude: f64,
        longitude: f64,
        current_year: i32,
    ) -> Result<VintageSeries, RemoteError> {
        let features = self.search_point_items(latitude, longitude, current_year).await?;
        debug!("🗂️ [STAC]: {} catalog items for ({latitude:.4}, {longitude:.4}).", features.len());

        let mut raw_pairs = Vec::with_capacity(features.len());
        for feature in features {
            let Some(vintage_year) = normalize_vintage_year(feature.properties.naip_year.as_ref()) else {
                continue;
            };

            match self.sample_item_ndvi(&feature.id, latitude, longitude).await {
                Ok(Some(ndvi)) => raw_pairs.push((vintage_year, ndvi)),
                Ok(None) => debug!("⚪ [STAC]: Item {} produced no usable bands.", feature.id),
                // Un item corrupto no tumba la serie completa.
                Err(fault) => debug!("⚠️ [STAC]: Item {} sampling bypassed: {}", feature.id, fault),
            }
        }

        Ok(VintageSeries::from_raw(raw_pairs))
    }

    async fn search_point_items(
        &self,
        latitude: f64,
        longitude: f64,
        current_year: i32,
    ) -> Result<Vec<StacFeature>, RemoteError> {
        let request_body = json!({
            "collections": ["naip"],
            "intersects": { "type": "Point", "coordinates": [longitude, latitude] },
            "datetime": format!("{}-01-01T00:00:00Z/..", current_year - HISTORY_SEARCH_YEARS),
            "limit": 50,
        });

        let session = self.http_session.clone();
        let endpoint = self.search_endpoint.clone();
        let envelope: StacSearchEnvelope = retry_transient(STAC_MAX_ATTEMPTS, "stac_search", move || {
            let session = session.clone();
            let endpoint = endpoint.clone();
            let request_body = request_body.clone();
            async move {
                let response = session.post(&endpoint).json(&request_body).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(RemoteError::UpstreamStatus { status: status.as_u16() });
                }
                let body = response.text().await?;
                serde_json::from_str(&body)
                    .map_err(|fault| RemoteError::PayloadShape(format!("stac search: {fault}")))
            }
        }).await?;

        Ok(envelope.features)
    }

    async fn sample_item_ndvi(
        &self,
        item_id: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<f64>, RemoteError> {
        let url = format!(
            "{}/item/{}/point/{},{}?assets=image",
            self.sampler_endpoint, item_id, longitude, latitude
        );

        let session = self.http_session.clone();
        let envelope: PointSampleEnvelope = retry_transient(STAC_MAX_ATTEMPTS, "stac_sample", move || {
            let session = session.clone();
            let url = url.clone();
            async move {
                let response = session.get(&url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(RemoteError::UpstreamStatus { status: status.as_u16() });
                }
                let body = response.text().await?;
                serde_json::from_str(&body)
                    .map_err(|fault| RemoteError::PayloadShape(format!("stac sample: {fault}")))
            }
        }).await?;

        // Bandas en orden R, G, B, NIR.
        if envelope.values.len() < 4 {
            return Ok(None);
        }
        Ok(ndvi_from_bands(envelope.values[3], envelope.values[0]))
    }
}

/// Normaliza la añada a entero: el catálogo la publica a veces como
/// texto ("2020") y a veces como número (2020).
fn normalize_vintage_year(raw_year: Option<&serde_json::Value>) -> Option<i32> {
    match raw_year? {
        serde_json::Value::Number(number) => number.as_i64().map(|year| year as i32),
        serde_json::Value::String(text) => text.trim().parse::<i32>().ok(),
        _ => None,
    }
}
