// [libs/infra/remote/src/naip.rs]
/*!
 * =================================================================
 * APARATO: AERIAL IMAGERY UPLINK CLIENT (V5.4 - NAIP SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L4)
 * RESPONSABILIDAD: EXTRACCIÓN DE BANDAS RGB+NIR DE 1M Y NDVI ACTUAL
 *
 * VISION HIPER-HOLÍSTICA:
 * Adaptador del servicio aéreo gratuito (sin límite contractual).
 * Una sola sesión HTTP compartida entre los 10 workers del Pase 1
 * (segura para GETs concurrentes). Las respuestas de identificación
 * se cristalizan en la caché de disco con TTL de 7 días, llaveadas
 * por SHA-256 de los parámetros.
 * =================================================================
 */

use crate::cache::{content_address, DiskResponseCache};
use crate::errors::RemoteError;
use crate::limiter::retry_transient;
use reqwest::Client;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, instrument};

/// TTL de la caché de identificación aérea.
const AERIAL_CACHE_TTL_DAYS: u64 = 7;
/// Reintentos ante fallos transitorios del servicio aéreo.
const AERIAL_MAX_ATTEMPTS: u32 = 3;
/// Bandera de categoría que marca los registros utilizables.
const USABLE_CATEGORY_FLAG: &str = "primary";

/// Valores de banda en un punto, una entrada por añada disponible.
#[derive(Debug, Clone)]
pub struct AerialVintageReading {
    pub vintage_year: i32,
    pub red: f64,
    pub near_infrared: f64,
}

impl AerialVintageReading {
    pub fn ndvi(&self) -> Option<f64> {
        ndvi_from_bands(self.near_infrared, self.red)
    }
}

/// NDVI = (NIR − Red) / (NIR + Red). `None` ante denominador nulo o
/// aritmética no finita.
pub fn ndvi_from_bands(near_infrared: f64, red: f64) -> Option<f64> {
    let denominator = near_infrared + red;
    if denominator == 0.0 {
        return None;
    }
    let ndvi = (near_infrared - red) / denominator;
    ndvi.is_finite().then_some(ndvi)
}

// --- ESQUEMA DE RESPUESTA DEL SERVICIO (campos en minúscula) ---

#[derive(Deserialize)]
struct IdentifyEnvelope {
    #[serde(default)]
    results: Vec<IdentifyRecord>,
}

#[derive(Deserialize)]
struct IdentifyRecord {
    /// Campo de añada en minúscula en esta capa ("vintage", no "VINTAGE").
    vintage: Option<String>,
    category: Option<String>,
    red: Option<f64>,
    nir: Option<f64>,
}

pub struct AerialImageryClient {
    http_session: Client,
    identify_endpoint: String,
    export_endpoint: String,
    disk_cache: DiskResponseCache,
}

impl AerialImageryClient {
    pub fn new(base_endpoint: &str, cache_directory: PathBuf) -> Self {
        Self {
            http_session: Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent("Catastro-Field-Engine/V5.4")
                .build()
                .expect("CRITICAL: Failed to initialize aerial HTTP session"),
            identify_endpoint: format!("{}/identify", base_endpoint.trim_end_matches('/')),
            export_endpoint: format!("{}/exportImage", base_endpoint.trim_end_matches('/')),
            disk_cache: DiskResponseCache::new(cache_directory, AERIAL_CACHE_TTL_DAYS),
        }
    }

    /// Variante rápida para el Pase 1 masivo: solo el NDVI actual
    /// (añada más reciente), sin historia.
    #[instrument(skip(self))]
    pub async fn current_ndvi_fast(&self, latitude: f64, longitude: f64) -> Result<Option<f64>, RemoteError> {
        let readings = self.identify_vintages(latitude, longitude).await?;
        Ok(readings.last().and_then(AerialVintageReading::ndvi))
    }

    /// Identificación completa: valores de banda por añada utilizable,
    /// ordenados por año ascendente.
    #[instrument(skip(self))]
    pub async fn identify_vintages(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Vec<AerialVintageReading>, RemoteError> {
        let raw_payload = self.fetch_identify_payload(latitude, longitude).await?;

        let envelope: IdentifyEnvelope = serde_json::from_str(&raw_payload)
            .map_err(|fault| RemoteError::PayloadShape(format!("aerial identify: {fault}")))?;

        let mut readings: Vec<AerialVintageReading> = envelope.results.into_iter()
            // Solo registros marcados con la bandera de categoría utilizable.
            .filter(|record| {
                record.category.as_deref()
                    .map(|category| category.eq_ignore_ascii_case(USABLE_CATEGORY_FLAG))
                    .unwrap_or(false)
            })
            .filter_map(|record| {
                let vintage_year = record.vintage.as_deref()?.trim().parse::<i32>().ok()?;
                Some(AerialVintageReading {
                    vintage_year,
                    red: record.red?,
                    near_infrared: record.nir?,
                })
            })
            .collect();

        readings.sort_by_key(|reading| reading.vintage_year);
        Ok(readings)
    }

    /// Exporta un PNG del punto (artefacto visual, no almacenado aquí).
    #[instrument(skip(self))]
    pub async fn export_png(
        &self,
        latitude: f64,
        longitude: f64,
        pixel_size: u32,
    ) -> Result<Vec<u8>, RemoteError> {
        let url = format!(
            "{}?f=image&format=png&size={size},{size}&bboxSR=4326&bbox={west},{south},{east},{north}",
            self.export_endpoint,
            size = pixel_size,
            west = longitude - 0.001,
            south = latitude - 0.001,
            east = longitude + 0.001,
            north = latitude + 0.001,
        );

        let session = self.http_session.clone();
        retry_transient(AERIAL_MAX_ATTEMPTS, "aerial_export", move || {
            let session = session.clone();
            let url = url.clone();
            async move {
                let response = session.get(&url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(RemoteError::UpstreamStatus { status: status.as_u16() });
                }
                Ok(response.bytes().await?.to_vec())
            }
        }).await
    }

    async fn fetch_identify_payload(&self, latitude: f64, longitude: f64) -> Result<String, RemoteError> {
        let content_key = content_address(&[
            "aerial_identify",
            &format!("{latitude:.6}"),
            &format!("{longitude:.6}"),
        ]);

        if let Some(cached) = self.disk_cache.read_fresh(&content_key).await {
            debug!("📦 [AERIAL_CACHE]: Hit for ({latitude:.4}, {longitude:.4}).");
            return Ok(cached);
        }

        let url = format!(
            "{}?f=json&geometryType=esriGeometryPoint&geometry={longitude},{latitude}&sr=4326&returnGeometry=false",
            self.identify_endpoint
        );

        let session = self.http_session.clone();
        let body = retry_transient(AERIAL_MAX_ATTEMPTS, "aerial_identify", move || {
            let session = session.clone();
            let url = url.clone();
            async move {
                let response = session.get(&url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(RemoteError::UpstreamStatus { status: status.as_u16() });
                }
                Ok(response.text().await?)
            }
        }).await?;

        // Fallo de caché jamás tumba la lectura ya obtenida.
        if let Err(cache_fault) = self.disk_cache.write(&content_key, &body).await {
            debug!("⚠️ [AERIAL_CACHE]: Write bypassed: {cache_fault}");
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_ndvi_formula() {
        // NIR 0.6, Red 0.2 -> (0.4)/(0.8) = 0.5.
        assert!((ndvi_from_bands(0.6, 0.2).unwrap() - 0.5).abs() < 1e-12);
        // Denominador nulo: sin lectura.
        assert_eq!(ndvi_from_bands(0.0, 0.0), None);
        assert_eq!(ndvi_from_bands(0.5, -0.5), None);
    }

    #[test]
    fn certify_identify_parsing_filters_category_flag() {
        let payload = r#"{
            "results": [
                {"vintage": "2018", "category": "primary", "red": 0.25, "nir": 0.55},
                {"vintage": "2020", "category": "preliminary", "red": 0.30, "nir": 0.50},
                {"vintage": "2022", "category": "PRIMARY", "red": 0.20, "nir": 0.60},
                {"vintage": null, "category": "primary", "red": 0.20, "nir": 0.60}
            ]
        }"#;

        let envelope: IdentifyEnvelope = serde_json::from_str(payload).expect("schema");
        let usable: Vec<_> = envelope.results.into_iter()
            .filter(|record| {
                record.category.as_deref()
                    .map(|c| c.eq_ignore_ascii_case(USABLE_CATEGORY_FLAG))
                    .unwrap_or(false)
            })
            .filter_map(|record| {
                let year = record.vintage.as_deref()?.trim().parse::<i32>().ok()?;
                Some((year, record.red?, record.nir?))
            })
            .collect();

        // "preliminary" y la añada nula quedan fuera.
        assert_eq!(usable.len(), 2);
        assert_eq!(usable[0].0, 2018);
        assert_eq!(usable[1].0, 2022);
    }
}
