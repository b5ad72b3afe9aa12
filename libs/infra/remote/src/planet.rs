// [libs/infra/remote/src/planet.rs]
/*!
 * =================================================================
 * APARATO: HIGH-RES IMAGERY CLIENT (V5.3 - BUDGETED)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L4)
 * RESPONSABILIDAD: BÚSQUEDA DE ESCENAS DIARIAS Y PARES TEMPORALES
 *
 * VISION HIPER-HOLÍSTICA:
 * Cliente pago bajo presupuesto de prueba (30k peticiones). Token en
 * cabecera `Authorization: api-key <token>`. Búsqueda más-reciente-
 * primero; para el par temporal se emiten DOS búsquedas de rango
 * angosto (una por extremo) en lugar de una ancha, y se toma una
 * escena por extremo. Guardia de re-ejecución: si `planet_scan_date`
 * está dentro de 60 días se salta, salvo bandera `force`.
 * =================================================================
 */

use crate::errors::RemoteError;
use crate::limiter::{retry_transient, MonthlyBudget};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

/// Días de la guardia de re-ejecución sobre `planet_scan_date`.
pub const RESCAN_COOLDOWN_DAYS: i64 = 60;
/// Presupuesto de prueba del proveedor.
const TRIAL_REQUEST_BUDGET: u32 = 30_000;
const PLANET_MAX_ATTEMPTS: u32 = 3;
/// Ancho de cada ventana angosta del par temporal (días).
const NARROW_WINDOW_DAYS: i64 = 90;
/// Separación del extremo antiguo del par (días, ≈ 3 años).
const EARLIEST_OFFSET_DAYS: i64 = 1_095;

/// Escena individual retornada por la búsqueda.
#[derive(Debug, Clone, Deserialize)]
pub struct SceneRecord {
    pub id: String,
    #[serde(rename = "properties")]
    pub metadata: SceneMetadata,
    #[serde(rename = "_links", default)]
    pub links: SceneLinks,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneMetadata {
    pub acquired: String,
    #[serde(default)]
    pub clear_percent: Option<f64>,
    #[serde(default)]
    pub cloud_cover: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SceneLinks {
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// Par temporal (escena más antigua + más reciente) de un punto.
#[derive(Debug, Clone)]
pub struct TemporalPair {
    pub earliest: SceneRecord,
    pub latest: SceneRecord,
}

impl TemporalPair {
    pub fn span_days(&self) -> Option<i64> {
        let earliest = parse_acquired_date(&self.earliest.metadata.acquired)?;
        let latest = parse_acquired_date(&self.latest.metadata.acquired)?;
        Some((latest - earliest).num_days())
    }

    /// Proxy de cambio desde metadatos de escena (delta de cobertura
    /// despejada), en [0,1]. La diferenciación a nivel de píxel queda
    /// fuera del alcance (sin almacenamiento de imágenes).
    pub fn change_score(&self) -> Option<f64> {
        let earliest_clear = self.earliest.metadata.clear_percent?;
        let latest_clear = self.latest.metadata.clear_percent?;
        Some(((latest_clear - earliest_clear).abs() / 100.0).clamp(0.0, 1.0))
    }
}

fn parse_acquired_date(acquired: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(acquired.get(..10)?, "%Y-%m-%d").ok()
}

/// Guardia de re-ejecución: `true` cuando el último escaneo está
/// dentro de la ventana de enfriamiento y no hay bandera `force`.
pub fn cooldown_active(last_scan_date: Option<&str>, today: NaiveDate, force: bool) -> bool {
    if force {
        return false;
    }
    let Some(last_scan) = last_scan_date.and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()) else {
        return false;
    };
    (today - last_scan).num_days() < RESCAN_COOLDOWN_DAYS
}

#[derive(Deserialize)]
struct QuickSearchEnvelope {
    #[serde(default)]
    features: Vec<SceneRecord>,
}

pub struct HighResImageryClient {
    http_session: Client,
    search_endpoint: String,
    api_key: String,
    trial_budget: MonthlyBudget,
}

impl HighResImageryClient {
    pub fn new(base_endpoint: &str, api_key: String) -> Self {
        Self {
            http_session: Client::builder()
                .timeout(Duration::from_secs(45))
                .user_agent("Catastro-Field-Engine/V5.3")
                .build()
                .expect("CRITICAL: Failed to initialize high-res HTTP session"),
            search_endpoint: format!("{}/quick-search", base_endpoint.trim_end_matches('/')),
            api_key,
            trial_budget: MonthlyBudget::new(TRIAL_REQUEST_BUDGET, "high_res_trial"),
        }
    }

    /// Búsqueda más-reciente-primero alrededor del punto.
    #[instrument(skip(self))]
    pub async fn search_recent_scenes(
        &self,
        latitude: f64,
        longitude: f64,
        limit: usize,
    ) -> Result<Vec<SceneRecord>, RemoteError> {
        let now = Utc::now().date_naive();
        let window_start = now - ChronoDuration::days(365);
        let mut scenes = self.search_window(latitude, longitude, window_start, now).await?;
        scenes.truncate(limit);
        Ok(scenes)
    }

    /// Par temporal: dos búsquedas de rango ANGOSTO (una por extremo),
    /// una escena por extremo. Una búsqueda ancha única degrada el
    /// ranking del proveedor y el presupuesto.
    #[instrument(skip(self))]
    pub async fn acquire_temporal_pair(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<TemporalPair>, RemoteError> {
        let today = Utc::now().date_naive();

        // Extremo reciente: los últimos NARROW_WINDOW_DAYS.
        let recent_window_start = today - ChronoDuration::days(NARROW_WINDOW_DAYS);
        let recent_scenes = self.search_window(latitude, longitude, recent_window_start, today).await?;

        // Extremo antiguo: ventana angosta desplazada EARLIEST_OFFSET_DAYS.
        let early_anchor = today - ChronoDuration::days(EARLIEST_OFFSET_DAYS);
        let early_window_end = early_anchor + ChronoDuration::days(NARROW_WINDOW_DAYS);
        let early_scenes = self.search_window(latitude, longitude, early_anchor, early_window_end).await?;

        let latest = recent_scenes.into_iter().next();
        let earliest = early_scenes.into_iter().last();

        match (earliest, latest) {
            (Some(earliest), Some(latest)) => Ok(Some(TemporalPair { earliest, latest })),
            _ => {
                debug!("⚪ [HIGH_RES]: Temporal pair incomplete for ({latitude:.4}, {longitude:.4}).");
                Ok(None)
            }
        }
    }

    async fn search_window(
        &self,
        latitude: f64,
        longitude: f64,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> Result<Vec<SceneRecord>, RemoteError> {
        self.trial_budget.try_consume()?;

        let request_body = json!({
            "item_types": ["PSScene"],
            "filter": {
                "type": "AndFilter",
                "config": [
                    {
                        "type": "GeometryFilter",
                        "field_name": "geometry",
                        "config": { "type": "Point", "coordinates": [longitude, latitude] }
                    },
                    {
                        "type": "DateRangeFilter",
                        "field_name": "acquired",
                        "config": {
                            "gte": format!("{window_start}T00:00:00Z"),
                            "lte": format!("{window_end}T23:59:59Z")
                        }
                    }
                ]
            },
            // Más reciente primero.
            "sort": "acquired desc"
        });

        let session = self.http_session.clone();
        let endpoint = self.search_endpoint.clone();
        let api_key = self.api_key.clone();

        let envelope: QuickSearchEnvelope = retry_transient(PLANET_MAX_ATTEMPTS, "high_res_search", move || {
            let session = session.clone();
            let endpoint = endpoint.clone();
            let api_key = api_key.clone();
            let request_body = request_body.clone();
            async move {
                let response = session
                    .post(&endpoint)
                    // Autenticación por token en cabecera, esquema `api-key`.
                    .header("Authorization", format!("api-key {api_key}"))
                    .json(&request_body)
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(RemoteError::UpstreamStatus { status: status.as_u16() });
                }
                let body = response.text().await?;
                serde_json::from_str(&body)
                    .map_err(|fault| RemoteError::PayloadShape(format!("high-res search: {fault}")))
            }
        }).await?;

        Ok(envelope.features)
    }
}
