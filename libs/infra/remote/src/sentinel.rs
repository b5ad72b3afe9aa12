// [libs/infra/remote/src/sentinel.rs]
/*!
 * =================================================================
 * APARATO: SATELLITE NDVI STATS CLIENT (V6.0 - QUOTA SHIELDED)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L4)
 * RESPONSABILIDAD: ESTADÍSTICA NDVI MENSUAL BAJO CUOTA ORGANIZACIONAL
 *
 * VISION HIPER-HOLÍSTICA:
 * Cliente OAuth client-credentials contra el endpoint estadístico.
 * Presupuesto: 10,000 peticiones/mes para toda la organización y
 * 300 peticiones/minuto; el marcapasos adaptativo vive dentro del
 * cliente y los reintentos por límite de tasa son internos.
 *
 * # Trampas del backend (no negociables):
 * 1. La estadística se pide por tamaño de grilla explícito (50×50
 *    píxeles), jamás por resolución: pedir por resolución produce
 *    todo ceros en este backend.
 * 2. El evalscript debe declarar la banda dataMask tanto en la
 *    entrada como en la salida.
 * =================================================================
 */

use crate::errors::RemoteError;
use crate::limiter::{MonthlyBudget, PacedLimiter, QuotaBackoff};
use base64::Engine;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Tamaño de grilla explícito exigido por el backend estadístico.
const STATS_GRID_PIXELS: u32 = 50;
/// Presupuesto organizacional mensual.
const MONTHLY_REQUEST_BUDGET: u32 = 10_000;
/// Presupuesto por minuto.
const PER_MINUTE_BUDGET: u32 = 300;
/// Reintentos internos ante 429 del backend satelital.
const RATE_LIMIT_MAX_ATTEMPTS: u32 = 5;
/// Medio lado de la caja de muestreo alrededor del punto (grados).
const POINT_BOX_HALF_SIDE: f64 = 0.000_45;

/// Evalscript estadístico: dataMask declarado en entrada Y salida.
const NDVI_EVALSCRIPT: &str = r#"//VERSION=3
function setup() {
  return {
    input: [{ bands: ["B04", "B08", "dataMask"] }],
    output: [
      { id: "ndvi", bands: 1 },
      { id: "dataMask", bands: 1 }
    ]
  };
}
function evaluatePixel(sample) {
  const ndvi = (sample.B08 - sample.B04) / (sample.B08 + sample.B04);
  return { ndvi: [ndvi], dataMask: [sample.dataMask] };
}
"#;

/// Media NDVI de un mes calendario.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyNdvi {
    /// Mes en formato `YYYY-MM`.
    pub month: String,
    pub mean: f64,
}

struct CachedToken {
    access_token: String,
    acquired: Instant,
    lifetime: Duration,
}

impl CachedToken {
    fn is_stale(&self) -> bool {
        // Margen de 60 s para no morir con el token en la mano.
        self.acquired.elapsed() + Duration::from_secs(60) >= self.lifetime
    }
}

// --- ESQUEMAS DE RESPUESTA ---

#[derive(Deserialize)]
struct TokenEnvelope {
    access_token: String,
    #[serde(default = "default_token_lifetime")]
    expires_in: u64,
}

fn default_token_lifetime() -> u64 {
    3_600
}

#[derive(Deserialize)]
struct StatisticsEnvelope {
    #[serde(default)]
    data: Vec<StatisticsInterval>,
}

#[derive(Deserialize)]
struct StatisticsInterval {
    interval: IntervalStamp,
    outputs: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct IntervalStamp {
    from: String,
}

pub struct SatelliteStatsClient {
    http_session: Client,
    token_endpoint: String,
    statistics_endpoint: String,
    client_id: String,
    client_secret: String,
    token_vault: Mutex<Option<CachedToken>>,
    pacer: PacedLimiter,
    monthly_budget: MonthlyBudget,
}

impl SatelliteStatsClient {
    pub fn new(base_endpoint: &str, client_id: String, client_secret: String) -> Self {
        let trimmed = base_endpoint.trim_end_matches('/');
        Self {
            http_session: Client::builder()
                .timeout(Duration::from_secs(60))
                .user_agent("Catastro-Field-Engine/V6.0")
                .build()
                .expect("CRITICAL: Failed to initialize satellite HTTP session"),
            token_endpoint: format!("{trimmed}/oauth/token"),
            statistics_endpoint: format!("{trimmed}/api/v1/statistics"),
            client_id,
            client_secret,
            token_vault: Mutex::new(None),
            pacer: PacedLimiter::per_minute(PER_MINUTE_BUDGET),
            monthly_budget: MonthlyBudget::new(MONTHLY_REQUEST_BUDGET, "satellite_stats"),
        }
    }

    /// Siembra el presupuesto mensual con el consumo ya sellado en el
    /// ledger (`system_state`), para que un reinicio no lo pierda.
    pub fn seed_monthly_consumption(&self, already_consumed: u32) {
        self.monthly_budget.seed(already_consumed);
    }

    pub fn monthly_consumed(&self) -> u32 {
        self.monthly_budget.consumed()
    }

    /// Media NDVI por mes para los últimos `months` meses.
    ///
    /// Los reintentos por 429 son internos; la autenticación rechazada
    /// tras un refresco colapsa el pase (accionable por el operador).
    #[instrument(skip(self))]
    pub async fn monthly_mean_ndvi(
        &self,
        latitude: f64,
        longitude: f64,
        months: u32,
    ) -> Result<Vec<MonthlyNdvi>, RemoteError> {
        self.monthly_budget.try_consume()?;

        let now = Utc::now();
        let window_start = now - ChronoDuration::days(i64::from(months) * 31);
        let request_body = json!({
            "input": {
                "bounds": {
                    "bbox": [
                        longitude - POINT_BOX_HALF_SIDE,
                        latitude - POINT_BOX_HALF_SIDE,
                        longitude + POINT_BOX_HALF_SIDE,
                        latitude + POINT_BOX_HALF_SIDE
                    ],
                    "properties": { "crs": "http://www.opengis.net/def/crs/EPSG/0/4326" }
                },
                "data": [{ "type": "sentinel-2-l2a" }]
            },
            "aggregation": {
                "timeRange": {
                    "from": window_start.format("%Y-%m-%dT00:00:00Z").to_string(),
                    "to": now.format("%Y-%m-%dT00:00:00Z").to_string()
                },
                "aggregationInterval": { "of": "P1M" },
                // Grilla explícita de 50×50: pedir por resolución
                // produce todo ceros en este backend.
                "width": STATS_GRID_PIXELS,
                "height": STATS_GRID_PIXELS,
                "evalscript": NDVI_EVALSCRIPT
            }
        });

        let mut backoff = QuotaBackoff::default();
        let mut token_refreshed_once = false;
        let mut attempt: u32 = 0;

        loop {
            self.pacer.acquire().await;
            let bearer_token = self.ensure_access_token(token_refreshed_once).await?;

            let response = self.http_session
                .post(&self.statistics_endpoint)
                .bearer_auth(&bearer_token)
                .json(&request_body)
                .send()
                .await?;

            match response.status().as_u16() {
                200 => {
                    self.pacer.reward().await;
                    let body = response.text().await?;
                    let envelope: StatisticsEnvelope = serde_json::from_str(&body)
                        .map_err(|fault| RemoteError::PayloadShape(format!("satellite stats: {fault}")))?;
                    return Ok(collect_monthly_means(envelope));
                }
                401 => {
                    if token_refreshed_once {
                        return Err(RemoteError::AuthenticationExpired);
                    }
                    warn!("🔐 [SATELLITE]: Token rejected. Refreshing once.");
                    token_refreshed_once = true;
                    let _ = self.token_vault.lock().await.take();
                }
                429 => {
                    attempt += 1;
                    if attempt >= RATE_LIMIT_MAX_ATTEMPTS {
                        return Err(RemoteError::RateLimited { retry_after_seconds: None });
                    }
                    let retry_after = parse_retry_after(response.headers());
                    let pause = backoff.register_rate_limit(retry_after);
                    self.pacer.punish().await;
                    warn!("⏳ [SATELLITE]: 429 received. Internal retry in {}s.", pause.as_secs());
                    tokio::time::sleep(pause).await;
                }
                status if (500..=599).contains(&status) => {
                    attempt += 1;
                    if attempt >= RATE_LIMIT_MAX_ATTEMPTS {
                        return Err(RemoteError::UpstreamStatus { status });
                    }
                    tokio::time::sleep(Duration::from_secs(2 * u64::from(attempt))).await;
                }
                status => return Err(RemoteError::UpstreamStatus { status }),
            }
        }
    }

    async fn ensure_access_token(&self, force_refresh: bool) -> Result<String, RemoteError> {
        let mut vault = self.token_vault.lock().await;

        if !force_refresh {
            if let Some(cached) = vault.as_ref() {
                if !cached.is_stale() {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        debug!("🔑 [SATELLITE]: Negotiating client-credentials token.");
        let basic_material = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.client_id, self.client_secret));

        let response = self.http_session
            .post(&self.token_endpoint)
            .header("Authorization", format!("Basic {basic_material}"))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::UpstreamStatus { status: status.as_u16() });
        }

        let envelope: TokenEnvelope = response.json().await
            .map_err(|fault| RemoteError::PayloadShape(format!("satellite token: {fault}")))?;

        let token = envelope.access_token.clone();
        *vault = Some(CachedToken {
            access_token: envelope.access_token,
            acquired: Instant::now(),
            lifetime: Duration::from_secs(envelope.expires_in),
        });

        Ok(token)
    }
}

/// Extrae las medias mensuales del sobre estadístico.
fn collect_monthly_means(envelope: StatisticsEnvelope) -> Vec<MonthlyNdvi> {
    let mut monthly = Vec::with_capacity(envelope.data.len());
    for interval in envelope.data {
        let Some(outputs) = interval.outputs else { continue };
        let Some(mean) = outputs
            .pointer("/ndvi/bands/B0/stats/mean")
            .and_then(serde_json::Value::as_f64)
            .filter(|value| value.is_finite())
        else {
            continue;
        };

        let month = interval.interval.from.chars().take(7).collect::<String>();
        monthly.push(MonthlyNdvi { month, mean });
    }
    monthly.sort_by(|a, b| a.month.cmp(&b.month));
    monthly
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers.get(reqwest::header::RETRY_AFTER)?
        .to_str().ok()?
        .trim()
        .parse::<u64>().ok()
}

// --- RESPALDO SATELITAL GRATUITO ---

/// Respaldo gratuito con la misma forma REST que el cliente aéreo
/// (identify sobre un ImageServer), endpoint distinto. Se usa cuando
/// el cliente primario retorna vacío para un punto.
pub struct SatelliteFallbackClient {
    http_session: Client,
    identify_endpoint: String,
}

#[derive(Deserialize)]
struct FallbackEnvelope {
    #[serde(default)]
    results: Vec<FallbackRecord>,
}

#[derive(Deserialize)]
struct FallbackRecord {
    /// Mes en minúscula, formato `YYYY-MM`.
    month: Option<String>,
    red: Option<f64>,
    nir: Option<f64>,
}

impl SatelliteFallbackClient {
    pub fn new(base_endpoint: &str) -> Self {
        Self {
            http_session: Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent("Catastro-Field-Engine/V6.0")
                .build()
                .expect("CRITICAL: Failed to initialize fallback HTTP session"),
            identify_endpoint: format!("{}/identify", base_endpoint.trim_end_matches('/')),
        }
    }

    #[instrument(skip(self))]
    pub async fn monthly_mean_ndvi(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Vec<MonthlyNdvi>, RemoteError> {
        let url = format!(
            "{}?f=json&geometryType=esriGeometryPoint&geometry={longitude},{latitude}&sr=4326&returnGeometry=false",
            self.identify_endpoint
        );

        let session = self.http_session.clone();
        let envelope: FallbackEnvelope = crate::limiter::retry_transient(3, "satellite_fallback", move || {
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
                    .map_err(|fault| RemoteError::PayloadShape(format!("satellite fallback: {fault}")))
            }
        }).await?;

        let mut monthly: Vec<MonthlyNdvi> = envelope.results.into_iter()
            .filter_map(|record| {
                let month = record.month?;
                let mean = crate::naip::ndvi_from_bands(record.nir?, record.red?)?;
                Some(MonthlyNdvi { month, mean })
            })
            .collect();
        monthly.sort_by(|a, b| a.month.cmp(&b.month));

        info!("🛟 [FALLBACK]: {} monthly readings recovered.", monthly.len());
        Ok(monthly)
    }
}
