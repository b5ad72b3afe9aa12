// [libs/infra/remote/src/usps.rs]
/*!
 * =================================================================
 * APARATO: CARRIER VACANCY CLIENT (V6.1 - MULTI-ACCOUNT)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L4)
 * RESPONSABILIDAD: SONDA DE VACANCIA POSTAL BAJO CUOTA ESTRICTA
 *
 * VISION HIPER-HOLÍSTICA:
 * Cuota: 60 peticiones/hora por par de credenciales (alcance de
 * token, no de IP). Entre llamadas se duerme un intervalo aleatorio
 * uniforme en [DELAY_MIN, DELAY_MAX] (30–55 s por defecto): el
 * jitter es obligatorio, evade heurísticas de detección de bots y
 * alisa el limitador de picos de ventana corta del proveedor.
 * Ante 429: backoff exponencial desde 120 s, duplicando por 429
 * consecutivo, techo 900 s, honrando un Retry-After mayor.
 * Cuentas múltiples por sufijo numérico, cada una con cuota y
 * backoff independientes. Existe un espejo de pruebas con las
 * mismas credenciales y cuota separada.
 * =================================================================
 */

use crate::errors::RemoteError;
use crate::limiter::{HourlyQuota, JitterWindow, QuotaBackoff};
use base64::Engine;
use catastro_domain_models::VacancyProbe;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Cuota por hora por par de credenciales.
const HOURLY_QUOTA_PER_ACCOUNT: u32 = 60;
/// Ventana de jitter por defecto (segundos).
const DEFAULT_DELAY_MIN_SECONDS: f64 = 30.0;
const DEFAULT_DELAY_MAX_SECONDS: f64 = 55.0;
/// Reintentos internos acumulados ante 429 antes de rendirse.
const RATE_LIMIT_MAX_ATTEMPTS: u32 = 8;

/// Endpoint productivo y su espejo de pruebas (cuota separada).
const PRODUCTION_ENDPOINT: &str = "https://apis.usps.com";
const TEST_MIRROR_ENDPOINT: &str = "https://apis-tem.usps.com";

struct AccountToken {
    access_token: String,
    acquired: Instant,
    lifetime: Duration,
}

impl AccountToken {
    fn is_stale(&self) -> bool {
        self.acquired.elapsed() + Duration::from_secs(60) >= self.lifetime
    }
}

/// Estado mutable por cuenta: token, cuota horaria, backoff y el
/// instante del último despacho (para el jitter obligatorio).
struct AccountState {
    token: Option<AccountToken>,
    quota: HourlyQuota,
    backoff: QuotaBackoff,
    last_dispatch: Option<Instant>,
}

/// Par de credenciales direccionado por sufijo numérico.
pub struct VacancyAccount {
    pub suffix_label: String,
    client_id: String,
    client_secret: String,
    state: Mutex<AccountState>,
}

impl VacancyAccount {
    fn new(suffix_label: String, client_id: String, client_secret: String) -> Self {
        Self {
            suffix_label,
            client_id,
            client_secret,
            state: Mutex::new(AccountState {
                token: None,
                quota: HourlyQuota::new(HOURLY_QUOTA_PER_ACCOUNT),
                backoff: QuotaBackoff::default(),
                last_dispatch: None,
            }),
        }
    }
}

/// Configuración del cliente, hidratada del entorno.
#[derive(Debug, Clone)]
pub struct VacancyClientConfig {
    /// `(sufijo, client_id, client_secret)` por cuenta.
    pub credential_pairs: Vec<(String, String, String)>,
    pub delay_min_seconds: f64,
    pub delay_max_seconds: f64,
    pub use_test_mirror: bool,
}

impl VacancyClientConfig {
    /// Descubre cuentas por sufijo numérico: `USPS_CLIENT_ID` (cuenta 1)
    /// y `USPS_CLIENT_ID_2`, `USPS_CLIENT_ID_3`, ... opcionales.
    pub fn discover_from_env() -> Option<Self> {
        let mut credential_pairs = Vec::new();

        let primary_id = std::env::var("USPS_CLIENT_ID").ok()?;
        let primary_secret = std::env::var("USPS_CLIENT_SECRET").ok()?;
        credential_pairs.push(("1".to_string(), primary_id, primary_secret));

        for suffix in 2.. {
            let Ok(suffixed_id) = std::env::var(format!("USPS_CLIENT_ID_{suffix}")) else {
                break;
            };
            let Ok(suffixed_secret) = std::env::var(format!("USPS_CLIENT_SECRET_{suffix}")) else {
                break;
            };
            credential_pairs.push((suffix.to_string(), suffixed_id, suffixed_secret));
        }

        let delay_min_seconds = std::env::var("USPS_DELAY_MIN").ok()
            .and_then(|raw| raw.parse::<f64>().ok())
            .unwrap_or(DEFAULT_DELAY_MIN_SECONDS);
        let delay_max_seconds = std::env::var("USPS_DELAY_MAX").ok()
            .and_then(|raw| raw.parse::<f64>().ok())
            .unwrap_or(DEFAULT_DELAY_MAX_SECONDS);
        let use_test_mirror = std::env::var("USPS_TEST_MODE").ok()
            .map(|raw| raw == "1" || raw.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Some(Self { credential_pairs, delay_min_seconds, delay_max_seconds, use_test_mirror })
    }
}

// --- ESQUEMA DE RESPUESTA (llaves normalizadas del proveedor) ---

#[derive(Deserialize)]
struct VacancyEnvelope {
    address: Option<NormalizedAddress>,
    #[serde(rename = "additionalInfo")]
    additional_info: Option<AdditionalInfo>,
}

#[derive(Deserialize)]
struct NormalizedAddress {
    #[serde(rename = "streetAddress")]
    street_address: Option<String>,
    city: Option<String>,
    #[serde(rename = "ZIPCode")]
    zip_code: Option<String>,
    #[serde(rename = "ZIPPlus4")]
    zip_plus4: Option<String>,
}

#[derive(Deserialize)]
struct AdditionalInfo {
    /// "Y" = vacante confirmado por el cartero (≥ 90 días sin correo).
    vacant: Option<String>,
    #[serde(rename = "DPVConfirmation")]
    dpv_confirmation: Option<String>,
    business: Option<String>,
}

#[derive(Deserialize)]
struct TokenEnvelope {
    access_token: String,
    #[serde(default = "default_token_lifetime")]
    expires_in: u64,
}

fn default_token_lifetime() -> u64 {
    28_800
}

pub struct CarrierVacancyClient {
    http_session: Client,
    base_endpoint: String,
    jitter: JitterWindow,
    accounts: Vec<VacancyAccount>,
}

impl CarrierVacancyClient {
    pub fn new(config: VacancyClientConfig) -> Result<Self, RemoteError> {
        if config.credential_pairs.is_empty() {
            return Err(RemoteError::Configuration(
                "carrier vacancy requires at least one credential pair".to_string(),
            ));
        }

        let base_endpoint = if config.use_test_mirror {
            info!("🧪 [VACANCY]: Test mirror endpoint selected (separate quota).");
            TEST_MIRROR_ENDPOINT
        } else {
            PRODUCTION_ENDPOINT
        };

        Ok(Self {
            http_session: Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent("Catastro-Field-Engine/V6.1")
                .build()
                .expect("CRITICAL: Failed to initialize vacancy HTTP session"),
            base_endpoint: base_endpoint.to_string(),
            jitter: JitterWindow::new(config.delay_min_seconds, config.delay_max_seconds),
            accounts: config.credential_pairs.into_iter()
                .map(|(suffix, id, secret)| VacancyAccount::new(suffix, id, secret))
                .collect(),
        })
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Sonda de vacancia con la cuenta indicada.
    ///
    /// Secuencia por llamada: jitter obligatorio desde el despacho
    /// anterior de ESTA cuenta, cuota horaria (espera el reinicio de
    /// ventana si está agotada), token OAuth (refresco único ante
    /// 401), y backoff 429 independiente por cuenta.
    #[instrument(skip(self, street, city, zip))]
    pub async fn check_vacancy(
        &self,
        account_index: usize,
        street: &str,
        city: &str,
        zip: &str,
    ) -> Result<VacancyProbe, RemoteError> {
        let account = self.accounts.get(account_index).ok_or_else(|| {
            RemoteError::Configuration(format!("account index {account_index} not provisioned"))
        })?;

        self.honor_jitter_window(account).await;
        self.honor_hourly_quota(account).await;

        let mut token_refreshed_once = false;
        let mut attempt: u32 = 0;

        loop {
            let bearer_token = self.ensure_account_token(account, token_refreshed_once).await?;

            let response = self.http_session
                .get(format!("{}/addresses/v3/address", self.base_endpoint))
                .bearer_auth(&bearer_token)
                .query(&[("streetAddress", street), ("city", city), ("ZIPCode", zip)])
                .send()
                .await?;

            match response.status().as_u16() {
                200 => {
                    account.state.lock().await.backoff.register_success();
                    let body = response.text().await?;
                    return parse_vacancy_envelope(&body, street);
                }
                401 => {
                    if token_refreshed_once {
                        return Err(RemoteError::AuthenticationExpired);
                    }
                    warn!("🔐 [VACANCY:{}]: Token rejected. Refreshing once.", account.suffix_label);
                    token_refreshed_once = true;
                    account.state.lock().await.token = None;
                }
                429 => {
                    attempt += 1;
                    if attempt >= RATE_LIMIT_MAX_ATTEMPTS {
                        return Err(RemoteError::RateLimited { retry_after_seconds: None });
                    }
                    let retry_after = response.headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|value| value.to_str().ok())
                        .and_then(|value| value.trim().parse::<u64>().ok());

                    let pause = account.state.lock().await.backoff.register_rate_limit(retry_after);
                    warn!(
                        "⏳ [VACANCY:{}]: 429 received. Backing off {}s (consecutive rejection #{attempt}).",
                        account.suffix_label, pause.as_secs()
                    );
                    tokio::time::sleep(pause).await;
                }
                404 => {
                    // Dirección no entregable: respuesta semántica, no fallo.
                    return Ok(VacancyProbe {
                        error_code: Some("address_not_found".to_string()),
                        ..Default::default()
                    });
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

    async fn honor_jitter_window(&self, account: &VacancyAccount) {
        let pause = {
            let mut guard = account.state.lock().await;
            let pause = match guard.last_dispatch {
                // Jitter completo entre llamadas consecutivas de la cuenta.
                Some(_) => Some(self.jitter.sample()),
                None => None,
            };
            guard.last_dispatch = Some(Instant::now());
            pause
        };

        if let Some(pause) = pause {
            debug!("🕰️ [VACANCY]: Mandatory jitter {:.1}s.", pause.as_secs_f64());
            tokio::time::sleep(pause).await;
        }
    }

    async fn honor_hourly_quota(&self, account: &VacancyAccount) {
        loop {
            let verdict = account.state.lock().await.quota.try_consume();
            match verdict {
                Ok(()) => return,
                Err(window_wait) => {
                    warn!(
                        "🛑 [VACANCY:{}]: Hourly quota spent. Sleeping {}s until window reset.",
                        account.suffix_label, window_wait.as_secs()
                    );
                    tokio::time::sleep(window_wait + Duration::from_secs(1)).await;
                }
            }
        }
    }

    async fn ensure_account_token(
        &self,
        account: &VacancyAccount,
        force_refresh: bool,
    ) -> Result<String, RemoteError> {
        {
            let guard = account.state.lock().await;
            if !force_refresh {
                if let Some(cached) = guard.token.as_ref() {
                    if !cached.is_stale() {
                        return Ok(cached.access_token.clone());
                    }
                }
            }
        }

        debug!("🔑 [VACANCY:{}]: Negotiating OAuth token.", account.suffix_label);
        let basic_material = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", account.client_id, account.client_secret));

        let response = self.http_session
            .post(format!("{}/oauth2/v3/token", self.base_endpoint))
            .header("Authorization", format!("Basic {basic_material}"))
            .json(&json!({ "grant_type": "client_credentials" }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::UpstreamStatus { status: status.as_u16() });
        }

        let envelope: TokenEnvelope = response.json().await
            .map_err(|fault| RemoteError::PayloadShape(format!("vacancy token: {fault}")))?;

        let token = envelope.access_token.clone();
        account.state.lock().await.token = Some(AccountToken {
            access_token: envelope.access_token,
            acquired: Instant::now(),
            lifetime: Duration::from_secs(envelope.expires_in),
        });

        Ok(token)
    }
}

/// Decodifica el sobre del proveedor hacia la sonda normalizada.
/// El mismatch se decide comparando la calle resuelta con la de entrada.
fn parse_vacancy_envelope(body: &str, input_street: &str) -> Result<VacancyProbe, RemoteError> {
    let envelope: VacancyEnvelope = serde_json::from_str(body)
        .map_err(|fault| RemoteError::PayloadShape(format!("vacancy probe: {fault}")))?;

    let normalized = envelope.address;
    let info = envelope.additional_info;

    let resolved_street = normalized.as_ref().and_then(|a| a.street_address.clone());
    let address_mismatch = resolved_street.as_deref()
        .map(|resolved| !streets_equivalent(resolved, input_street))
        .unwrap_or(false);

    Ok(VacancyProbe {
        normalized_address: resolved_street,
        normalized_city: normalized.as_ref().and_then(|a| a.city.clone()),
        normalized_zip: normalized.as_ref().and_then(|a| a.zip_code.clone()),
        normalized_zip4: normalized.as_ref().and_then(|a| a.zip_plus4.clone()),
        vacant: info.as_ref().and_then(|i| i.vacant.as_deref())
            .map(|flag| flag.eq_ignore_ascii_case("Y"))
            .unwrap_or(false),
        dpv_confirmed: info.as_ref().and_then(|i| i.dpv_confirmation.as_deref())
            .and_then(|flag| match flag.to_ascii_uppercase().as_str() {
                "Y" => Some(true),
                "N" => Some(false),
                _ => None,
            }),
        business: info.as_ref().and_then(|i| i.business.as_deref())
            .map(|flag| flag.eq_ignore_ascii_case("Y")),
        address_mismatch,
        error_code: None,
    })
}

fn streets_equivalent(resolved: &str, input: &str) -> bool {
    normalize_street(resolved) == normalize_street(input)
}

fn normalize_street(street: &str) -> String {
    street.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_vacant_dpv_confirmed_parsing() {
        let body = r#"{
            "address": {"streetAddress": "101 OAK ST", "city": "GASTONIA", "ZIPCode": "28052", "ZIPPlus4": "1234"},
            "additionalInfo": {"vacant": "Y", "DPVConfirmation": "Y", "business": "N"}
        }"#;

        let probe = parse_vacancy_envelope(body, "101 Oak St").expect("schema");
        assert!(probe.vacant);
        assert_eq!(probe.dpv_confirmed, Some(true));
        assert_eq!(probe.business, Some(false));
        assert!(!probe.address_mismatch);
        assert_eq!(probe.normalized_zip4.as_deref(), Some("1234"));
    }

    #[test]
    fn certify_address_mismatch_detection() {
        let body = r#"{
            "address": {"streetAddress": "105 OAK ST", "city": "GASTONIA", "ZIPCode": "28052"},
            "additionalInfo": {"vacant": "Y", "DPVConfirmation": "Y"}
        }"#;

        let probe = parse_vacancy_envelope(body, "101 Oak St").expect("schema");
        assert!(probe.vacant);
        assert!(probe.address_mismatch, "resolved street differs from input");
    }

    #[test]
    fn certify_unknown_dpv_is_none_not_false() {
        let body = r#"{
            "address": {"streetAddress": "101 OAK ST", "city": "GASTONIA", "ZIPCode": "28052"},
            "additionalInfo": {"vacant": "Y", "DPVConfirmation": ""}
        }"#;

        let probe = parse_vacancy_envelope(body, "101 Oak St").expect("schema");
        assert_eq!(probe.dpv_confirmed, None);
    }

    #[test]
    fn certify_street_normalization_tolerates_spacing_and_case() {
        assert!(streets_equivalent("101  OAK  ST", "101 Oak St"));
        assert!(!streets_equivalent("101 OAK ST", "101 OAK AVE"));
    }

    #[test]
    fn certify_config_defaults() {
        let config = VacancyClientConfig {
            credential_pairs: vec![("1".into(), "id".into(), "secret".into())],
            delay_min_seconds: DEFAULT_DELAY_MIN_SECONDS,
            delay_max_seconds: DEFAULT_DELAY_MAX_SECONDS,
            use_test_mirror: false,
        };
        let client = CarrierVacancyClient::new(config).expect("one account provisioned");
        assert_eq!(client.account_count(), 1);

        let empty = VacancyClientConfig {
            credential_pairs: vec![],
            delay_min_seconds: 30.0,
            delay_max_seconds: 55.0,
            use_test_mirror: false,
        };
        assert!(CarrierVacancyClient::new(empty).is_err());
    }
}
