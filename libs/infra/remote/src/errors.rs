// [libs/infra/remote/src/errors.rs]
/*!
 * =================================================================
 * APARATO: REMOTE SOURCE ERROR CATALOG (V4.1 - SOBERANO)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L4)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE FUENTES REMOTAS
 *
 * VISION HIPER-HOLÍSTICA:
 * Cada clase de fallo carga su política: los transitorios se
 * reintentan con backoff, los límites de tasa jamás cuentan como
 * fallo de parcela, la autenticación rechazada dos veces colapsa el
 * pase (accionable por el operador) y la deriva de esquema se
 * registra y salta la parcela sin tumbar el lote.
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    /// Fallo físico de transporte (DNS, timeout, conexión cortada).
    #[error("[L4_NET_FAULT]: UPSTREAM_LINK_SEVERED -> {0}")]
    Transport(#[from] reqwest::Error),

    /// La fuente respondió con un estado no exitoso distinto de 429/401.
    #[error("[L4_NET_FAULT]: UPSTREAM_REJECTION -> HTTP_{status}")]
    UpstreamStatus { status: u16 },

    /// Límite de tasa (HTTP 429 o cuota corta agotada).
    #[error("[L4_QUOTA_FAULT]: RATE_LIMITED (retry_after={retry_after_seconds:?}s)")]
    RateLimited { retry_after_seconds: Option<u64> },

    /// Credenciales rechazadas tras un refresco de token.
    #[error("[L4_AUTH_FAULT]: CREDENTIALS_REJECTED_TWICE (operator action required)")]
    AuthenticationExpired,

    /// La carga de respuesta no tiene la forma esperada (deriva de esquema).
    #[error("[L4_SCHEMA_FAULT]: PAYLOAD_SHAPE_DRIFT -> {0}")]
    PayloadShape(String),

    /// El presupuesto mensual/organizacional está agotado.
    #[error("[L4_QUOTA_FAULT]: BUDGET_EXHAUSTED -> {0}")]
    QuotaExhausted(String),

    /// Fallo de E/S en la caché de disco.
    #[error("[L4_IO_FAULT]: CACHE_IO -> {0}")]
    CacheIo(#[from] std::io::Error),

    /// Configuración de entorno ausente o malformada.
    #[error("[L4_CONFIG_FAULT]: STRATEGIC_ENV_VOID -> {0}")]
    Configuration(String),
}

impl RemoteError {
    /// Política de reintento: solo transporte y 5xx son transitorios.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Transport(_) => true,
            RemoteError::UpstreamStatus { status } => (500..=599).contains(status),
            _ => false,
        }
    }

    /// Un límite de tasa no es un fallo de parcela: se espera y se reintenta.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, RemoteError::RateLimited { .. })
    }

    /// Código corto persistido en las columnas `*_error` de la parcela.
    pub fn parcel_error_code(&self) -> &'static str {
        match self {
            RemoteError::Transport(_) => "net_transport",
            RemoteError::UpstreamStatus { .. } => "upstream_rejection",
            RemoteError::RateLimited { .. } => "rate_limited",
            RemoteError::AuthenticationExpired => "auth_expired",
            RemoteError::PayloadShape(_) => "payload_shape",
            RemoteError::QuotaExhausted(_) => "quota_exhausted",
            RemoteError::CacheIo(_) => "cache_io",
            RemoteError::Configuration(_) => "configuration",
        }
    }
}
