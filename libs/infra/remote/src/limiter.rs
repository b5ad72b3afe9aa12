// [libs/infra/remote/src/limiter.rs]
/*!
 * =================================================================
 * APARATO: RATE ENVELOPE TOOLKIT (V4.3 - MULTI-CLIENT)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L4)
 * RESPONSABILIDAD: LIMITADORES DE TASA, JITTER Y BACKOFF POR CLIENTE
 *
 * VISION HIPER-HOLÍSTICA:
 * Cada cliente remoto es dueño de su propia envolvente de tasa; no
 * existen globales de proceso. Los limitadores son seguros entre
 * hilos (estado tras tokio::sync::Mutex) y los workers de un pase
 * los comparten por referencia Arc.
 * =================================================================
 */

use crate::errors::RemoteError;
use rand::Rng;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

// --- MARCAPASOS ADAPTATIVO (presupuesto por minuto) ---

struct PacerState {
    current_interval: Duration,
    last_dispatch: Option<Instant>,
}

/// Marcapasos adaptativo: garantiza un intervalo mínimo entre
/// despachos y se endurece ante rechazos 429 del proveedor.
pub struct PacedLimiter {
    base_interval: Duration,
    ceiling_interval: Duration,
    state: Mutex<PacerState>,
}

impl PacedLimiter {
    /// Construye el marcapasos desde un presupuesto de peticiones/minuto.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let base = Duration::from_millis(60_000 / u64::from(requests_per_minute.max(1)));
        Self {
            base_interval: base,
            ceiling_interval: base * 32,
            state: Mutex::new(PacerState {
                current_interval: base,
                last_dispatch: None,
            }),
        }
    }

    /// Adquiere un turno de despacho, durmiendo lo necesario.
    pub async fn acquire(&self) {
        let wait = {
            let mut guard = self.state.lock().await;
            let now = Instant::now();
            let wait = match guard.last_dispatch {
                Some(last) => guard.current_interval.saturating_sub(now - last),
                None => Duration::ZERO,
            };
            guard.last_dispatch = Some(now + wait);
            wait
        };

        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    /// Endurece el paso tras un 429: duplica el intervalo (con techo).
    pub async fn punish(&self) {
        let mut guard = self.state.lock().await;
        let hardened = (guard.current_interval * 2).min(self.ceiling_interval);
        warn!("⏳ [PACER]: Rate pressure detected. Interval {}ms -> {}ms",
            guard.current_interval.as_millis(), hardened.as_millis());
        guard.current_interval = hardened;
    }

    /// Relaja el paso hacia el intervalo base tras un éxito.
    pub async fn reward(&self) {
        let mut guard = self.state.lock().await;
        if guard.current_interval > self.base_interval {
            let relaxed = std::cmp::max(self.base_interval, guard.current_interval / 2);
            guard.current_interval = relaxed;
        }
    }
}

// --- VENTANA DE JITTER (anti bot-detection) ---

/// Ventana de espera aleatoria uniforme entre llamadas consecutivas.
///
/// El jitter es obligatorio en el cliente de vacancia: evade las
/// heurísticas de detección de bots y alisa un limitador de picos de
/// ventana corta del proveedor.
#[derive(Debug, Clone, Copy)]
pub struct JitterWindow {
    pub min_seconds: f64,
    pub max_seconds: f64,
}

impl JitterWindow {
    pub fn new(min_seconds: f64, max_seconds: f64) -> Self {
        let floor = min_seconds.max(0.0);
        Self {
            min_seconds: floor,
            max_seconds: max_seconds.max(floor),
        }
    }

    /// Muestra una espera uniforme dentro de la ventana.
    pub fn sample(&self) -> Duration {
        if self.max_seconds <= self.min_seconds {
            return Duration::from_secs_f64(self.min_seconds);
        }
        let drawn = rand::thread_rng().gen_range(self.min_seconds..=self.max_seconds);
        Duration::from_secs_f64(drawn)
    }

    pub async fn sleep(&self) {
        let pause = self.sample();
        debug!("🕰️ [JITTER]: Sleeping {:.1}s between calls.", pause.as_secs_f64());
        tokio::time::sleep(pause).await;
    }
}

// --- BACKOFF EXPONENCIAL PARA 429 ---

/// Backoff exponencial para rechazos 429: arranca en 120 s, duplica
/// por 429 consecutivo, techo 900 s. Un `Retry-After` mayor al
/// cómputo local siempre gana.
#[derive(Debug)]
pub struct QuotaBackoff {
    base: Duration,
    ceiling: Duration,
    consecutive_rejections: u32,
}

impl Default for QuotaBackoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(120),
            ceiling: Duration::from_secs(900),
            consecutive_rejections: 0,
        }
    }
}

impl QuotaBackoff {
    /// Registra un 429 y retorna la espera a aplicar.
    pub fn register_rate_limit(&mut self, retry_after_seconds: Option<u64>) -> Duration {
        let exponent = self.consecutive_rejections.min(8);
        let computed = self.base * 2u32.pow(exponent);
        let computed = computed.min(self.ceiling);
        self.consecutive_rejections = self.consecutive_rejections.saturating_add(1);

        match retry_after_seconds {
            Some(hinted) if Duration::from_secs(hinted) > computed => Duration::from_secs(hinted),
            _ => computed,
        }
    }

    pub fn register_success(&mut self) {
        self.consecutive_rejections = 0;
    }
}

// --- CUOTA HORARIA POR CREDENCIAL ---

/// Cuota deslizante por ventana fija de una hora (token-scoped).
#[derive(Debug)]
pub struct HourlyQuota {
    limit: u32,
    window_started: Instant,
    consumed: u32,
}

impl HourlyQuota {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            window_started: Instant::now(),
            consumed: 0,
        }
    }

    /// Intenta consumir un turno; `Err` trae la espera hasta el
    /// reinicio de la ventana.
    pub fn try_consume(&mut self) -> Result<(), Duration> {
        let window = Duration::from_secs(3_600);
        let elapsed = self.window_started.elapsed();

        if elapsed >= window {
            self.window_started = Instant::now();
            self.consumed = 0;
        }

        if self.consumed >= self.limit {
            return Err(window.saturating_sub(elapsed));
        }

        self.consumed += 1;
        Ok(())
    }

    pub fn consumed(&self) -> u32 {
        self.consumed
    }
}

// --- PRESUPUESTO MENSUAL ORGANIZACIONAL ---

/// Contador de presupuesto mensual compartido por la organización.
/// El marcador persistente vive en `system_state`; este contador
/// protege el proceso en curso.
pub struct MonthlyBudget {
    limit: u32,
    consumed: AtomicU32,
    label: &'static str,
}

impl MonthlyBudget {
    pub fn new(limit: u32, label: &'static str) -> Self {
        Self { limit, consumed: AtomicU32::new(0), label }
    }

    /// Siembra el contador con el consumo ya registrado en el ledger.
    pub fn seed(&self, already_consumed: u32) {
        self.consumed.store(already_consumed, Ordering::Relaxed);
    }

    pub fn try_consume(&self) -> Result<u32, RemoteError> {
        let position = self.consumed.fetch_add(1, Ordering::Relaxed) + 1;
        if position > self.limit {
            return Err(RemoteError::QuotaExhausted(format!(
                "{}: {} of {} monthly requests spent", self.label, position, self.limit
            )));
        }
        if position * 10 >= self.limit * 9 {
            warn!("🛑 [BUDGET]: {} at {}/{} monthly requests.", self.label, position, self.limit);
        }
        Ok(position)
    }

    pub fn consumed(&self) -> u32 {
        self.consumed.load(Ordering::Relaxed)
    }
}

// --- REINTENTO TRANSITORIO CON JITTER ---

/// Reintenta una operación ante fallos transitorios (transporte, 5xx)
/// con backoff exponencial más jitter. Los fallos no transitorios se
/// propagan de inmediato.
pub async fn retry_transient<T, F, Fut>(
    max_attempts: u32,
    operation_label: &str,
    mut operation: F,
) -> Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(fault) if fault.is_transient() && attempt + 1 < max_attempts => {
                let jitter_ms = rand::thread_rng().gen_range(0..500u64);
                let pause = Duration::from_millis(500 * 2u64.pow(attempt.min(6)) + jitter_ms);
                warn!(
                    "🔁 [RETRY]: {} transient fault (attempt {}/{}): {}. Backing off {}ms.",
                    operation_label, attempt + 1, max_attempts, fault, pause.as_millis()
                );
                tokio::time::sleep(pause).await;
                attempt += 1;
            }
            Err(fault) => return Err(fault),
        }
    }
}
