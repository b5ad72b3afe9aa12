// [libs/infra/remote/src/lib.rs]
/*!
 * =================================================================
 * APARATO: REMOTE SOURCE STACK (V6.2 - GOLD MASTER)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L4)
 * RESPONSABILIDAD: REGISTRO ÚNICO DE CLIENTES DE FUENTES REMOTAS
 *
 * VISION HIPER-HOLÍSTICA:
 * Cada cliente es un adaptador delgado con efectos aislados: un set
 * de operaciones tipado, su propia envolvente de tasa y una caché
 * direccionada por contenido para respuestas costosas. El único
 * estado compartido del proceso es este registro; no existen
 * globales de limitación de tasa.
 * =================================================================
 */

pub mod errors;
pub mod limiter;
pub mod cache;
pub mod naip;
pub mod stac;
pub mod fema;
pub mod sentinel;
pub mod planet;
pub mod usps;

pub use errors::RemoteError;
pub use limiter::{retry_transient, HourlyQuota, JitterWindow, MonthlyBudget, PacedLimiter, QuotaBackoff};
pub use cache::{content_address, DiskResponseCache, SharedLruCache};
pub use naip::{ndvi_from_bands, AerialImageryClient, AerialVintageReading};
pub use stac::{HistoricalVintageClient, VintageSeries};
pub use fema::FloodHazardClient;
pub use sentinel::{MonthlyNdvi, SatelliteFallbackClient, SatelliteStatsClient};
pub use planet::{cooldown_active, HighResImageryClient, TemporalPair, RESCAN_COOLDOWN_DAYS};
pub use usps::{CarrierVacancyClient, VacancyClientConfig};

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

// --- ENDPOINTS POR DEFECTO (sobreescribibles por entorno) ---

const DEFAULT_AERIAL_ENDPOINT: &str =
    "https://gis.apfo.usda.gov/arcgis/rest/services/NAIP/USDA_CONUS_PRIME/ImageServer";
const DEFAULT_FLOOD_ENDPOINT: &str =
    "https://hazards.fema.gov/gis/nfhl/rest/services/public/NFHL/MapServer/28";
const DEFAULT_STAC_ENDPOINT: &str =
    "https://planetarycomputer.microsoft.com/api/stac/v1";
const DEFAULT_STAC_SAMPLER_ENDPOINT: &str =
    "https://planetarycomputer.microsoft.com/api/data/v1";
const DEFAULT_SATELLITE_ENDPOINT: &str = "https://services.sentinel-hub.com";
const DEFAULT_SATELLITE_FALLBACK_ENDPOINT: &str =
    "https://sentinel.arcgis.com/arcgis/rest/services/Sentinel2/ImageServer";
const DEFAULT_HIGH_RES_ENDPOINT: &str = "https://api.planet.com/data/v1";

fn env_or(environment_key: &str, default_value: &str) -> String {
    std::env::var(environment_key).unwrap_or_else(|_| default_value.to_string())
}

/// Registro único de clientes remotos del proceso.
///
/// Los clientes gratuitos siempre se aprovisionan; los pagos o con
/// credencial (satelital primario, alta resolución, vacancia) son
/// opcionales y su ausencia degrada el pase correspondiente con un
/// aviso, jamás con un colapso.
pub struct RemoteSourceRegistry {
    pub aerial: Arc<AerialImageryClient>,
    pub historical: Arc<HistoricalVintageClient>,
    pub flood: Arc<FloodHazardClient>,
    pub satellite: Option<Arc<SatelliteStatsClient>>,
    pub satellite_fallback: Arc<SatelliteFallbackClient>,
    pub high_res: Option<Arc<HighResImageryClient>>,
    pub vacancy: Option<Arc<CarrierVacancyClient>>,
}

impl RemoteSourceRegistry {
    /// Aprovisiona el registro desde el entorno del proceso.
    pub fn provision_from_env() -> Result<Self, RemoteError> {
        let aerial_cache_directory = PathBuf::from(
            env_or("AERIAL_CACHE_DIR", "dist/cache/aerial")
        );

        let aerial = Arc::new(AerialImageryClient::new(
            &env_or("AERIAL_ENDPOINT", DEFAULT_AERIAL_ENDPOINT),
            aerial_cache_directory,
        ));

        let historical = Arc::new(HistoricalVintageClient::new(
            &env_or("STAC_ENDPOINT", DEFAULT_STAC_ENDPOINT),
            &env_or("STAC_SAMPLER_ENDPOINT", DEFAULT_STAC_SAMPLER_ENDPOINT),
        ));

        let flood = Arc::new(FloodHazardClient::new(
            &env_or("FLOOD_ENDPOINT", DEFAULT_FLOOD_ENDPOINT),
        ));

        let satellite = match (std::env::var("SENTINEL_CLIENT_ID"), std::env::var("SENTINEL_CLIENT_SECRET")) {
            (Ok(client_id), Ok(client_secret)) => {
                Some(Arc::new(SatelliteStatsClient::new(
                    &env_or("SENTINEL_ENDPOINT", DEFAULT_SATELLITE_ENDPOINT),
                    client_id,
                    client_secret,
                )))
            }
            _ => {
                warn!("⚪ [REGISTRY]: Satellite credentials absent. Pass 1.5b will rely on the free fallback.");
                None
            }
        };

        let satellite_fallback = Arc::new(SatelliteFallbackClient::new(
            &env_or("SENTINEL_FALLBACK_ENDPOINT", DEFAULT_SATELLITE_FALLBACK_ENDPOINT),
        ));

        let high_res = match std::env::var("PLANET_API_KEY") {
            Ok(api_key) if !api_key.trim().is_empty() => {
                Some(Arc::new(HighResImageryClient::new(
                    &env_or("PLANET_ENDPOINT", DEFAULT_HIGH_RES_ENDPOINT),
                    api_key,
                )))
            }
            _ => {
                warn!("⚪ [REGISTRY]: High-res token absent. High-res search disabled.");
                None
            }
        };

        let vacancy = match VacancyClientConfig::discover_from_env() {
            Some(config) => {
                let account_total = config.credential_pairs.len();
                let client = CarrierVacancyClient::new(config)?;
                info!("📮 [REGISTRY]: Vacancy client provisioned with {account_total} account(s).");
                Some(Arc::new(client))
            }
            None => {
                warn!("⚪ [REGISTRY]: Vacancy credentials absent. Pass 2 disabled.");
                None
            }
        };

        info!("🛰️ [REGISTRY]: Remote source stack provisioned.");
        Ok(Self {
            aerial,
            historical,
            flood,
            satellite,
            satellite_fallback,
            high_res,
            vacancy,
        })
    }
}
