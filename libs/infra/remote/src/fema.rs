// [libs/infra/remote/src/fema.rs]
/*!
 * =================================================================
 * APARATO: FLOOD HAZARD LAYER CLIENT (V5.1)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L4)
 * RESPONSABILIDAD: CLASIFICACIÓN DE ZONA DE INUNDACIÓN POR PUNTO
 *
 * # Campos disponibles en la capa:
 * FLD_ZONE, SFHA_TF, ZONE_SUBTY, FLD_AR_ID, STATIC_BFE.
 * La capa NO publica un campo FLOODWAY; referenciarlo rompe la
 * consulta. La zona X exige inspeccionar ZONE_SUBTY ("MINIMAL" =
 * bajo, "500" = moderado).
 * =================================================================
 */

use crate::cache::SharedLruCache;
use crate::errors::RemoteError;
use crate::limiter::retry_transient;
use catastro_domain_models::{FloodDetermination, FloodRiskTier};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

const FLOOD_MAX_ATTEMPTS: u32 = 3;
/// Campos exactos de la capa; FLOODWAY no existe aquí.
const LAYER_OUT_FIELDS: &str = "FLD_ZONE,SFHA_TF,ZONE_SUBTY,FLD_AR_ID,STATIC_BFE";
/// Capacidad de la LRU de determinaciones (puntos vecinos comparten zona).
const FLOOD_LRU_CAPACITY: usize = 50_000;

#[derive(Deserialize)]
struct FloodQueryEnvelope {
    #[serde(default)]
    features: Vec<FloodFeature>,
}

#[derive(Deserialize)]
struct FloodFeature {
    attributes: FloodAttributes,
}

#[derive(Deserialize)]
struct FloodAttributes {
    #[serde(rename = "FLD_ZONE")]
    flood_zone: Option<String>,
    #[serde(rename = "SFHA_TF")]
    special_hazard_flag: Option<String>,
    #[serde(rename = "ZONE_SUBTY")]
    zone_subtype: Option<String>,
    #[serde(rename = "FLD_AR_ID")]
    area_id: Option<String>,
    #[serde(rename = "STATIC_BFE")]
    static_bfe: Option<f64>,
}

pub struct FloodHazardClient {
    http_session: Client,
    query_endpoint: String,
    /// Caché en memoria llaveada por coordenada redondeada (~100 m).
    determination_cache: SharedLruCache<(i64, i64), FloodDetermination>,
}

impl FloodHazardClient {
    pub fn new(layer_endpoint: &str) -> Self {
        Self {
            http_session: Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent("Catastro-Field-Engine/V5.1")
                .build()
                .expect("CRITICAL: Failed to initialize flood HTTP session"),
            query_endpoint: format!("{}/query", layer_endpoint.trim_end_matches('/')),
            determination_cache: SharedLruCache::with_capacity(FLOOD_LRU_CAPACITY),
        }
    }

    /// Clasifica el punto contra la capa de peligro.
    /// Sin impacto en la capa -> riesgo NONE (no es un error).
    #[instrument(skip(self))]
    pub async fn classify_point(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<FloodDetermination, RemoteError> {
        let cache_key = (
            (latitude * 1_000.0).round() as i64,
            (longitude * 1_000.0).round() as i64,
        );

        if let Some(cached) = self.determination_cache.get(&cache_key) {
            debug!("📦 [FLOOD_CACHE]: Hit for ({latitude:.4}, {longitude:.4}).");
            return Ok(cached);
        }

        let url = format!(
            "{}?f=json&geometryType=esriGeometryPoint&geometry={longitude},{latitude}&inSR=4326&spatialRel=esriSpatialRelIntersects&outFields={LAYER_OUT_FIELDS}&returnGeometry=false",
            self.query_endpoint
        );

        let session = self.http_session.clone();
        let envelope: FloodQueryEnvelope = retry_transient(FLOOD_MAX_ATTEMPTS, "flood_query", move || {
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
                    .map_err(|fault| RemoteError::PayloadShape(format!("flood query: {fault}")))
            }
        }).await?;

        let determination = match envelope.features.into_iter().next() {
            Some(feature) => determination_from_attributes(feature.attributes),
            None => FloodDetermination::default(),
        };

        self.determination_cache.put(cache_key, determination.clone());
        Ok(determination)
    }
}

fn determination_from_attributes(attributes: FloodAttributes) -> FloodDetermination {
    let risk = FloodRiskTier::classify(
        attributes.flood_zone.as_deref(),
        attributes.zone_subtype.as_deref(),
    );

    FloodDetermination {
        special_hazard: attributes.special_hazard_flag.as_deref()
            .map(|flag| flag.eq_ignore_ascii_case("T"))
            .unwrap_or(false),
        zone: attributes.flood_zone,
        zone_subtype: attributes.zone_subtype,
        area_id: attributes.area_id,
        static_bfe: attributes.static_bfe,
        risk,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn certify_high_risk_determination() {
        let payload = r#"{"features":[{"attributes":{
            "FLD_ZONE":"AE","SFHA_TF":"T","ZONE_SUBTY":null,
            "FLD_AR_ID":"37071C_1234","STATIC_BFE":712.4
        }}]}"#;

        let envelope: FloodQueryEnvelope = serde_json::from_str(payload).expect("schema");
        let determination = determination_from_attributes(
            envelope.features.into_iter().next().unwrap().attributes
        );

        assert_eq!(determination.risk, FloodRiskTier::High);
        assert!(determination.special_hazard);
        assert_eq!(determination.zone.as_deref(), Some("AE"));
        assert_eq!(determination.static_bfe, Some(712.4));
    }

    #[test]
    fn certify_zone_x_requires_subtype_inspection() {
        let minimal = determination_from_attributes(FloodAttributes {
            flood_zone: Some("X".into()),
            special_hazard_flag: Some("F".into()),
            zone_subtype: Some("AREA OF MINIMAL FLOOD HAZARD".into()),
            area_id: None,
            static_bfe: None,
        });
        assert_eq!(minimal.risk, FloodRiskTier::Low);
        assert!(!minimal.special_hazard);

        let moderate = determination_from_attributes(FloodAttributes {
            flood_zone: Some("X".into()),
            special_hazard_flag: Some("F".into()),
            zone_subtype: Some("0.2 PCT ANNUAL CHANCE FLOOD HAZARD (500-YEAR)".into()),
            area_id: None,
            static_bfe: None,
        });
        assert_eq!(moderate.risk, FloodRiskTier::Moderate);
    }

    #[test]
    fn certify_empty_layer_hit_is_none_tier() {
        let payload = r#"{"features":[]}"#;
        let envelope: FloodQueryEnvelope = serde_json::from_str(payload).expect("schema");
        assert!(envelope.features.is_empty());

        let determination = FloodDetermination::default();
        assert_eq!(determination.risk, FloodRiskTier::None);
        assert!(!determination.special_hazard);
    }
}
