// [apps/orchestrator/src/handlers/scan.rs]
/*!
 * =================================================================
 * APARATO: ON-DEMAND SCAN HANDLER (V5.3 - DELEGATING)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: ESCANEOS POR PARCELA VÍA CLIENTES Y EVALUADORES
 *
 * VISION HIPER-HOLÍSTICA:
 * Cada endpoint delega en los MISMOS clientes remotos, evaluadores y
 * composers de banda que los pases por lotes; cuando la petición
 * trae la identidad canónica (`parcel_id, county, state`) el
 * resultado también se persiste sobre la fila de la parcela. La
 * bandera `force` perfora las guardias de enfriamiento (alta
 * resolución: 60 días).
 * =================================================================
 */

use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use catastro_domain_models::{
    EvidenceBundle, NdviReading, NdviSource, ParcelIdentity, PlanetBand,
};
use catastro_field_scanner::passes::bulk_scan::compose_bulk_band;
use catastro_field_scanner::passes::sentinel_enrichment::compose_sentinel_band;
use catastro_field_scanner::passes::vacancy_sweep::compose_vacancy_band;
use catastro_field_scanner::scan_date_today;
use catastro_infra_db::repositories::{ParcelRepository, VacancyAuditRepository};
use catastro_infra_remote::cooldown_active;
use serde::Deserialize;
use serde_json::json;
use tracing::{instrument, warn};

/// Parámetros comunes: `lat,lng` obligatorios; identidad opcional.
#[derive(Debug, Deserialize)]
pub struct PointScanQuery {
    pub lat: f64,
    pub lng: f64,
    pub parcel_id: Option<String>,
    pub county: Option<String>,
    pub state: Option<String>,
    #[serde(default)]
    pub force: bool,
}

impl PointScanQuery {
    fn identity(&self) -> Option<ParcelIdentity> {
        match (&self.parcel_id, &self.county, &self.state) {
            (Some(parcel_id), Some(county), Some(state)) => {
                Some(ParcelIdentity::new(parcel_id, county, state))
            }
            _ => None,
        }
    }
}

/// Parámetros de la sonda postal por demanda.
#[derive(Debug, Deserialize)]
pub struct VacancyProbeQuery {
    pub street: String,
    pub city: String,
    pub zip: String,
    pub parcel_id: Option<String>,
    pub county: Option<String>,
    pub state: Option<String>,
}

pub struct ScanHandler;

impl ScanHandler {
    /**
     * GET /api/v1/scan/free
     * Escaneo gratuito: variante aérea rápida + zona de inundación.
     */
    #[instrument(skip(application_state))]
    pub async fn handle_free_scan(
        State(application_state): State<AppState>,
        Query(query): Query<PointScanQuery>,
    ) -> impl IntoResponse {
        let (ndvi_verdict, flood_verdict) = tokio::join!(
            application_state.remotes.aerial.current_ndvi_fast(query.lat, query.lng),
            application_state.remotes.flood.classify_point(query.lat, query.lng),
        );

        let aerial_ndvi = match ndvi_verdict {
            Ok(reading) => reading,
            Err(fault) => return remote_fault_response(&fault.to_string()),
        };
        let flood = match flood_verdict {
            Ok(determination) => Some(determination),
            Err(fault) => return remote_fault_response(&fault.to_string()),
        };

        let evidence = EvidenceBundle {
            aerial_ndvi: aerial_ndvi.map(|value| NdviReading::new(value, NdviSource::Aerial)),
            flood,
            ..Default::default()
        };

        let band = compose_bulk_band(&evidence, &scan_date_today(), None);
        persist_bulk_if_identified(&application_state, &query, &band).await;

        (StatusCode::OK, Json(json!({ "scan": "free", "band": band })))
    }

    /**
     * GET /api/v1/scan/full
     * Escaneo completo: añadas aéreas (actual + línea base histórica)
     * más zona de inundación; habilita los niveles con historia.
     */
    #[instrument(skip(application_state))]
    pub async fn handle_full_scan(
        State(application_state): State<AppState>,
        Query(query): Query<PointScanQuery>,
    ) -> impl IntoResponse {
        let (vintages_verdict, flood_verdict) = tokio::join!(
            application_state.remotes.aerial.identify_vintages(query.lat, query.lng),
            application_state.remotes.flood.classify_point(query.lat, query.lng),
        );

        let vintage_readings = match vintages_verdict {
            Ok(readings) => readings,
            Err(fault) => return remote_fault_response(&fault.to_string()),
        };
        let flood = match flood_verdict {
            Ok(determination) => Some(determination),
            Err(fault) => return remote_fault_response(&fault.to_string()),
        };

        let current_reading = vintage_readings.last()
            .and_then(|reading| reading.ndvi())
            .map(|value| NdviReading::new(value, NdviSource::Aerial));

        // Línea base: media de las añadas anteriores a la actual.
        let prior_ndvi: Vec<f64> = vintage_readings.iter()
            .take(vintage_readings.len().saturating_sub(1))
            .filter_map(|reading| reading.ndvi())
            .collect();
        let historical_baseline = if prior_ndvi.is_empty() {
            None
        } else {
            Some(prior_ndvi.iter().sum::<f64>() / prior_ndvi.len() as f64)
        };

        let evidence = EvidenceBundle {
            aerial_ndvi: current_reading,
            historical_baseline,
            flood,
            ..Default::default()
        };

        let band = compose_bulk_band(&evidence, &scan_date_today(), None);
        persist_bulk_if_identified(&application_state, &query, &band).await;

        (StatusCode::OK, Json(json!({
            "scan": "full",
            "vintage_count": vintage_readings.len(),
            "historical_baseline": historical_baseline,
            "band": band,
        })))
    }

    /**
     * GET /api/v1/scan/baseline
     * Pendiente histórica puntual desde el catálogo STAC.
     */
    #[instrument(skip(application_state))]
    pub async fn handle_baseline_scan(
        State(application_state): State<AppState>,
        Query(query): Query<PointScanQuery>,
    ) -> impl IntoResponse {
        use catastro_domain_models::HistoricalBand;
        use catastro_domain_scoring::least_squares_slope;
        use chrono::Datelike;

        let series = match application_state.remotes.historical
            .ndvi_vintages(query.lat, query.lng, chrono::Utc::now().year())
            .await
        {
            Ok(series) => series,
            Err(fault) => return remote_fault_response(&fault.to_string()),
        };

        let deduplicated_pairs = series.collect_deduplicated();
        let band = HistoricalBand {
            ndvi_slope_5yr: least_squares_slope(&deduplicated_pairs),
            ndvi_vintage_count: series.vintage_count(),
            ndvi_year_span: series.year_span(),
        };

        if let Some(identity) = query.identity() {
            let repository = ParcelRepository::new(application_state.ledger.clone());
            if let Err(persist_fault) = repository
                .persist_historical_band(&[(identity, band.clone())])
                .await
            {
                warn!("⚠️ [SCAN_BASELINE]: Persistence bypassed: {persist_fault}");
            }
        }

        (StatusCode::OK, Json(json!({
            "scan": "baseline",
            "pairs": deduplicated_pairs,
            "band": band,
        })))
    }

    /**
     * GET /api/v1/scan/enrich-satellite
     * Serie NDVI mensual satelital con respaldo gratuito.
     */
    #[instrument(skip(application_state))]
    pub async fn handle_satellite_enrichment(
        State(application_state): State<AppState>,
        Query(query): Query<PointScanQuery>,
    ) -> impl IntoResponse {
        let (monthly_series, source_tag) = match &application_state.remotes.satellite {
            Some(satellite) => {
                match satellite.monthly_mean_ndvi(query.lat, query.lng, 24).await {
                    Ok(series) if !series.is_empty() => (series, "sentinel"),
                    Ok(_) => match application_state.remotes.satellite_fallback
                        .monthly_mean_ndvi(query.lat, query.lng).await
                    {
                        Ok(series) => (series, "sentinel_fallback"),
                        Err(fault) => return remote_fault_response(&fault.to_string()),
                    },
                    Err(fault) => return remote_fault_response(&fault.to_string()),
                }
            }
            None => match application_state.remotes.satellite_fallback
                .monthly_mean_ndvi(query.lat, query.lng).await
            {
                Ok(series) => (series, "sentinel_fallback"),
                Err(fault) => return remote_fault_response(&fault.to_string()),
            },
        };

        let band = compose_sentinel_band(&monthly_series, source_tag, &scan_date_today());

        if let Some(identity) = query.identity() {
            let repository = ParcelRepository::new(application_state.ledger.clone());
            if let Err(persist_fault) = repository
                .persist_sentinel_band(&[(identity, band.clone())])
                .await
            {
                warn!("⚠️ [SCAN_SATELLITE]: Persistence bypassed: {persist_fault}");
            }
        }

        (StatusCode::OK, Json(json!({ "scan": "enrich-satellite", "band": band })))
    }

    /**
     * GET /api/v1/scan/check-vacancy
     * Sonda postal por demanda (cuenta 1, mismo jitter y cuota).
     */
    #[instrument(skip(application_state, query))]
    pub async fn handle_vacancy_check(
        State(application_state): State<AppState>,
        Query(query): Query<VacancyProbeQuery>,
    ) -> impl IntoResponse {
        let Some(vacancy_client) = application_state.remotes.vacancy.clone() else {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "VACANCY_CREDENTIALS_ABSENT" })),
            );
        };

        let probe = match vacancy_client
            .check_vacancy(0, &query.street, &query.city, &query.zip)
            .await
        {
            Ok(probe) => probe,
            Err(fault) => return remote_fault_response(&fault.to_string()),
        };

        let check_date = scan_date_today();
        let band = compose_vacancy_band(&probe, &check_date);

        if let (Some(parcel_id), Some(county), Some(state)) =
            (&query.parcel_id, &query.county, &query.state)
        {
            let identity = ParcelIdentity::new(parcel_id, county, state);
            let repository = ParcelRepository::new(application_state.ledger.clone());

            // Bitácora best-effort, llaveada por el UUID opaco.
            match repository.fetch_parcel_uuid(&identity).await {
                Ok(Some(parcel_uuid)) => {
                    let audit = VacancyAuditRepository::new(application_state.ledger.clone());
                    if let Err(audit_fault) = audit.append_probe(&parcel_uuid, &probe, &check_date).await {
                        warn!("⚠️ [SCAN_VACANCY]: Audit append bypassed: {audit_fault}");
                    }
                }
                Ok(None) => warn!("⚪ [SCAN_VACANCY]: Identity {identity} not present in ledger."),
                Err(lookup_fault) => warn!("⚠️ [SCAN_VACANCY]: UUID lookup bypassed: {lookup_fault}"),
            }

            if let Err(persist_fault) = repository
                .persist_vacancy_band(&[(identity, band.clone())])
                .await
            {
                warn!("⚠️ [SCAN_VACANCY]: Persistence bypassed: {persist_fault}");
            }
        }

        (StatusCode::OK, Json(json!({ "scan": "check-vacancy", "band": band })))
    }

    /**
     * GET /api/v1/scan/flood-lookup
     * Clasificación de zona de inundación, sin persistencia.
     */
    #[instrument(skip(application_state))]
    pub async fn handle_flood_lookup(
        State(application_state): State<AppState>,
        Query(query): Query<PointScanQuery>,
    ) -> impl IntoResponse {
        match application_state.remotes.flood.classify_point(query.lat, query.lng).await {
            Ok(determination) => (
                StatusCode::OK,
                Json(json!({ "scan": "flood-lookup", "determination": determination })),
            ),
            Err(fault) => remote_fault_response(&fault.to_string()),
        }
    }

    /**
     * GET /api/v1/scan/high-res-search
     * Búsqueda de escenas de alta resolución con guardia de 60 días
     * sobre `planet_scan_date` (perforable con `force=true`).
     */
    #[instrument(skip(application_state))]
    pub async fn handle_high_res_search(
        State(application_state): State<AppState>,
        Query(query): Query<PointScanQuery>,
    ) -> impl IntoResponse {
        let Some(high_res_client) = application_state.remotes.high_res.clone() else {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "HIGH_RES_TOKEN_ABSENT" })),
            );
        };

        let repository = ParcelRepository::new(application_state.ledger.clone());
        let identity = query.identity();

        // Guardia de re-ejecución: 60 días desde el último escaneo.
        if let Some(identity) = &identity {
            match repository.fetch_planet_scan_date(identity).await {
                Ok(last_scan_date) => {
                    let today = chrono::Utc::now().date_naive();
                    if cooldown_active(last_scan_date.as_deref(), today, query.force) {
                        return (
                            StatusCode::TOO_MANY_REQUESTS,
                            Json(json!({
                                "error": "RESCAN_COOLDOWN_ACTIVE",
                                "last_scan_date": last_scan_date,
                                "hint": "use force=true to override",
                            })),
                        );
                    }
                }
                Err(lookup_fault) => warn!("⚠️ [SCAN_HIGH_RES]: Cooldown lookup bypassed: {lookup_fault}"),
            }
        }

        let temporal_pair = match high_res_client.acquire_temporal_pair(query.lat, query.lng).await {
            Ok(pair) => pair,
            Err(fault) => return remote_fault_response(&fault.to_string()),
        };

        let scan_date = scan_date_today();
        let band = match &temporal_pair {
            Some(pair) => PlanetBand {
                scene_count: 2,
                change_score: pair.change_score(),
                span_days: pair.span_days(),
                earliest_date: Some(pair.earliest.metadata.acquired.clone()),
                latest_date: Some(pair.latest.metadata.acquired.clone()),
                earliest_thumb: pair.earliest.links.thumbnail.clone(),
                latest_thumb: pair.latest.links.thumbnail.clone(),
                scan_date: scan_date.clone(),
            },
            None => PlanetBand {
                scene_count: 0,
                scan_date: scan_date.clone(),
                ..Default::default()
            },
        };

        if let Some(identity) = identity {
            if let Err(persist_fault) = repository
                .persist_planet_band(&[(identity, band.clone())])
                .await
            {
                warn!("⚠️ [SCAN_HIGH_RES]: Persistence bypassed: {persist_fault}");
            }
        }

        (StatusCode::OK, Json(json!({ "scan": "high-res-search", "band": band })))
    }
}

async fn persist_bulk_if_identified(
    application_state: &AppState,
    query: &PointScanQuery,
    band: &catastro_domain_models::BulkScanBand,
) {
    if let Some(identity) = query.identity() {
        let repository = ParcelRepository::new(application_state.ledger.clone());
        if let Err(persist_fault) = repository
            .persist_bulk_band(&[(identity, band.clone())])
            .await
        {
            warn!("⚠️ [SCAN]: Persistence bypassed: {persist_fault}");
        }
    }
}

fn remote_fault_response(fault_label: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({ "error": "REMOTE_SOURCE_FAULT", "detail": fault_label })),
    )
}
