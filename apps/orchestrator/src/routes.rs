// [apps/orchestrator/src/routes.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN ROUTING MATRIX (V5.2)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L3)
 * RESPONSABILIDAD: TOPOLOGÍA DE LA SUPERFICIE DE CONSULTA Y ESCANEO
 * =================================================================
 */

use crate::handlers::{ParcelQueryHandler, ScanHandler};
use crate::state::AppState;
use axum::http::{header, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn create_sovereign_router(application_shared_state: AppState) -> Router {
    // Escudo de red: CORS para el dashboard y herramientas de Ops.
    let network_security_shield = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3_600));

    // ESTRATO DE ESCANEO POR DEMANDA: delega en los mismos clientes
    // y evaluadores que los pases por lotes.
    let on_demand_scan_stratum = Router::new()
        .route("/free", get(ScanHandler::handle_free_scan))
        .route("/full", get(ScanHandler::handle_full_scan))
        .route("/baseline", get(ScanHandler::handle_baseline_scan))
        .route("/enrich-satellite", get(ScanHandler::handle_satellite_enrichment))
        .route("/check-vacancy", get(ScanHandler::handle_vacancy_check))
        .route("/flood-lookup", get(ScanHandler::handle_flood_lookup))
        .route("/high-res-search", get(ScanHandler::handle_high_res_search));

    Router::new()
        .route("/healthz", get(handle_health_probe))
        .nest(
            "/api/v1",
            Router::new()
                .route("/parcels", get(ParcelQueryHandler::handle_query))
                .nest("/scan", on_demand_scan_stratum),
        )
        .layer(TraceLayer::new_for_http())
        .layer(network_security_shield)
        .with_state(application_shared_state)
}

async fn handle_health_probe() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "operational" })))
}
