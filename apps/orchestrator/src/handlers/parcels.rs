// [apps/orchestrator/src/handlers/parcels.rs]
/*!
 * =================================================================
 * APARATO: PARCEL QUERY HANDLER (V5.1)
 * CLASIFICACIÓN: API ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: LECTURA FILTRADA CON SUB-REGISTROS AGRUPADOS
 * =================================================================
 */

use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use catastro_domain_models::ParcelQueryFilters;
use catastro_infra_db::repositories::ParcelRepository;
use serde_json::json;
use tracing::{error, instrument};

pub struct ParcelQueryHandler;

impl ParcelQueryHandler {
    /**
     * GET /api/v1/parcels
     * Filtros: condado, estado, clase, rangos de valor/superficie/ZIP/
     * puntaje, banderas, zona FEMA, solo-escaneadas, orden, límite y
     * desplazamiento. La respuesta agrupa sub-objetos por parcela y
     * las llaves del sub-objeto de vacancia van prefijadas (`usps_*`).
     */
    #[instrument(skip(application_state, filters))]
    pub async fn handle_query(
        State(application_state): State<AppState>,
        Query(filters): Query<ParcelQueryFilters>,
    ) -> impl IntoResponse {
        let repository = ParcelRepository::new(application_state.ledger.clone());

        match repository.query_parcels(&filters).await {
            Ok(grouped_records) => (
                StatusCode::OK,
                Json(json!({
                    "count": grouped_records.len(),
                    "parcels": grouped_records,
                })),
            ),
            Err(query_fault) => {
                error!("❌ [PARCEL_QUERY]: {query_fault}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "LEDGER_QUERY_FAULT" })),
                )
            }
        }
    }
}
