// [tests/mirror/libs/infra/db/schema_evolution.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE EVOLUCIÓN DE ESQUEMA (V5.0 - ZENITH)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE MIGRACIONES IDEMPOTENTES SIN CANDADO
 *
 * # Contrato auditado:
 * Los grupos de migración nombrados (scan, satellite, vacancy,
 * high_res, composite, conviction) inspeccionan el catálogo de
 * columnas antes de cualquier DDL; con el grupo completo el DDL se
 * salta por entero, y una re-aplicación en caliente jamás colapsa.
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use catastro_infra_db::{apply_catastral_schema, LedgerClient};
    use std::collections::HashSet;

    async fn read_column_catalog(client: &LedgerClient) -> HashSet<String> {
        let connection = client.fresh_connection().expect("POOL_FAULT: connection denied.");
        let mut rows = connection.query("PRAGMA table_info(parcels)", ()).await
            .expect("PRAGMA_FAULT: column catalog rejected.");

        let mut catalog = HashSet::new();
        while let Some(row) = rows.next().await.expect("ROW_FAULT") {
            catalog.insert(row.get::<String>(1).expect("NAME_FAULT"));
        }
        catalog
    }

    /**
     * CERTIFICACIÓN: los seis grupos de banda quedan nivelados tras
     * la conexión y la re-aplicación es un no-op sin errores.
     */
    #[tokio::test]
    async fn certify_band_groups_and_idempotent_reapply() {
        println!("\n🏗️  [INICIO]: Auditando evolución de esquema...");

        let client = LedgerClient::connect("file:mem_schema_evolution?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

        // 1. CATÁLOGO COMPLETO TRAS LA CONEXIÓN
        let catalog = read_column_catalog(&client).await;
        for expected_column in [
            // scan
            "ndvi_current", "ndvi_category", "fema_flood_zone", "fema_sfha", "fema_risk_tier",
            "distress_score", "flag_overgrowth", "conf_overgrowth", "flag_neglect", "conf_neglect",
            "flag_flood", "conf_flood", "flag_structural", "conf_structural",
            "scan_pass", "scan_date", "sentinel_worthy", "scan_error",
            // satellite
            "sentinel_trend", "sentinel_slope", "sentinel_ndvi_latest", "sentinel_month_count",
            "sentinel_ndvi_mean", "sentinel_source", "sentinel_chart_url", "sentinel_scan_date",
            // vacancy
            "usps_address", "usps_city", "usps_zip", "usps_zip4", "usps_vacant",
            "usps_dpv_confirmed", "usps_business", "usps_address_mismatch", "usps_check_date",
            "usps_error", "flag_vacancy", "vacancy_confidence",
            // high_res
            "planet_scene_count", "planet_change_score", "planet_span_days",
            "planet_earliest_date", "planet_latest_date", "planet_earliest_thumb",
            "planet_latest_thumb", "planet_scan_date",
            // composite
            "ndvi_slope_5yr", "ndvi_slope_pctile", "ndvi_vintage_count", "ndvi_year_span",
            "distress_composite", "composite_date",
            // conviction
            "conviction_score", "conviction_base_score", "conviction_vacancy_bonus",
            "conviction_mc_score", "conviction_components", "mc_signal_count",
            "mc_signal_codes", "conviction_date",
        ] {
            assert!(catalog.contains(expected_column), "MISSING_COLUMN: {expected_column}");
        }

        // 2. RE-APLICACIÓN EN CALIENTE (catálogo completo -> skip total)
        let connection = client.fresh_connection().expect("POOL_FAULT");
        apply_catastral_schema(&connection).await
            .expect("IDEMPOTENCE_FAULT: hot re-apply must be a clean no-op.");

        let catalog_after = read_column_catalog(&client).await;
        assert_eq!(catalog, catalog_after, "SCHEMA_DRIFT: re-apply mutated the catalog.");
        println!("✅ SCHEMA: Band groups level; hot re-apply certified.");
    }

    /**
     * CERTIFICACIÓN: índices de aceleración presentes, incluido el
     * de convicción descendente para lecturas ordenadas.
     */
    #[tokio::test]
    async fn certify_acceleration_indexes() {
        let client = LedgerClient::connect("file:mem_schema_indexes?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

        let connection = client.fresh_connection().expect("POOL_FAULT");
        let mut rows = connection.query(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%'",
            (),
        ).await.expect("INDEX_QUERY_FAULT");

        let mut index_names = Vec::new();
        while let Some(row) = rows.next().await.expect("ROW_FAULT") {
            index_names.push(row.get::<String>(0).expect("NAME_FAULT"));
        }

        for expected_index in [
            "idx_parcels_ndvi_current", "idx_parcels_distress_score", "idx_parcels_flood_zone",
            "idx_parcels_flag_overgrowth", "idx_parcels_flag_neglect", "idx_parcels_flag_flood",
            "idx_parcels_flag_structural", "idx_parcels_flag_vacancy", "idx_parcels_scan_date",
            "idx_parcels_sentinel_date", "idx_parcels_sentinel_trend", "idx_parcels_usps_vacant",
            "idx_parcels_usps_date", "idx_parcels_composite", "idx_parcels_conviction_desc",
        ] {
            assert!(
                index_names.iter().any(|name| name == expected_index),
                "MISSING_INDEX: {expected_index}"
            );
        }
        println!("✅ INDEXES: Acceleration layer certified ({} indexes).", index_names.len());
    }
}
