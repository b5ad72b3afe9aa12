// [tests/mirror/apps/field_scanner/pass_idempotence.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE IDEMPOTENCIA DE PASES (V5.1 - ZENITH)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L5-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE RE-CORRIDAS Y SECUENCIAS DE PASES
 *
 * # Contratos auditados:
 * 1. Correr cualquier pase dos veces con los mismos insumos sella
 *    valores persistidos idénticos (sin deriva de timestamps: la
 *    fecha de escaneo es un insumo del pase, no un efecto).
 * 2. La secuencia Pase 1 -> Pase 1.5 -> Pase 1 jamás degrada
 *    `scan_pass` ni borra la banda histórica.
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use catastro_domain_models::{
        EvidenceBundle, FloodDetermination, FloodRiskTier, HistoricalBand,
        NdviReading, NdviSource, ParcelIdentity,
    };
    use catastro_field_scanner::passes::bulk_scan::compose_bulk_band;
    use catastro_infra_db::repositories::ParcelRepository;
    use catastro_infra_db::LedgerClient;

    async fn anchored_ledger(db_label: &str) -> LedgerClient {
        LedgerClient::connect(&format!("file:{db_label}?mode=memory&cache=shared"), None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.")
    }

    async fn inject_parcel(client: &LedgerClient, uuid: &str, parcel_id: &str) {
        let connection = client.fresh_connection().expect("POOL_FAULT");
        connection.execute(
            "INSERT INTO parcels (parcel_uuid, parcel_id, county_name, state_code, latitude, longitude)
             VALUES (?1, ?2, 'Gaston', 'NC', 35.2621, -81.1432)",
            libsql::params![uuid.to_string(), parcel_id.to_string()],
        ).await.expect("GENESIS_INJECTION_FAULT");
    }

    async fn snapshot_scan_columns(client: &LedgerClient, parcel_id: &str) -> Vec<String> {
        let connection = client.fresh_connection().expect("POOL_FAULT");
        let mut rows = connection.query(
            "SELECT COALESCE(scan_pass, 0), ndvi_current, distress_score, scan_date,
                    ndvi_slope_5yr, ndvi_vintage_count, sentinel_worthy
             FROM parcels WHERE parcel_id = ?1",
            libsql::params![parcel_id.to_string()],
        ).await.expect("SNAPSHOT_FAULT");

        let row = rows.next().await.expect("ROW_FAULT").expect("PARCEL_VOID");
        vec![
            format!("{:?}", row.get::<i64>(0).ok()),
            format!("{:?}", row.get::<Option<f64>>(1).ok().flatten()),
            format!("{:?}", row.get::<Option<f64>>(2).ok().flatten()),
            format!("{:?}", row.get::<Option<String>>(3).ok().flatten()),
            format!("{:?}", row.get::<Option<f64>>(4).ok().flatten()),
            format!("{:?}", row.get::<Option<i64>>(5).ok().flatten()),
            format!("{:?}", row.get::<Option<i64>>(6).ok().flatten()),
        ]
    }

    fn fixture_evidence() -> EvidenceBundle {
        EvidenceBundle {
            aerial_ndvi: Some(NdviReading::new(0.22, NdviSource::Aerial)),
            flood: Some(FloodDetermination {
                zone: Some("AE".to_string()),
                special_hazard: true,
                risk: FloodRiskTier::High,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /**
     * CERTIFICACIÓN: doble corrida del Pase 1 con la misma fecha de
     * escaneo sella columnas bit-idénticas.
     */
    #[tokio::test]
    async fn certify_double_run_seals_identical_values() {
        println!("\n🔁 [INICIO]: Auditando doble corrida del Pase 1...");
        let client = anchored_ledger("mem_idempotence_double").await;
        inject_parcel(&client, "uuid-i1", "I-001").await;

        let repository = ParcelRepository::new(client.clone());
        let identity = ParcelIdentity::new("I-001", "Gaston", "NC");

        // La fecha es un INSUMO del pase: misma fecha, misma banda.
        let band = compose_bulk_band(&fixture_evidence(), "2026-07-01", None);

        repository.persist_bulk_band(&[(identity.clone(), band.clone())]).await.expect("PERSIST_FAULT");
        let first_snapshot = snapshot_scan_columns(&client, "I-001").await;

        repository.persist_bulk_band(&[(identity, band)]).await.expect("PERSIST_FAULT");
        let second_snapshot = snapshot_scan_columns(&client, "I-001").await;

        assert_eq!(first_snapshot, second_snapshot, "IDEMPOTENCE_FAULT: re-run drifted columns.");
        println!("✅ IDEMPOTENCE: Double run certified.");
    }

    /**
     * CERTIFICACIÓN: Pase 1 -> Pase 1.5 -> Pase 1 de nuevo. El pase
     * no retrocede y la banda histórica sobrevive a la re-corrida.
     */
    #[tokio::test]
    async fn certify_pass_sequence_never_downgrades() {
        println!("\n🔁 [INICIO]: Auditando secuencia 1 -> 1.5 -> 1...");
        let client = anchored_ledger("mem_idempotence_sequence").await;
        inject_parcel(&client, "uuid-i2", "I-002").await;

        let repository = ParcelRepository::new(client.clone());
        let identity = ParcelIdentity::new("I-002", "Gaston", "NC");
        let band = compose_bulk_band(&fixture_evidence(), "2026-07-01", None);

        // Pase 1.
        repository.persist_bulk_band(&[(identity.clone(), band.clone())]).await.expect("PERSIST_FAULT");

        // Pase 1.5: banda histórica.
        repository.persist_historical_band(&[(
            identity.clone(),
            HistoricalBand { ndvi_slope_5yr: Some(-0.04), ndvi_vintage_count: 6, ndvi_year_span: 5 },
        )]).await.expect("PERSIST_FAULT");

        let after_baseline = snapshot_scan_columns(&client, "I-002").await;

        // Pase 1 de nuevo: mismos insumos.
        repository.persist_bulk_band(&[(identity, band)]).await.expect("PERSIST_FAULT");
        let after_rerun = snapshot_scan_columns(&client, "I-002").await;

        assert_eq!(after_baseline, after_rerun,
            "SEQUENCE_FAULT: Pass 1 re-run degraded pass or historical band.");
        println!("✅ SEQUENCE: 1 -> 1.5 -> 1 certified non-destructive.");
    }
}
