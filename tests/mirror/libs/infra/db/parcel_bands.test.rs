// [tests/mirror/libs/infra/db/parcel_bands.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE BANDAS DE PARCELA (V5.1 - ZENITH)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE SELECCIÓN, PERSISTENCIA E IDEMPOTENCIA
 *
 * # Contratos auditados:
 * 1. `scan_pass` es monotónicamente no decreciente bajo cualquier
 *    intercalado de pases (MAX en SQL, no en memoria).
 * 2. Persistir la misma banda dos veces produce valores idénticos.
 * 3. La selección de cada pase respeta su predicado.
 * 4. `scan_pass ≥ 2` implica `sentinel_scan_date` no nulo.
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use catastro_domain_models::{
        BulkScanBand, FlagSheet, FloodRiskTier, ParcelIdentity, SentinelBand,
        TrendDirection, VacancyBand,
    };
    use catastro_infra_db::repositories::ParcelRepository;
    use catastro_infra_db::LedgerClient;

    async fn anchored_ledger(db_label: &str) -> LedgerClient {
        LedgerClient::connect(
            &format!("file:{db_label}?mode=memory&cache=shared"),
            None,
        )
        .await
        .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.")
    }

    async fn inject_parcel(client: &LedgerClient, uuid: &str, parcel_id: &str, county: &str, state: &str) {
        let connection = client.fresh_connection().expect("POOL_FAULT");
        connection.execute(
            "INSERT INTO parcels (parcel_uuid, parcel_id, county_name, state_code, latitude, longitude)
             VALUES (?1, ?2, ?3, ?4, 35.2621, -81.1432)",
            libsql::params![uuid.to_string(), parcel_id.to_string(), county.to_string(), state.to_string()],
        ).await.expect("GENESIS_INJECTION_FAULT");
    }

    fn sample_bulk_band() -> BulkScanBand {
        BulkScanBand {
            ndvi_current: Some(0.72),
            ndvi_category: Some("dense".to_string()),
            fema_flood_zone: Some("X".to_string()),
            fema_sfha: false,
            fema_risk_tier: FloodRiskTier::Low,
            distress_score: 1.2,
            flags: FlagSheet {
                flag_overgrowth: true,
                conf_overgrowth: Some(0.6),
                ..Default::default()
            },
            sentinel_worthy: false,
            scan_date: "2026-07-01".to_string(),
            scan_error: None,
        }
    }

    fn sample_sentinel_band() -> SentinelBand {
        SentinelBand {
            trend: TrendDirection::Falling,
            slope: Some(-0.012),
            ndvi_latest: Some(0.31),
            month_count: 18,
            ndvi_mean: Some(0.38),
            source: "sentinel".to_string(),
            chart_url: None,
            scan_date: "2026-07-02".to_string(),
        }
    }

    async fn read_scan_state(client: &LedgerClient, parcel_id: &str) -> (i64, Option<f64>, Option<String>) {
        let connection = client.fresh_connection().expect("POOL_FAULT");
        let mut rows = connection.query(
            "SELECT COALESCE(scan_pass, 0), distress_score, sentinel_scan_date
             FROM parcels WHERE parcel_id = ?1",
            libsql::params![parcel_id.to_string()],
        ).await.expect("STATE_QUERY_FAULT");

        let row = rows.next().await.expect("ROW_FAULT").expect("PARCEL_VOID");
        (
            row.get::<i64>(0).expect("PASS_FAULT"),
            row.get::<Option<f64>>(1).ok().flatten(),
            row.get::<Option<String>>(2).ok().flatten(),
        )
    }

    /**
     * CERTIFICACIÓN: ciclo selección -> banda -> re-selección vacía,
     * con doble persistencia bit-idéntica (idempotencia).
     */
    #[tokio::test]
    async fn certify_bulk_band_roundtrip_and_idempotence() {
        println!("\n🗄️  [INICIO]: Auditando banda del Pase 1...");
        let client = anchored_ledger("mem_parcel_bands_bulk").await;
        inject_parcel(&client, "uuid-b1", "B-001", "Gaston", "NC").await;

        let repository = ParcelRepository::new(client.clone());

        // 1. SELECCIÓN: la parcela con coordenadas y pase 0 es elegible.
        let candidates = repository.select_bulk_candidates(100).await.expect("SELECT_FAULT");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].identity.parcel_id, "B-001");

        // 2. PERSISTENCIA: el conteo viene de la carga comprometida.
        let identity = ParcelIdentity::new("B-001", "Gaston", "NC");
        let payload = vec![(identity.clone(), sample_bulk_band())];
        let committed = repository.persist_bulk_band(&payload).await.expect("PERSIST_FAULT");
        assert_eq!(committed, 1);

        // 3. RE-SELECCIÓN: pase 1 sellado, la parcela sale de la cola.
        let requeued = repository.select_bulk_candidates(100).await.expect("SELECT_FAULT");
        assert!(requeued.is_empty(), "PASS_1_LEAK: parcel re-selected after banding.");

        // 4. IDEMPOTENCIA: segunda persistencia, valores idénticos.
        let state_first = read_scan_state(&client, "B-001").await;
        repository.persist_bulk_band(&payload).await.expect("PERSIST_FAULT");
        let state_second = read_scan_state(&client, "B-001").await;
        assert_eq!(state_first, state_second, "IDEMPOTENCE_FAULT: re-run drifted values.");

        println!("✅ BANDS: Bulk roundtrip and idempotence certified.");
    }

    /**
     * CERTIFICACIÓN: `scan_pass` jamás retrocede bajo intercalados
     * arbitrarios (2 -> 3 -> re-1 -> re-2), y el invariante
     * `scan_pass ≥ 2 ⇒ sentinel_scan_date` queda sellado.
     */
    #[tokio::test]
    async fn certify_scan_pass_monotonic_interleaving() {
        println!("\n🗄️  [INICIO]: Auditando monotonicidad de scan_pass...");
        let client = anchored_ledger("mem_parcel_bands_monotonic").await;
        inject_parcel(&client, "uuid-m1", "M-001", "Gaston", "NC").await;

        let repository = ParcelRepository::new(client.clone());
        let identity = ParcelIdentity::new("M-001", "Gaston", "NC");

        // Pase 1.5b primero (satelital): avanza a 2.
        repository.persist_sentinel_band(&[(identity.clone(), sample_sentinel_band())])
            .await.expect("PERSIST_FAULT");
        let (pass_after_sentinel, _, sentinel_date) = read_scan_state(&client, "M-001").await;
        assert_eq!(pass_after_sentinel, 2);
        assert!(sentinel_date.is_some(), "INVARIANT_FAULT: pass ≥ 2 without sentinel_scan_date.");

        // Pase 2 (vacancia): avanza a 3.
        let vacancy_band = VacancyBand {
            usps_vacant: true,
            usps_dpv_confirmed: Some(true),
            usps_check_date: "2026-07-03".to_string(),
            flag_vacancy: true,
            vacancy_confidence: Some(0.90),
            ..Default::default()
        };
        repository.persist_vacancy_band(&[(identity.clone(), vacancy_band)])
            .await.expect("PERSIST_FAULT");
        assert_eq!(read_scan_state(&client, "M-001").await.0, 3);

        // Re-corrida del Pase 1: el pase NO retrocede (MAX en SQL).
        repository.persist_bulk_band(&[(identity.clone(), sample_bulk_band())])
            .await.expect("PERSIST_FAULT");
        assert_eq!(read_scan_state(&client, "M-001").await.0, 3, "MONOTONIC_FAULT: pass downgraded.");

        // Re-corrida del Pase 1.5b: sigue en 3.
        repository.persist_sentinel_band(&[(identity, sample_sentinel_band())])
            .await.expect("PERSIST_FAULT");
        assert_eq!(read_scan_state(&client, "M-001").await.0, 3);

        println!("✅ BANDS: Monotonic advancement certified under interleaving.");
    }

    /**
     * CERTIFICACIÓN: predicados de selección del 1.5b y del Pase 2.
     */
    #[tokio::test]
    async fn certify_selection_predicates() {
        let client = anchored_ledger("mem_parcel_bands_selection").await;
        inject_parcel(&client, "uuid-s1", "S-001", "Gaston", "NC").await;
        inject_parcel(&client, "uuid-s2", "S-002", "Gaston", "NC").await;

        let repository = ParcelRepository::new(client.clone());

        // S-001 digna de satélite; S-002 no.
        let mut worthy_band = sample_bulk_band();
        worthy_band.sentinel_worthy = true;
        repository.persist_bulk_band(&[
            (ParcelIdentity::new("S-001", "Gaston", "NC"), worthy_band),
            (ParcelIdentity::new("S-002", "Gaston", "NC"), sample_bulk_band()),
        ]).await.expect("PERSIST_FAULT");

        let sentinel_queue = repository.select_sentinel_candidates(100).await.expect("SELECT_FAULT");
        assert_eq!(sentinel_queue.len(), 1);
        assert_eq!(sentinel_queue[0].identity.parcel_id, "S-001");

        // Tras enriquecer, sale de la cola satelital.
        repository.persist_sentinel_band(&[
            (ParcelIdentity::new("S-001", "Gaston", "NC"), sample_sentinel_band()),
        ]).await.expect("PERSIST_FAULT");
        assert!(repository.select_sentinel_candidates(100).await.expect("SELECT_FAULT").is_empty());

        // Pase 2: solo compuesto ≥ piso y sin chequeo previo.
        let connection = client.fresh_connection().expect("POOL_FAULT");
        connection.execute(
            "UPDATE parcels SET distress_composite = 8.1, situs_address = '101 Oak St',
                    situs_city = 'Gastonia', situs_zip = '28052'
             WHERE parcel_id = 'S-001'",
            (),
        ).await.expect("COMPOSITE_SEED_FAULT");
        connection.execute(
            "UPDATE parcels SET distress_composite = 3.0 WHERE parcel_id = 'S-002'",
            (),
        ).await.expect("COMPOSITE_SEED_FAULT");

        let vacancy_queue = repository.select_vacancy_candidates(7.5, 100).await.expect("SELECT_FAULT");
        assert_eq!(vacancy_queue.len(), 1);
        assert_eq!(vacancy_queue[0].item.identity.parcel_id, "S-001");
        assert_eq!(vacancy_queue[0].parcel_uuid, "uuid-s1");

        println!("✅ BANDS: Selection predicates certified.");
    }
}
