// [tests/mirror/libs/infra/db/composite_ranking.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE RANKING COMPUESTO (V5.2 - ZENITH)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DEL PERCENTIL POR CONDADO Y DEL COMPUESTO
 *
 * # Contratos auditados:
 * 1. El percentil se computa SOLO sobre la población del condado con
 *    pendiente, y es monótono respecto de `ndvi_slope_5yr`.
 * 2. Compuesto = (0.70 × pctile + 0.30 × fema_norm) × 10, en [0,10].
 * 3. La recomputación con la misma fecha es idempotente.
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use catastro_domain_models::{HistoricalBand, ParcelIdentity};
    use catastro_infra_db::repositories::{CompositeRepository, ParcelRepository};
    use catastro_infra_db::LedgerClient;

    async fn anchored_ledger(db_label: &str) -> LedgerClient {
        LedgerClient::connect(&format!("file:{db_label}?mode=memory&cache=shared"), None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.")
    }

    async fn inject_parcel_with_tier(
        client: &LedgerClient,
        uuid: &str,
        parcel_id: &str,
        county: &str,
        fema_tier: &str,
    ) {
        let connection = client.fresh_connection().expect("POOL_FAULT");
        connection.execute(
            "INSERT INTO parcels (parcel_uuid, parcel_id, county_name, state_code,
                                  latitude, longitude, scan_pass, fema_risk_tier)
             VALUES (?1, ?2, ?3, 'NC', 35.2, -81.1, 1, ?4)",
            libsql::params![uuid.to_string(), parcel_id.to_string(), county.to_string(), fema_tier.to_string()],
        ).await.expect("GENESIS_INJECTION_FAULT");
    }

    async fn read_ranking(client: &LedgerClient, parcel_id: &str) -> (Option<f64>, Option<f64>) {
        let connection = client.fresh_connection().expect("POOL_FAULT");
        let mut rows = connection.query(
            "SELECT ndvi_slope_pctile, distress_composite FROM parcels WHERE parcel_id = ?1",
            libsql::params![parcel_id.to_string()],
        ).await.expect("RANK_QUERY_FAULT");

        let row = rows.next().await.expect("ROW_FAULT").expect("PARCEL_VOID");
        (
            row.get::<Option<f64>>(0).ok().flatten(),
            row.get::<Option<f64>>(1).ok().flatten(),
        )
    }

    /**
     * CERTIFICACIÓN: percentil monótono, acotado al condado, y
     * compuesto con la mezcla 0.70/0.30 escalada a [0,10].
     */
    #[tokio::test]
    async fn certify_county_scoped_percentile_and_blend() {
        println!("\n📊 [INICIO]: Auditando ranking percentil por condado...");
        let client = anchored_ledger("mem_composite_ranking").await;

        // Condado Gaston: cinco pendientes conocidas, zona NONE.
        for (index, slope) in [-0.20_f64, -0.10, 0.00, 0.10, 0.20].iter().enumerate() {
            let parcel_id = format!("G-{index}");
            inject_parcel_with_tier(&client, &format!("uuid-g{index}"), &parcel_id, "Gaston", "NONE").await;

            let repository = ParcelRepository::new(client.clone());
            repository.persist_historical_band(&[(
                ParcelIdentity::new(&parcel_id, "Gaston", "NC"),
                HistoricalBand { ndvi_slope_5yr: Some(*slope), ndvi_vintage_count: 5, ndvi_year_span: 4 },
            )]).await.expect("PERSIST_FAULT");
        }

        // Condado vecino con una pendiente extrema: NO debe influir.
        inject_parcel_with_tier(&client, "uuid-x0", "X-0", "Lincoln", "NONE").await;
        ParcelRepository::new(client.clone()).persist_historical_band(&[(
            ParcelIdentity::new("X-0", "Lincoln", "NC"),
            HistoricalBand { ndvi_slope_5yr: Some(9.0), ndvi_vintage_count: 5, ndvi_year_span: 4 },
        )]).await.expect("PERSIST_FAULT");

        // Parcela de Gaston SIN pendiente: fuera de la población.
        inject_parcel_with_tier(&client, "uuid-g9", "G-9", "Gaston", "NONE").await;

        let composite_repository = CompositeRepository::new(client.clone());
        composite_repository.recompute_county_composite("Gaston", "NC", "2026-07-01")
            .await.expect("RANKING_FAULT");

        // 1. PERCENT_RANK sobre 5 filas: 0, 0.25, 0.5, 0.75, 1.0.
        let expected_pctiles = [0.0, 0.25, 0.50, 0.75, 1.0];
        let mut previous_pctile = -1.0_f64;
        for (index, expected) in expected_pctiles.iter().enumerate() {
            let (pctile, composite) = read_ranking(&client, &format!("G-{index}")).await;
            let pctile = pctile.expect("PCTILE_VOID");
            assert!((pctile - expected).abs() < 1e-9, "PCTILE_DRIFT: G-{index} got {pctile}");
            assert!(pctile >= previous_pctile, "MONOTONE_FAULT: pctile order broken.");
            previous_pctile = pctile;

            // Zona NONE: compuesto = 0.70 × pctile × 10.
            let composite = composite.expect("COMPOSITE_VOID");
            assert!((composite - 0.70 * expected * 10.0).abs() < 1e-9);
            assert!((0.0..=10.0).contains(&composite));
        }

        // 2. El condado vecino quedó intacto.
        let (foreign_pctile, foreign_composite) = read_ranking(&client, "X-0").await;
        assert_eq!(foreign_pctile, None, "COUNTY_LEAK: neighbor county ranked.");
        assert_eq!(foreign_composite, None);

        // 3. La parcela sin pendiente queda sin percentil ni compuesto.
        let (void_pctile, void_composite) = read_ranking(&client, "G-9").await;
        assert_eq!(void_pctile, None);
        assert_eq!(void_composite, None);

        println!("✅ RANKING: County-scoped percentile and blend certified.");
    }

    /**
     * CERTIFICACIÓN: la normalización FEMA pesa 0.30 y la
     * recomputación con la misma fecha es bit-idéntica.
     */
    #[tokio::test]
    async fn certify_fema_normalization_and_idempotence() {
        let client = anchored_ledger("mem_composite_fema").await;

        // Dos parcelas, misma pendiente, tiers distintos.
        inject_parcel_with_tier(&client, "uuid-f0", "F-0", "Gaston", "HIGH").await;
        inject_parcel_with_tier(&client, "uuid-f1", "F-1", "Gaston", "MODERATE").await;

        let repository = ParcelRepository::new(client.clone());
        for parcel_id in ["F-0", "F-1"] {
            repository.persist_historical_band(&[(
                ParcelIdentity::new(parcel_id, "Gaston", "NC"),
                HistoricalBand { ndvi_slope_5yr: Some(0.05), ndvi_vintage_count: 4, ndvi_year_span: 4 },
            )]).await.expect("PERSIST_FAULT");
        }

        let composite_repository = CompositeRepository::new(client.clone());
        composite_repository.recompute_county_composite("Gaston", "NC", "2026-07-01")
            .await.expect("RANKING_FAULT");

        // Pendientes empatadas: PERCENT_RANK 0 para ambas.
        // HIGH: 0.30 × 1.0 × 10 = 3.0 ; MODERATE: 0.30 × 0.5 × 10 = 1.5.
        let (_, high_composite) = read_ranking(&client, "F-0").await;
        let (_, moderate_composite) = read_ranking(&client, "F-1").await;
        assert!((high_composite.expect("VOID") - 3.0).abs() < 1e-9);
        assert!((moderate_composite.expect("VOID") - 1.5).abs() < 1e-9);

        // Idempotencia: recomputar con la misma fecha no deriva nada.
        let first = (read_ranking(&client, "F-0").await, read_ranking(&client, "F-1").await);
        composite_repository.recompute_county_composite("Gaston", "NC", "2026-07-01")
            .await.expect("RANKING_FAULT");
        let second = (read_ranking(&client, "F-0").await, read_ranking(&client, "F-1").await);
        assert_eq!(first, second, "IDEMPOTENCE_FAULT: re-ranking drifted values.");

        println!("✅ RANKING: FEMA normalization and idempotence certified.");
    }
}
