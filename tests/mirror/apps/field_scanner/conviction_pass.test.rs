// [tests/mirror/apps/field_scanner/conviction_pass.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL PASE DE CONVICCIÓN (V5.3 - ZENITH)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L5-MIRROR
 * RESPONSABILIDAD: AUDITORÍA END-TO-END DEL PASE 2.5 SOBRE EL LEDGER
 *
 * # Contratos auditados:
 * 1. Escenarios de aceptación P3 (solo compuesto) y P4 (fusión
 *    completa con bono de vacancia).
 * 2. Un `parcel_id` idéntico en dos condados recibe convicciones
 *    independientes desde las señales de SU condado (sin fuga).
 * 3. Re-correr el pase con los mismos insumos es idempotente.
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use catastro_field_scanner::passes::ConvictionFusionPass;
    use catastro_field_scanner::PassContext;
    use catastro_infra_db::LedgerClient;
    use catastro_infra_remote::RemoteSourceRegistry;
    use std::sync::Arc;

    async fn anchored_context(db_label: &str) -> (LedgerClient, PassContext) {
        let ledger = LedgerClient::connect(&format!("file:{db_label}?mode=memory&cache=shared"), None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

        let remotes = Arc::new(
            RemoteSourceRegistry::provision_from_env().expect("REGISTRY_FAULT"),
        );
        let context = PassContext::new(ledger.clone(), remotes);
        (ledger, context)
    }

    async fn inject_scored_parcel(
        client: &LedgerClient,
        uuid: &str,
        parcel_id: &str,
        county: &str,
        composite: Option<f64>,
        vacant: bool,
        vacancy_confidence: Option<f64>,
    ) {
        let connection = client.fresh_connection().expect("POOL_FAULT");
        connection.execute(
            "INSERT INTO parcels (parcel_uuid, parcel_id, county_name, state_code,
                                  latitude, longitude, distress_composite,
                                  usps_vacant, vacancy_confidence)
             VALUES (?1, ?2, ?3, 'NC', 35.2, -81.1, ?4, ?5, ?6)",
            libsql::params![
                uuid.to_string(), parcel_id.to_string(), county.to_string(),
                composite, i64::from(vacant), vacancy_confidence
            ],
        ).await.expect("GENESIS_INJECTION_FAULT");
    }

    async fn inject_signal(client: &LedgerClient, id: &str, parcel_id: &str, county: &str, code: &str, confidence: f64) {
        let connection = client.fresh_connection().expect("POOL_FAULT");
        connection.execute(
            "INSERT INTO motivation_signals (id, parcel_id, county_name, state_code, signal_code, confidence)
             VALUES (?1, ?2, ?3, 'NC', ?4, ?5)",
            libsql::params![id.to_string(), parcel_id.to_string(), county.to_string(), code.to_string(), confidence],
        ).await.expect("SIGNAL_INJECTION_FAULT");
    }

    async fn read_conviction(client: &LedgerClient, parcel_id: &str, county: &str) -> (Option<f64>, Option<f64>, Option<i64>) {
        let connection = client.fresh_connection().expect("POOL_FAULT");
        let mut rows = connection.query(
            "SELECT conviction_score, conviction_vacancy_bonus, mc_signal_count
             FROM parcels WHERE parcel_id = ?1 AND county_name = ?2",
            libsql::params![parcel_id.to_string(), county.to_string()],
        ).await.expect("CONVICTION_QUERY_FAULT");

        let row = rows.next().await.expect("ROW_FAULT").expect("PARCEL_VOID");
        (
            row.get::<Option<f64>>(0).ok().flatten(),
            row.get::<Option<f64>>(1).ok().flatten(),
            row.get::<Option<i64>>(2).ok().flatten(),
        )
    }

    /**
     * CERTIFICACIÓN: escenarios P3 y P4 end-to-end sobre el ledger.
     */
    #[tokio::test]
    async fn certify_acceptance_scenarios_p3_p4() {
        println!("\n⚖️  [INICIO]: Auditando fusión de convicción P3/P4...");
        let (ledger, context) = anchored_context("mem_conviction_p3p4").await;

        // P3: compuesto 7.59, sin señales, no vacante -> 7.59.
        inject_scored_parcel(&ledger, "uuid-p3", "P-3", "Gaston", Some(7.59), false, None).await;

        // P4: compuesto 8.0, mc_raw 3.5, vacante+DPV 0.90 -> 8.65.
        inject_scored_parcel(&ledger, "uuid-p4", "P-4", "Gaston", Some(8.0), true, Some(0.90)).await;
        inject_signal(&ledger, "sig-p4-1", "P-4", "Gaston", "tax_delinquent", 1.5).await;
        inject_signal(&ledger, "sig-p4-2", "P-4", "Gaston", "absentee_owner", 1.0).await;
        inject_signal(&ledger, "sig-p4-3", "P-4", "Gaston", "high_equity", 1.0).await;

        let summary = ConvictionFusionPass::new(context)
            .execute("Gaston", "NC")
            .await
            .expect("PASS_FAULT");
        assert_eq!(summary.scanned, 2);

        let (p3_score, p3_bonus, p3_count) = read_conviction(&ledger, "P-3", "Gaston").await;
        assert!((p3_score.expect("VOID") - 7.59).abs() < 1e-9, "P3 drifted: {p3_score:?}");
        assert_eq!(p3_bonus, Some(0.0));
        assert_eq!(p3_count, Some(0));

        let (p4_score, p4_bonus, p4_count) = read_conviction(&ledger, "P-4", "Gaston").await;
        assert!((p4_score.expect("VOID") - 8.65).abs() < 1e-9, "P4 drifted: {p4_score:?}");
        assert!((p4_bonus.expect("VOID") - 2.25).abs() < 1e-9);
        assert_eq!(p4_count, Some(3));

        println!("✅ CONVICTION: Acceptance scenarios certified.");
    }

    /**
     * CERTIFICACIÓN: `parcel_id` idéntico en dos condados produce
     * convicciones independientes (sin fuga de señales) y la
     * re-corrida es idempotente.
     */
    #[tokio::test]
    async fn certify_cross_county_independence_and_idempotence() {
        println!("\n⚖️  [INICIO]: Auditando independencia entre condados...");
        let (ledger, context) = anchored_context("mem_conviction_crosscounty").await;

        // Mismo parcel_id "C-1" en Gaston y Lincoln.
        inject_scored_parcel(&ledger, "uuid-cg", "C-1", "Gaston", Some(6.0), false, None).await;
        inject_scored_parcel(&ledger, "uuid-cl", "C-1", "Lincoln", Some(6.0), false, None).await;

        // Solo Gaston carga señales de motivación.
        inject_signal(&ledger, "sig-cg-1", "C-1", "Gaston", "pre_foreclosure", 3.5).await;

        let gaston_pass = ConvictionFusionPass::new(context.clone());
        gaston_pass.execute("Gaston", "NC").await.expect("PASS_FAULT");
        ConvictionFusionPass::new(context.clone()).execute("Lincoln", "NC").await.expect("PASS_FAULT");

        let (gaston_score, _, gaston_count) = read_conviction(&ledger, "C-1", "Gaston").await;
        let (lincoln_score, _, lincoln_count) = read_conviction(&ledger, "C-1", "Lincoln").await;

        // Gaston: ds=0.6, mc=0.5 -> 10·(0.35·0.6+0.40·0.5)/0.75 = 5.4667.
        let expected_gaston = 10.0 * (0.35 * 0.6 + 0.40 * 0.5) / 0.75;
        assert!((gaston_score.expect("VOID") - expected_gaston).abs() < 1e-9);
        assert_eq!(gaston_count, Some(1));

        // Lincoln: solo compuesto -> 6.0 exacto, cero señales.
        assert!((lincoln_score.expect("VOID") - 6.0).abs() < 1e-9, "JOIN_LEAK: Gaston signals reached Lincoln.");
        assert_eq!(lincoln_count, Some(0));

        // Re-corrida: valores bit-idénticos y backfill sin duplicados.
        ConvictionFusionPass::new(context).execute("Gaston", "NC").await.expect("PASS_FAULT");
        let (rerun_score, _, rerun_count) = read_conviction(&ledger, "C-1", "Gaston").await;
        assert_eq!(rerun_score, gaston_score, "IDEMPOTENCE_FAULT: conviction drifted on re-run.");
        assert_eq!(rerun_count, gaston_count);

        let connection = ledger.fresh_connection().expect("POOL_FAULT");
        let mut rows = connection.query(
            "SELECT COUNT(*) FROM motivation_scores WHERE parcel_id = 'C-1' AND county_name = 'Gaston'",
            (),
        ).await.expect("BACKFILL_QUERY_FAULT");
        let row = rows.next().await.expect("ROW_FAULT").expect("COUNT_VOID");
        assert_eq!(row.get::<i64>(0).expect("COUNT_FAULT"), 1, "BACKFILL_DUPLICATION detected.");

        println!("✅ CONVICTION: Cross-county independence and idempotence certified.");
    }
}
