// [tests/mirror/libs/infra/db/vacancy_audit.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE BITÁCORA DE VACANCIA (V5.0 - ZENITH)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DEL REGISTRO APPEND-ONLY DE SONDAS
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use catastro_domain_models::VacancyProbe;
    use catastro_infra_db::repositories::VacancyAuditRepository;
    use catastro_infra_db::LedgerClient;

    /**
     * CERTIFICACIÓN: cada sonda anexa una fila nueva (append-only),
     * llaveada por el UUID opaco de la parcela.
     */
    #[tokio::test]
    async fn certify_append_only_probe_log() {
        println!("\n📮 [INICIO]: Auditando bitácora append-only...");
        let client = LedgerClient::connect("file:mem_vacancy_audit?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: Failed to anchor in-memory ledger.");

        let audit = VacancyAuditRepository::new(client.clone());

        let vacant_probe = VacancyProbe {
            normalized_address: Some("101 OAK ST".to_string()),
            normalized_city: Some("GASTONIA".to_string()),
            normalized_zip: Some("28052".to_string()),
            vacant: true,
            dpv_confirmed: Some(true),
            ..Default::default()
        };
        let faulted_probe = VacancyProbe {
            error_code: Some("address_not_found".to_string()),
            ..Default::default()
        };

        // Dos sondas de la misma parcela + una de otra parcela.
        audit.append_probe("uuid-a1", &vacant_probe, "2026-07-01").await.expect("APPEND_FAULT");
        audit.append_probe("uuid-a1", &faulted_probe, "2026-07-08").await.expect("APPEND_FAULT");
        audit.append_probe("uuid-b2", &vacant_probe, "2026-07-01").await.expect("APPEND_FAULT");

        assert_eq!(audit.probe_count("uuid-a1").await.expect("COUNT_FAULT"), 2);
        assert_eq!(audit.probe_count("uuid-b2").await.expect("COUNT_FAULT"), 1);
        assert_eq!(audit.probe_count("uuid-void").await.expect("COUNT_FAULT"), 0);

        // La bitácora conserva el código de error de la sonda fallida.
        let connection = client.fresh_connection().expect("POOL_FAULT");
        let mut rows = connection.query(
            "SELECT error_code FROM vacancy_checks
             WHERE parcel_uuid = 'uuid-a1' AND checked_at = '2026-07-08'",
            (),
        ).await.expect("AUDIT_QUERY_FAULT");
        let row = rows.next().await.expect("ROW_FAULT").expect("AUDIT_VOID");
        assert_eq!(
            row.get::<Option<String>>(0).ok().flatten().as_deref(),
            Some("address_not_found")
        );

        println!("✅ AUDIT: Append-only probe log certified.");
    }
}
