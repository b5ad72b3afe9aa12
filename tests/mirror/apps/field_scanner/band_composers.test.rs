// [tests/mirror/apps/field_scanner/band_composers.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE COMPOSERS DE BANDA (V5.2 - ZENITH)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L5-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE LOS ESCENARIOS DE ACEPTACIÓN P1/P2
 *
 * # Contratos auditados:
 * Los composers son funciones puras evidencia -> banda; los
 * escenarios de aceptación fijan los puntajes exactos y la marca
 * `sentinel_worthy`, y la banda de vacancia sella el invariante
 * `usps_vacant ⇒ flag_vacancy ∧ confianza ∈ {0.70, 0.75, 0.90}`.
 * =================================================================
 */

#[cfg(test)]
mod tests {
    use catastro_domain_models::{
        EvidenceBundle, FloodDetermination, FloodRiskTier, NdviReading, NdviSource,
        TrendDirection, VacancyProbe,
    };
    use catastro_field_scanner::passes::bulk_scan::{compose_bulk_band, SENTINEL_WORTHY_THRESHOLD};
    use catastro_field_scanner::passes::sentinel_enrichment::compose_sentinel_band;
    use catastro_field_scanner::passes::vacancy_sweep::compose_vacancy_band;
    use catastro_infra_remote::MonthlyNdvi;

    /**
     * ESCENARIO P1 (Gaston, NC): NDVI 0.72 actual, sin historia,
     * zona X/MINIMAL, sin chequeo postal. Esperado: bandera de
     * sobrecrecimiento con confianza ≥ 0.6, sin bandera de
     * inundación, puntaje = 2.0 × 0.6 = 1.2.
     */
    #[test]
    fn certify_acceptance_scenario_p1() {
        println!("\n🧪 [PROVING_GROUNDS]: Scenario P1 (overgrowth only)...");
        let evidence = EvidenceBundle {
            aerial_ndvi: Some(NdviReading::new(0.72, NdviSource::Aerial)),
            flood: Some(FloodDetermination {
                zone: Some("X".to_string()),
                zone_subtype: Some("AREA OF MINIMAL FLOOD HAZARD".to_string()),
                risk: FloodRiskTier::Low,
                ..Default::default()
            }),
            ..Default::default()
        };

        let band = compose_bulk_band(&evidence, "2026-07-01", None);

        assert!(band.flags.flag_overgrowth);
        assert!(band.flags.conf_overgrowth.unwrap() >= 0.6);
        assert!(!band.flags.flag_flood, "X/MINIMAL must not raise the flood flag.");
        assert!((band.distress_score - 1.2).abs() < 1e-12, "score {}", band.distress_score);

        // 1.2 < umbral y sin abandono: no es digna de satélite.
        assert!(band.distress_score < SENTINEL_WORTHY_THRESHOLD);
        assert!(!band.sentinel_worthy);
        assert_eq!(band.ndvi_category.as_deref(), Some("dense"));
    }

    /**
     * ESCENARIO P2: NDVI 0.20, zona AE, sin historia. Esperado:
     * abandono (0.50 + 0.15 = 0.65), inundación (1.0), puntaje
     * 1.5·0.65 + 1.5·1.0 = 2.475, digna de satélite.
     */
    #[test]
    fn certify_acceptance_scenario_p2() {
        println!("\n🧪 [PROVING_GROUNDS]: Scenario P2 (neglect + flood)...");
        let evidence = EvidenceBundle {
            aerial_ndvi: Some(NdviReading::new(0.20, NdviSource::Aerial)),
            flood: Some(FloodDetermination {
                zone: Some("AE".to_string()),
                special_hazard: true,
                risk: FloodRiskTier::High,
                ..Default::default()
            }),
            ..Default::default()
        };

        let band = compose_bulk_band(&evidence, "2026-07-01", None);

        assert!(band.flags.flag_neglect);
        assert!((band.flags.conf_neglect.unwrap() - 0.65).abs() < 1e-12);
        assert!(band.flags.flag_flood);
        assert!((band.flags.conf_flood.unwrap() - 1.0).abs() < 1e-12);
        assert!((band.distress_score - 2.475).abs() < 1e-12, "score {}", band.distress_score);

        assert!(band.sentinel_worthy, "2.475 ≥ threshold must mark sentinel-worthy.");
        assert!(band.fema_sfha);
        assert_eq!(band.fema_flood_zone.as_deref(), Some("AE"));
    }

    /**
     * CERTIFICACIÓN: composer satelital (tendencia, media, conteo).
     */
    #[test]
    fn certify_sentinel_band_composition() {
        let falling_series: Vec<MonthlyNdvi> = (0..10)
            .map(|month| MonthlyNdvi {
                month: format!("2025-{:02}", month + 1),
                mean: 0.60 - 0.03 * month as f64,
            })
            .collect();

        let band = compose_sentinel_band(&falling_series, "sentinel", "2026-07-01");
        assert_eq!(band.trend, TrendDirection::Falling);
        assert!(band.slope.unwrap() < 0.0);
        assert_eq!(band.month_count, 10);
        assert!((band.ndvi_latest.unwrap() - 0.33).abs() < 1e-9);
        assert_eq!(band.source, "sentinel");

        // Serie corta: tendencia insuficiente, sin pendiente.
        let short_series = vec![
            MonthlyNdvi { month: "2026-01".into(), mean: 0.4 },
            MonthlyNdvi { month: "2026-02".into(), mean: 0.5 },
        ];
        let short_band = compose_sentinel_band(&short_series, "sentinel_fallback", "2026-07-01");
        assert_eq!(short_band.trend, TrendDirection::Insufficient);
        assert_eq!(short_band.slope, None);
        assert_eq!(short_band.month_count, 2);
    }

    /**
     * CERTIFICACIÓN: invariante de la banda de vacancia.
     * `usps_vacant = true` ⇒ `flag_vacancy` y confianza canónica.
     */
    #[test]
    fn certify_vacancy_band_invariant() {
        let canonical_confidences = [
            (Some(true), false, 0.90),
            (None, false, 0.75),
            (Some(true), true, 0.70),
            (None, true, 0.70),
        ];

        for (dpv, mismatch, expected_confidence) in canonical_confidences {
            let probe = VacancyProbe {
                vacant: true,
                dpv_confirmed: dpv,
                address_mismatch: mismatch,
                ..Default::default()
            };
            let band = compose_vacancy_band(&probe, "2026-07-01");

            assert!(band.usps_vacant);
            assert!(band.flag_vacancy, "INVARIANT_FAULT: vacant without flag.");
            let confidence = band.vacancy_confidence.expect("CONFIDENCE_VOID");
            assert!(
                (confidence - expected_confidence).abs() < 1e-12,
                "dpv={dpv:?} mismatch={mismatch} -> {confidence}"
            );
        }

        // No vacante: sin bandera ni confianza.
        let occupied = VacancyProbe { vacant: false, ..Default::default() };
        let band = compose_vacancy_band(&occupied, "2026-07-01");
        assert!(!band.flag_vacancy);
        assert_eq!(band.vacancy_confidence, None);
    }
}
