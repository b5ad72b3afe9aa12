// [libs/infra/db/src/repositories/parcel.rs]
/*!
 * =================================================================
 * APARATO: PARCEL REPOSITORY (V5.6 - BAND MASTER)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: SELECCIÓN DE TRABAJO Y PERSISTENCIA POR BANDAS
 *
 * VISION HIPER-HOLÍSTICA:
 * 1. AVANCE MONOTÓNICO: `scan_pass` se escribe en SQL como
 *    MAX(COALESCE(scan_pass,0), nuevo), jamás en memoria de la
 *    aplicación.
 * 2. CONEXIONES CORTAS: cada volcado adquiere una conexión fresca
 *    (el host gestionado corta conexiones ociosas > ~60 s) y el
 *    conteo de filas retornado es la longitud de la carga
 *    comprometida, nunca el conteo del driver (poco fiable en
 *    lotes multi-sentencia).
 * 3. REINTENTO ÚNICO: ante un fallo transitorio de persistencia se
 *    reabre una conexión fresca y el chunk se reintenta UNA vez.
 * =================================================================
 */

use crate::client::LedgerClient;
use crate::errors::DbError;
use catastro_domain_models::{
    BulkScanBand, ConvictionBand, HistoricalBand, ParcelAddressCard, ParcelIdentity,
    ParcelQueryFilters, ParcelWorkItem, PlanetBand, SentinelBand, VacancyBand, VacancyWorkItem,
};
use libsql::{params, Row};
use serde_json::json;
use tracing::{instrument, warn};

/// Candidato del Pase 2 con el UUID opaco para la tabla de auditoría.
#[derive(Debug, Clone)]
pub struct VacancyCandidate {
    pub parcel_uuid: String,
    pub item: VacancyWorkItem,
}

/// Candidato del Pase 2.5 (fusión de convicción).
#[derive(Debug, Clone)]
pub struct ConvictionCandidate {
    pub identity: ParcelIdentity,
    pub distress_composite: Option<f64>,
    pub usps_vacant: bool,
    pub vacancy_confidence: Option<f64>,
}

pub struct ParcelRepository {
    ledger: LedgerClient,
}

impl ParcelRepository {
    pub fn new(ledger: LedgerClient) -> Self {
        Self { ledger }
    }

    // =============================================================
    // SELECCIÓN DE TRABAJO POR PASE
    // =============================================================

    /// Pase 1: parcelas con coordenadas aún no escaneadas a pase ≥ 1.
    pub async fn select_bulk_candidates(&self, limit: usize) -> Result<Vec<ParcelWorkItem>, DbError> {
        let connection = self.ledger.fresh_connection()?;
        let mut rows = connection.query(
            "SELECT parcel_id, county_name, state_code, latitude, longitude
             FROM parcels
             WHERE latitude IS NOT NULL AND longitude IS NOT NULL
               AND COALESCE(scan_pass, 0) < 1
             LIMIT ?1",
            params![limit as i64],
        ).await?;

        let mut candidates = Vec::new();
        while let Some(row) = rows.next().await? {
            candidates.push(work_item_from_row(&row)?);
        }
        Ok(candidates)
    }

    /// Pase 1.5: parcelas del condado ya escaneadas sin pendiente histórica.
    pub async fn select_baseline_candidates(
        &self,
        county_name: &str,
        state_code: &str,
        limit: usize,
    ) -> Result<Vec<ParcelWorkItem>, DbError> {
        let connection = self.ledger.fresh_connection()?;
        let mut rows = connection.query(
            "SELECT parcel_id, county_name, state_code, latitude, longitude
             FROM parcels
             WHERE county_name = ?1 AND state_code = ?2
               AND latitude IS NOT NULL AND longitude IS NOT NULL
               AND COALESCE(scan_pass, 0) >= 1
               AND ndvi_slope_5yr IS NULL
             LIMIT ?3",
            params![county_name.to_string(), state_code.to_string(), limit as i64],
        ).await?;

        let mut candidates = Vec::new();
        while let Some(row) = rows.next().await? {
            candidates.push(work_item_from_row(&row)?);
        }
        Ok(candidates)
    }

    /// Pase 1.5b: solo parcelas `sentinel_worthy` aún no enriquecidas.
    pub async fn select_sentinel_candidates(&self, limit: usize) -> Result<Vec<ParcelWorkItem>, DbError> {
        let connection = self.ledger.fresh_connection()?;
        let mut rows = connection.query(
            "SELECT parcel_id, county_name, state_code, latitude, longitude
             FROM parcels
             WHERE COALESCE(sentinel_worthy, 0) = 1
               AND sentinel_scan_date IS NULL
               AND latitude IS NOT NULL AND longitude IS NOT NULL
             LIMIT ?1",
            params![limit as i64],
        ).await?;

        let mut candidates = Vec::new();
        while let Some(row) = rows.next().await? {
            candidates.push(work_item_from_row(&row)?);
        }
        Ok(candidates)
    }

    /// Pase 2: compuesto ≥ piso y sin chequeo postal previo.
    pub async fn select_vacancy_candidates(
        &self,
        composite_floor: f64,
        limit: usize,
    ) -> Result<Vec<VacancyCandidate>, DbError> {
        let connection = self.ledger.fresh_connection()?;
        let mut rows = connection.query(
            "SELECT parcel_uuid, parcel_id, county_name, state_code,
                    situs_address, situs_city, situs_zip,
                    mailing_address, mailing_city, mailing_state, mailing_zip,
                    distress_composite
             FROM parcels
             WHERE distress_composite >= ?1
               AND usps_check_date IS NULL
             ORDER BY distress_composite DESC
             LIMIT ?2",
            params![composite_floor, limit as i64],
        ).await?;

        let mut candidates = Vec::new();
        while let Some(row) = rows.next().await? {
            candidates.push(VacancyCandidate {
                parcel_uuid: row.get(0)?,
                item: VacancyWorkItem {
                    identity: ParcelIdentity {
                        parcel_id: row.get(1)?,
                        county_name: row.get(2)?,
                        state_code: row.get(3)?,
                    },
                    addresses: ParcelAddressCard {
                        situs_address: opt_text(&row, 4),
                        situs_city: opt_text(&row, 5),
                        situs_zip: opt_text(&row, 6),
                        mailing_address: opt_text(&row, 7),
                        mailing_city: opt_text(&row, 8),
                        mailing_state: opt_text(&row, 9),
                        mailing_zip: opt_text(&row, 10),
                    },
                    distress_composite: opt_real(&row, 11),
                },
            });
        }
        Ok(candidates)
    }

    /// Pase 2.5: parcelas del condado con compuesto, vacancia o señales.
    /// El join de señales usa SIEMPRE la llave compuesta condado+estado.
    pub async fn select_conviction_candidates(
        &self,
        county_name: &str,
        state_code: &str,
    ) -> Result<Vec<ConvictionCandidate>, DbError> {
        let connection = self.ledger.fresh_connection()?;
        let mut rows = connection.query(
            "SELECT p.parcel_id, p.county_name, p.state_code,
                    p.distress_composite, p.usps_vacant, p.vacancy_confidence
             FROM parcels p
             WHERE p.county_name = ?1 AND p.state_code = ?2
               AND (p.distress_composite IS NOT NULL
                    OR COALESCE(p.usps_vacant, 0) = 1
                    OR EXISTS (
                        SELECT 1 FROM motivation_signals ms
                        WHERE ms.county_name = p.county_name
                          AND ms.state_code = p.state_code
                          AND ms.parcel_id = p.parcel_id
                    ))",
            params![county_name.to_string(), state_code.to_string()],
        ).await?;

        let mut candidates = Vec::new();
        while let Some(row) = rows.next().await? {
            candidates.push(ConvictionCandidate {
                identity: ParcelIdentity {
                    parcel_id: row.get(0)?,
                    county_name: row.get(1)?,
                    state_code: row.get(2)?,
                },
                distress_composite: opt_real(&row, 3),
                usps_vacant: opt_flag(&row, 4).unwrap_or(false),
                vacancy_confidence: opt_real(&row, 5),
            });
        }
        Ok(candidates)
    }

    // =============================================================
    // PERSISTENCIA POR BANDAS (conexión fresca + reintento único)
    // =============================================================

    /// Banda del Pase 1. Avanza `scan_pass` a MAX(existente, 1).
    #[instrument(skip(self, updates))]
    pub async fn persist_bulk_band(
        &self,
        updates: &[(ParcelIdentity, BulkScanBand)],
    ) -> Result<usize, DbError> {
        self.with_chunk_retry("bulk_band", || self.try_persist_bulk_band(updates)).await
    }

    async fn try_persist_bulk_band(
        &self,
        updates: &[(ParcelIdentity, BulkScanBand)],
    ) -> Result<usize, DbError> {
        if updates.is_empty() {
            return Ok(0);
        }

        let connection = self.ledger.fresh_connection()?;
        let transaction = connection.transaction().await?;

        let sql = r#"
            UPDATE parcels SET
                ndvi_current = ?1, ndvi_category = ?2,
                fema_flood_zone = ?3, fema_sfha = ?4, fema_risk_tier = ?5,
                distress_score = ?6,
                flag_overgrowth = ?7, conf_overgrowth = ?8,
                flag_neglect = ?9, conf_neglect = ?10,
                flag_flood = ?11, conf_flood = ?12,
                flag_structural = ?13, conf_structural = ?14,
                sentinel_worthy = ?15, scan_date = ?16, scan_error = ?17,
                scan_pass = MAX(COALESCE(scan_pass, 0), ?18)
            WHERE parcel_id = ?19 AND county_name = ?20 AND state_code = ?21
        "#;

        for (identity, band) in updates {
            transaction.execute(sql, params![
                band.ndvi_current,
                band.ndvi_category.clone(),
                band.fema_flood_zone.clone(),
                i64::from(band.fema_sfha),
                band.fema_risk_tier.as_label().to_string(),
                band.distress_score,
                i64::from(band.flags.flag_overgrowth),
                band.flags.conf_overgrowth,
                i64::from(band.flags.flag_neglect),
                band.flags.conf_neglect,
                i64::from(band.flags.flag_flood),
                band.flags.conf_flood,
                i64::from(band.flags.flag_structural),
                band.flags.conf_structural,
                i64::from(band.sentinel_worthy),
                band.scan_date.clone(),
                band.scan_error.clone(),
                1_i64,
                identity.parcel_id.clone(),
                identity.county_name.clone(),
                identity.state_code.clone()
            ]).await?;
        }

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        // Conteo desde la longitud de la carga comprometida.
        Ok(updates.len())
    }

    /// Banda histórica del Pase 1.5 (no avanza el pase).
    #[instrument(skip(self, updates))]
    pub async fn persist_historical_band(
        &self,
        updates: &[(ParcelIdentity, HistoricalBand)],
    ) -> Result<usize, DbError> {
        self.with_chunk_retry("historical_band", || self.try_persist_historical_band(updates)).await
    }

    async fn try_persist_historical_band(
        &self,
        updates: &[(ParcelIdentity, HistoricalBand)],
    ) -> Result<usize, DbError> {
        if updates.is_empty() {
            return Ok(0);
        }

        let connection = self.ledger.fresh_connection()?;
        let transaction = connection.transaction().await?;

        let sql = r#"
            UPDATE parcels SET
                ndvi_slope_5yr = ?1, ndvi_vintage_count = ?2, ndvi_year_span = ?3
            WHERE parcel_id = ?4 AND county_name = ?5 AND state_code = ?6
        "#;

        for (identity, band) in updates {
            transaction.execute(sql, params![
                band.ndvi_slope_5yr,
                band.ndvi_vintage_count,
                band.ndvi_year_span,
                identity.parcel_id.clone(),
                identity.county_name.clone(),
                identity.state_code.clone()
            ]).await?;
        }

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        Ok(updates.len())
    }

    /// Banda satelital del Pase 1.5b. Avanza `scan_pass` a MAX(existente, 2).
    #[instrument(skip(self, updates))]
    pub async fn persist_sentinel_band(
        &self,
        updates: &[(ParcelIdentity, SentinelBand)],
    ) -> Result<usize, DbError> {
        self.with_chunk_retry("sentinel_band", || self.try_persist_sentinel_band(updates)).await
    }

    async fn try_persist_sentinel_band(
        &self,
        updates: &[(ParcelIdentity, SentinelBand)],
    ) -> Result<usize, DbError> {
        if updates.is_empty() {
            return Ok(0);
        }

        let connection = self.ledger.fresh_connection()?;
        let transaction = connection.transaction().await?;

        let sql = r#"
            UPDATE parcels SET
                sentinel_trend = ?1, sentinel_slope = ?2, sentinel_ndvi_latest = ?3,
                sentinel_month_count = ?4, sentinel_ndvi_mean = ?5,
                sentinel_source = ?6, sentinel_chart_url = ?7, sentinel_scan_date = ?8,
                scan_pass = MAX(COALESCE(scan_pass, 0), ?9)
            WHERE parcel_id = ?10 AND county_name = ?11 AND state_code = ?12
        "#;

        for (identity, band) in updates {
            transaction.execute(sql, params![
                band.trend.as_label().to_string(),
                band.slope,
                band.ndvi_latest,
                band.month_count,
                band.ndvi_mean,
                band.source.clone(),
                band.chart_url.clone(),
                band.scan_date.clone(),
                2_i64,
                identity.parcel_id.clone(),
                identity.county_name.clone(),
                identity.state_code.clone()
            ]).await?;
        }

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        Ok(updates.len())
    }

    /// Banda de vacancia del Pase 2. Avanza `scan_pass` a MAX(existente, 3).
    #[instrument(skip(self, updates))]
    pub async fn persist_vacancy_band(
        &self,
        updates: &[(ParcelIdentity, VacancyBand)],
    ) -> Result<usize, DbError> {
        self.with_chunk_retry("vacancy_band", || self.try_persist_vacancy_band(updates)).await
    }

    async fn try_persist_vacancy_band(
        &self,
        updates: &[(ParcelIdentity, VacancyBand)],
    ) -> Result<usize, DbError> {
        if updates.is_empty() {
            return Ok(0);
        }

        let connection = self.ledger.fresh_connection()?;
        let transaction = connection.transaction().await?;

        // El avance a 3 exige banda satelital previa: sin
        // `sentinel_scan_date` el pase no puede cruzar el nivel 2.
        let sql = r#"
            UPDATE parcels SET
                usps_address = ?1, usps_city = ?2, usps_zip = ?3, usps_zip4 = ?4,
                usps_vacant = ?5, usps_dpv_confirmed = ?6, usps_business = ?7,
                usps_address_mismatch = ?8, usps_check_date = ?9, usps_error = ?10,
                flag_vacancy = ?11, vacancy_confidence = ?12,
                scan_pass = CASE WHEN sentinel_scan_date IS NOT NULL
                                 THEN MAX(COALESCE(scan_pass, 0), ?13)
                                 ELSE MAX(COALESCE(scan_pass, 0), 1)
                            END
            WHERE parcel_id = ?14 AND county_name = ?15 AND state_code = ?16
        "#;

        for (identity, band) in updates {
            transaction.execute(sql, params![
                band.usps_address.clone(),
                band.usps_city.clone(),
                band.usps_zip.clone(),
                band.usps_zip4.clone(),
                i64::from(band.usps_vacant),
                band.usps_dpv_confirmed.map(i64::from),
                band.usps_business.map(i64::from),
                i64::from(band.usps_address_mismatch),
                band.usps_check_date.clone(),
                band.usps_error.clone(),
                i64::from(band.flag_vacancy),
                band.vacancy_confidence,
                3_i64,
                identity.parcel_id.clone(),
                identity.county_name.clone(),
                identity.state_code.clone()
            ]).await?;
        }

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        Ok(updates.len())
    }

    /// Banda de alta resolución (no avanza el pase).
    #[instrument(skip(self, updates))]
    pub async fn persist_planet_band(
        &self,
        updates: &[(ParcelIdentity, PlanetBand)],
    ) -> Result<usize, DbError> {
        self.with_chunk_retry("planet_band", || self.try_persist_planet_band(updates)).await
    }

    async fn try_persist_planet_band(
        &self,
        updates: &[(ParcelIdentity, PlanetBand)],
    ) -> Result<usize, DbError> {
        if updates.is_empty() {
            return Ok(0);
        }

        let connection = self.ledger.fresh_connection()?;
        let transaction = connection.transaction().await?;

        let sql = r#"
            UPDATE parcels SET
                planet_scene_count = ?1, planet_change_score = ?2, planet_span_days = ?3,
                planet_earliest_date = ?4, planet_latest_date = ?5,
                planet_earliest_thumb = ?6, planet_latest_thumb = ?7, planet_scan_date = ?8
            WHERE parcel_id = ?9 AND county_name = ?10 AND state_code = ?11
        "#;

        for (identity, band) in updates {
            transaction.execute(sql, params![
                band.scene_count,
                band.change_score,
                band.span_days,
                band.earliest_date.clone(),
                band.latest_date.clone(),
                band.earliest_thumb.clone(),
                band.latest_thumb.clone(),
                band.scan_date.clone(),
                identity.parcel_id.clone(),
                identity.county_name.clone(),
                identity.state_code.clone()
            ]).await?;
        }

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        Ok(updates.len())
    }

    /// Banda de convicción del Pase 2.5 (no avanza el pase).
    #[instrument(skip(self, updates))]
    pub async fn persist_conviction_band(
        &self,
        updates: &[(ParcelIdentity, ConvictionBand)],
    ) -> Result<usize, DbError> {
        self.with_chunk_retry("conviction_band", || self.try_persist_conviction_band(updates)).await
    }

    async fn try_persist_conviction_band(
        &self,
        updates: &[(ParcelIdentity, ConvictionBand)],
    ) -> Result<usize, DbError> {
        if updates.is_empty() {
            return Ok(0);
        }

        let connection = self.ledger.fresh_connection()?;
        let transaction = connection.transaction().await?;

        let sql = r#"
            UPDATE parcels SET
                conviction_score = ?1, conviction_base_score = ?2,
                conviction_vacancy_bonus = ?3, conviction_mc_score = ?4,
                conviction_components = ?5, mc_signal_count = ?6,
                mc_signal_codes = ?7, conviction_date = ?8
            WHERE parcel_id = ?9 AND county_name = ?10 AND state_code = ?11
        "#;

        for (identity, band) in updates {
            transaction.execute(sql, params![
                band.conviction_score,
                band.conviction_base_score,
                band.conviction_vacancy_bonus,
                band.conviction_mc_score,
                band.conviction_components.clone(),
                band.mc_signal_count,
                band.mc_signal_codes.clone(),
                band.conviction_date.clone(),
                identity.parcel_id.clone(),
                identity.county_name.clone(),
                identity.state_code.clone()
            ]).await?;
        }

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        Ok(updates.len())
    }

    /// Registra el código de error de escaneo sin avanzar el pase:
    /// la parcela sigue elegible para el siguiente barrido.
    pub async fn record_scan_error(
        &self,
        identity: &ParcelIdentity,
        error_code: &str,
        scan_date: &str,
    ) -> Result<(), DbError> {
        let connection = self.ledger.fresh_connection()?;
        connection.execute(
            "UPDATE parcels SET scan_error = ?1, scan_date = ?2
             WHERE parcel_id = ?3 AND county_name = ?4 AND state_code = ?5",
            params![
                error_code.to_string(),
                scan_date.to_string(),
                identity.parcel_id.clone(),
                identity.county_name.clone(),
                identity.state_code.clone()
            ],
        ).await?;
        Ok(())
    }

    // =============================================================
    // SUPERFICIE DE CONSULTA
    // =============================================================

    /// Consulta filtrada con sub-registros agrupados por parcela.
    /// Las llaves del sub-objeto de vacancia van prefijadas (`usps_*`).
    #[instrument(skip(self, filters))]
    pub async fn query_parcels(
        &self,
        filters: &ParcelQueryFilters,
    ) -> Result<Vec<serde_json::Value>, DbError> {
        let (where_sql, bound_values) = build_filter_clauses(filters);

        let sort_column = filters.sort_by
            .map(|column| column.column_name())
            .unwrap_or("distress_score");

        let sql = format!(
            "SELECT {QUERY_COLUMN_LIST} FROM parcels {where_sql}
             ORDER BY {sort_column} DESC NULLS LAST
             LIMIT {} OFFSET {}",
            filters.effective_limit(),
            filters.effective_offset(),
        );

        let connection = self.ledger.fresh_connection()?;
        let mut rows = connection.query(&sql, bound_values).await?;

        let mut grouped_records = Vec::new();
        while let Some(row) = rows.next().await? {
            grouped_records.push(grouped_record_from_row(&row)?);
        }
        Ok(grouped_records)
    }

    /// Fila individual por identidad canónica (endpoints por parcela).
    pub async fn fetch_parcel_record(
        &self,
        identity: &ParcelIdentity,
    ) -> Result<Option<serde_json::Value>, DbError> {
        let sql = format!(
            "SELECT {QUERY_COLUMN_LIST} FROM parcels
             WHERE parcel_id = ?1 AND county_name = ?2 AND state_code = ?3"
        );

        let connection = self.ledger.fresh_connection()?;
        let mut rows = connection.query(&sql, params![
            identity.parcel_id.clone(),
            identity.county_name.clone(),
            identity.state_code.clone()
        ]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(grouped_record_from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// UUID opaco de la parcela (llave de la bitácora de auditoría).
    pub async fn fetch_parcel_uuid(
        &self,
        identity: &ParcelIdentity,
    ) -> Result<Option<String>, DbError> {
        let connection = self.ledger.fresh_connection()?;
        let mut rows = connection.query(
            "SELECT parcel_uuid FROM parcels
             WHERE parcel_id = ?1 AND county_name = ?2 AND state_code = ?3",
            params![
                identity.parcel_id.clone(),
                identity.county_name.clone(),
                identity.state_code.clone()
            ],
        ).await?;

        match rows.next().await? {
            Some(row) => Ok(opt_text(&row, 0)),
            None => Ok(None),
        }
    }

    /// Fecha del último escaneo de alta resolución (guardia de 60 días).
    pub async fn fetch_planet_scan_date(
        &self,
        identity: &ParcelIdentity,
    ) -> Result<Option<String>, DbError> {
        let connection = self.ledger.fresh_connection()?;
        let mut rows = connection.query(
            "SELECT planet_scan_date FROM parcels
             WHERE parcel_id = ?1 AND county_name = ?2 AND state_code = ?3",
            params![
                identity.parcel_id.clone(),
                identity.county_name.clone(),
                identity.state_code.clone()
            ],
        ).await?;

        match rows.next().await? {
            Some(row) => Ok(opt_text(&row, 0)),
            None => Ok(None),
        }
    }

    // =============================================================
    // MECÁNICA DE REINTENTO DE CHUNK
    // =============================================================

    async fn with_chunk_retry<T, F, Fut>(
        &self,
        chunk_label: &str,
        mut operation: F,
    ) -> Result<T, DbError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, DbError>>,
    {
        match operation().await {
            Ok(value) => Ok(value),
            Err(fault) if fault.is_transient() => {
                warn!("🔁 [LEDGER]: Transient persistence fault on '{chunk_label}' ({fault}). Reopening fresh link for single retry.");
                operation().await
            }
            Err(fault) => Err(fault),
        }
    }
}

// =================================================================
// MAPEO FILA -> DOMINIO
// =================================================================

fn work_item_from_row(row: &Row) -> Result<ParcelWorkItem, DbError> {
    Ok(ParcelWorkItem {
        identity: ParcelIdentity {
            parcel_id: row.get(0)?,
            county_name: row.get(1)?,
            state_code: row.get(2)?,
        },
        latitude: row.get(3)?,
        longitude: row.get(4)?,
    })
}

fn opt_text(row: &Row, index: i32) -> Option<String> {
    row.get::<Option<String>>(index).ok().flatten()
}

fn opt_real(row: &Row, index: i32) -> Option<f64> {
    row.get::<Option<f64>>(index).ok().flatten()
}

fn opt_count(row: &Row, index: i32) -> Option<i64> {
    row.get::<Option<i64>>(index).ok().flatten()
}

fn opt_flag(row: &Row, index: i32) -> Option<bool> {
    opt_count(row, index).map(|value| value != 0)
}

/// Lista de columnas de la superficie de consulta, en orden posicional.
const QUERY_COLUMN_LIST: &str = "\
    parcel_uuid, parcel_id, county_name, state_code, latitude, longitude, \
    situs_address, situs_city, situs_zip, property_class, assessed_value, \
    ndvi_current, ndvi_category, fema_flood_zone, fema_sfha, fema_risk_tier, \
    distress_score, flag_overgrowth, conf_overgrowth, flag_neglect, conf_neglect, \
    flag_flood, conf_flood, flag_structural, conf_structural, \
    scan_pass, scan_date, sentinel_worthy, scan_error, \
    ndvi_slope_5yr, ndvi_slope_pctile, ndvi_vintage_count, ndvi_year_span, \
    distress_composite, composite_date, \
    sentinel_trend, sentinel_slope, sentinel_ndvi_latest, sentinel_month_count, \
    sentinel_ndvi_mean, sentinel_source, sentinel_chart_url, sentinel_scan_date, \
    usps_address, usps_city, usps_zip, usps_zip4, usps_vacant, \
    usps_dpv_confirmed, usps_business, usps_address_mismatch, usps_check_date, \
    usps_error, flag_vacancy, vacancy_confidence, \
    planet_scene_count, planet_change_score, planet_span_days, planet_earliest_date, \
    planet_latest_date, planet_earliest_thumb, planet_latest_thumb, planet_scan_date, \
    conviction_score, conviction_base_score, conviction_vacancy_bonus, conviction_mc_score, \
    conviction_components, mc_signal_count, mc_signal_codes, conviction_date";

fn grouped_record_from_row(row: &Row) -> Result<serde_json::Value, DbError> {
    let conviction_components = opt_text(row, 67)
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
        .unwrap_or(serde_json::Value::Null);

    Ok(json!({
        "parcel_uuid": opt_text(row, 0),
        "parcel_id": row.get::<String>(1)?,
        "county": row.get::<String>(2)?,
        "state": row.get::<String>(3)?,
        "latitude": opt_real(row, 4),
        "longitude": opt_real(row, 5),
        "situs_address": opt_text(row, 6),
        "situs_city": opt_text(row, 7),
        "situs_zip": opt_text(row, 8),
        "property_class": opt_text(row, 9),
        "assessed_value": opt_real(row, 10),
        "scan_pass": opt_count(row, 25).unwrap_or(0),
        "scan_date": opt_text(row, 26),
        "scan_error": opt_text(row, 28),
        "aerial": {
            "ndvi_current": opt_real(row, 11),
            "ndvi_category": opt_text(row, 12),
            "ndvi_slope_5yr": opt_real(row, 29),
            "ndvi_slope_pctile": opt_real(row, 30),
            "vintage_count": opt_count(row, 31),
            "year_span": opt_count(row, 32),
        },
        "flood": {
            "zone": opt_text(row, 13),
            "sfha": opt_flag(row, 14),
            "risk_tier": opt_text(row, 15),
        },
        "flags": {
            "overgrowth": opt_flag(row, 17).unwrap_or(false),
            "overgrowth_confidence": opt_real(row, 18),
            "neglect": opt_flag(row, 19).unwrap_or(false),
            "neglect_confidence": opt_real(row, 20),
            "flood": opt_flag(row, 21).unwrap_or(false),
            "flood_confidence": opt_real(row, 22),
            "structural": opt_flag(row, 23).unwrap_or(false),
            "structural_confidence": opt_real(row, 24),
            "vacancy": opt_flag(row, 53).unwrap_or(false),
            "vacancy_confidence": opt_real(row, 54),
        },
        "scores": {
            "distress_score": opt_real(row, 16),
            "distress_composite": opt_real(row, 33),
            "composite_date": opt_text(row, 34),
            "sentinel_worthy": opt_flag(row, 27).unwrap_or(false),
        },
        "satellite": {
            "trend": opt_text(row, 35),
            "slope": opt_real(row, 36),
            "ndvi_latest": opt_real(row, 37),
            "month_count": opt_count(row, 38),
            "ndvi_mean": opt_real(row, 39),
            "source": opt_text(row, 40),
            "chart_url": opt_text(row, 41),
            "scan_date": opt_text(row, 42),
        },
        // Llaves prefijadas: los consumidores usan `usps_*`, no nombres pelados.
        "vacancy": {
            "usps_address": opt_text(row, 43),
            "usps_city": opt_text(row, 44),
            "usps_zip": opt_text(row, 45),
            "usps_zip4": opt_text(row, 46),
            "usps_vacant": opt_flag(row, 47).unwrap_or(false),
            "usps_dpv_confirmed": opt_flag(row, 48),
            "usps_business": opt_flag(row, 49),
            "usps_address_mismatch": opt_flag(row, 50).unwrap_or(false),
            "usps_check_date": opt_text(row, 51),
            "usps_error": opt_text(row, 52),
        },
        "high_res": {
            "scene_count": opt_count(row, 55),
            "change_score": opt_real(row, 56),
            "span_days": opt_count(row, 57),
            "earliest_date": opt_text(row, 58),
            "latest_date": opt_text(row, 59),
            "earliest_thumb": opt_text(row, 60),
            "latest_thumb": opt_text(row, 61),
            "scan_date": opt_text(row, 62),
        },
        "conviction": {
            "score": opt_real(row, 63),
            "base_score": opt_real(row, 64),
            "vacancy_bonus": opt_real(row, 65),
            "mc_score": opt_real(row, 66),
            "components": conviction_components,
            "mc_signal_count": opt_count(row, 68),
            "mc_signal_codes": opt_text(row, 69),
            "date": opt_text(row, 70),
        },
    }))
}

// =================================================================
// CONSTRUCTOR DE FILTROS (parámetros ligados, jamás interpolados)
// =================================================================

fn build_filter_clauses(filters: &ParcelQueryFilters) -> (String, Vec<libsql::Value>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<libsql::Value> = Vec::new();

    if let Some(county) = &filters.county {
        clauses.push("county_name = ?".to_string());
        values.push(county.clone().into());
    }
    if let Some(state) = &filters.state {
        clauses.push("state_code = ?".to_string());
        values.push(state.clone().into());
    }
    if let Some(class) = &filters.property_class {
        clauses.push("property_class = ?".to_string());
        values.push(class.clone().into());
    }
    if let Some(zip) = &filters.zip {
        clauses.push("situs_zip = ?".to_string());
        values.push(zip.clone().into());
    }
    if let Some(min_value) = filters.min_value {
        clauses.push("assessed_value >= ?".to_string());
        values.push(min_value.into());
    }
    if let Some(max_value) = filters.max_value {
        clauses.push("assessed_value <= ?".to_string());
        values.push(max_value.into());
    }
    if let Some(min_acreage) = filters.min_acreage {
        clauses.push("lot_acreage >= ?".to_string());
        values.push(min_acreage.into());
    }
    if let Some(max_acreage) = filters.max_acreage {
        clauses.push("lot_acreage <= ?".to_string());
        values.push(max_acreage.into());
    }
    if let Some(min_score) = filters.min_score {
        clauses.push("distress_score >= ?".to_string());
        values.push(min_score.into());
    }
    if let Some(max_score) = filters.max_score {
        clauses.push("distress_score <= ?".to_string());
        values.push(max_score.into());
    }
    if let Some(min_composite) = filters.min_composite {
        clauses.push("distress_composite >= ?".to_string());
        values.push(min_composite.into());
    }
    if let Some(min_conviction) = filters.min_conviction {
        clauses.push("conviction_score >= ?".to_string());
        values.push(min_conviction.into());
    }
    if let Some(zone) = &filters.fema_zone {
        clauses.push("fema_flood_zone = ?".to_string());
        values.push(zone.clone().into());
    }

    for (flag_column, flag_filter) in [
        ("flag_overgrowth", filters.flag_overgrowth),
        ("flag_neglect", filters.flag_neglect),
        ("flag_flood", filters.flag_flood),
        ("flag_structural", filters.flag_structural),
        ("flag_vacancy", filters.flag_vacancy),
    ] {
        if let Some(expected) = flag_filter {
            clauses.push(format!("COALESCE({flag_column}, 0) = ?"));
            values.push(i64::from(expected).into());
        }
    }

    if filters.scanned_only.unwrap_or(false) {
        clauses.push("COALESCE(scan_pass, 0) >= 1".to_string());
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    (where_sql, values)
}
