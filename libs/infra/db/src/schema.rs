// [libs/infra/db/src/schema.rs]
/**
 * =================================================================
 * APARATO: CATASTRAL SCHEMA ENGINE (V5.4 - LOCK AVOIDING)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GOBERNANZA ESTRUCTURAL E IDEMPOTENCIA TOTAL
 *
 * VISION HIPER-HOLÍSTICA:
 * 1. GÉNESIS: Tablas base (parcels, auditoría de vacancia, señales
 *    de motivación, backfill de puntajes, estado de sistema).
 * 2. GRUPOS DE MIGRACIÓN NOMBRADOS: scan, satellite, vacancy,
 *    high_res, composite, conviction. Antes de cualquier DDL se
 *    inspecciona el catálogo de columnas: si TODAS las columnas del
 *    grupo ya existen, el DDL se salta por completo (evita el
 *    candado exclusivo de tabla que puede interbloquearse con
 *    escaneos largos en curso).
 * 3. ÍNDICES: uno por columna filtrable/ordenable, incluido el de
 *    convicción descendente para lecturas ordenadas.
 * =================================================================
 */

use anyhow::{Context, Result};
use libsql::Connection;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/**
 * ESTRATO 1: GÉNESIS (tablas base).
 * La tabla `parcels` la puebla un ingestor GIS externo; aquí solo se
 * garantiza su existencia para entornos de desarrollo y pruebas.
 */
const GENESIS_TABLES: &[(&str, &str)] = &[
    ("TABLE_PARCELS", r#"
        CREATE TABLE IF NOT EXISTS parcels (
            parcel_uuid TEXT PRIMARY KEY,
            parcel_id TEXT NOT NULL,
            county_name TEXT NOT NULL,
            state_code TEXT NOT NULL,
            latitude REAL,
            longitude REAL,
            situs_address TEXT,
            situs_city TEXT,
            situs_zip TEXT,
            mailing_address TEXT,
            mailing_city TEXT,
            mailing_state TEXT,
            mailing_zip TEXT,
            property_class TEXT,
            assessed_value REAL,
            lot_acreage REAL,
            building_sqft REAL,
            year_built INTEGER,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(parcel_id, county_name, state_code)
        );
    "#),
    ("TABLE_VACANCY_CHECKS", r#"
        CREATE TABLE IF NOT EXISTS vacancy_checks (
            id TEXT PRIMARY KEY,
            parcel_uuid TEXT NOT NULL,
            probe_address TEXT,
            probe_city TEXT,
            probe_zip TEXT,
            vacant INTEGER,
            dpv_confirmed INTEGER,
            address_mismatch INTEGER,
            error_code TEXT,
            checked_at TEXT NOT NULL
        );
    "#),
    ("TABLE_MOTIVATION_SIGNALS", r#"
        CREATE TABLE IF NOT EXISTS motivation_signals (
            id TEXT PRIMARY KEY,
            parcel_id TEXT NOT NULL,
            county_name TEXT NOT NULL,
            state_code TEXT NOT NULL,
            signal_code TEXT NOT NULL,
            confidence REAL NOT NULL,
            evidence TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_MOTIVATION_SCORES", r#"
        CREATE TABLE IF NOT EXISTS motivation_scores (
            parcel_id TEXT NOT NULL,
            county_name TEXT NOT NULL,
            state_code TEXT NOT NULL,
            computed_at TEXT NOT NULL,
            mc_score REAL,
            signal_count INTEGER,
            signal_codes TEXT,
            conviction_score REAL,
            -- La unicidad lleva computed_at (jamás parcel_id a secas) y
            -- el alcance de condado: parcel_id colisiona entre condados.
            PRIMARY KEY (parcel_id, county_name, state_code, computed_at)
        );
    "#),
    ("TABLE_SYSTEM_STATE", r#"
        CREATE TABLE IF NOT EXISTS system_state (
            key TEXT PRIMARY KEY,
            value_text TEXT,
            value_int INTEGER,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
];

/**
 * ESTRATO 2: GRUPOS DE MIGRACIÓN DE BANDAS.
 * `(columna, tipo SQL)` por grupo nombrado.
 */
const SCAN_BAND_GROUP: &[(&str, &str)] = &[
    ("ndvi_current", "REAL"),
    ("ndvi_category", "TEXT"),
    ("fema_flood_zone", "TEXT"),
    ("fema_sfha", "INTEGER"),
    ("fema_risk_tier", "TEXT"),
    ("distress_score", "REAL"),
    ("flag_overgrowth", "INTEGER"),
    ("conf_overgrowth", "REAL"),
    ("flag_neglect", "INTEGER"),
    ("conf_neglect", "REAL"),
    ("flag_flood", "INTEGER"),
    ("conf_flood", "REAL"),
    ("flag_structural", "INTEGER"),
    ("conf_structural", "REAL"),
    ("scan_pass", "INTEGER DEFAULT 0"),
    ("scan_date", "TEXT"),
    ("sentinel_worthy", "INTEGER"),
    ("scan_error", "TEXT"),
];

const SATELLITE_BAND_GROUP: &[(&str, &str)] = &[
    ("sentinel_trend", "TEXT"),
    ("sentinel_slope", "REAL"),
    ("sentinel_ndvi_latest", "REAL"),
    ("sentinel_month_count", "INTEGER"),
    ("sentinel_ndvi_mean", "REAL"),
    ("sentinel_source", "TEXT"),
    ("sentinel_chart_url", "TEXT"),
    ("sentinel_scan_date", "TEXT"),
];

const VACANCY_BAND_GROUP: &[(&str, &str)] = &[
    ("usps_address", "TEXT"),
    ("usps_city", "TEXT"),
    ("usps_zip", "TEXT"),
    ("usps_zip4", "TEXT"),
    ("usps_vacant", "INTEGER"),
    ("usps_dpv_confirmed", "INTEGER"),
    ("usps_business", "INTEGER"),
    ("usps_address_mismatch", "INTEGER"),
    ("usps_check_date", "TEXT"),
    ("usps_error", "TEXT"),
    ("flag_vacancy", "INTEGER"),
    ("vacancy_confidence", "REAL"),
];

const HIGH_RES_BAND_GROUP: &[(&str, &str)] = &[
    ("planet_scene_count", "INTEGER"),
    ("planet_change_score", "REAL"),
    ("planet_span_days", "INTEGER"),
    ("planet_earliest_date", "TEXT"),
    ("planet_latest_date", "TEXT"),
    ("planet_earliest_thumb", "TEXT"),
    ("planet_latest_thumb", "TEXT"),
    ("planet_scan_date", "TEXT"),
];

const COMPOSITE_BAND_GROUP: &[(&str, &str)] = &[
    ("ndvi_slope_5yr", "REAL"),
    ("ndvi_slope_pctile", "REAL"),
    ("ndvi_vintage_count", "INTEGER"),
    ("ndvi_year_span", "INTEGER"),
    ("distress_composite", "REAL"),
    ("composite_date", "TEXT"),
];

const CONVICTION_BAND_GROUP: &[(&str, &str)] = &[
    ("conviction_score", "REAL"),
    ("conviction_base_score", "REAL"),
    ("conviction_vacancy_bonus", "REAL"),
    ("conviction_mc_score", "REAL"),
    ("conviction_components", "TEXT"),
    ("mc_signal_count", "INTEGER"),
    ("mc_signal_codes", "TEXT"),
    ("conviction_date", "TEXT"),
];

const MIGRATION_GROUPS: &[(&str, &[(&str, &str)])] = &[
    ("scan", SCAN_BAND_GROUP),
    ("satellite", SATELLITE_BAND_GROUP),
    ("vacancy", VACANCY_BAND_GROUP),
    ("high_res", HIGH_RES_BAND_GROUP),
    ("composite", COMPOSITE_BAND_GROUP),
    ("conviction", CONVICTION_BAND_GROUP),
];

/**
 * ESTRATO 3: ÍNDICES DE ACELERACIÓN.
 * Uno por columna filtrable/ordenable de la superficie de consulta.
 */
const ACCELERATION_INDEXES: &[(&str, &str)] = &[
    ("IDX_NDVI_CURRENT", "CREATE INDEX IF NOT EXISTS idx_parcels_ndvi_current ON parcels(ndvi_current);"),
    ("IDX_DISTRESS_SCORE", "CREATE INDEX IF NOT EXISTS idx_parcels_distress_score ON parcels(distress_score);"),
    ("IDX_FLOOD_ZONE", "CREATE INDEX IF NOT EXISTS idx_parcels_flood_zone ON parcels(fema_flood_zone);"),
    ("IDX_FLAG_OVERGROWTH", "CREATE INDEX IF NOT EXISTS idx_parcels_flag_overgrowth ON parcels(flag_overgrowth);"),
    ("IDX_FLAG_NEGLECT", "CREATE INDEX IF NOT EXISTS idx_parcels_flag_neglect ON parcels(flag_neglect);"),
    ("IDX_FLAG_FLOOD", "CREATE INDEX IF NOT EXISTS idx_parcels_flag_flood ON parcels(flag_flood);"),
    ("IDX_FLAG_STRUCTURAL", "CREATE INDEX IF NOT EXISTS idx_parcels_flag_structural ON parcels(flag_structural);"),
    ("IDX_FLAG_VACANCY", "CREATE INDEX IF NOT EXISTS idx_parcels_flag_vacancy ON parcels(flag_vacancy);"),
    ("IDX_SCAN_DATE", "CREATE INDEX IF NOT EXISTS idx_parcels_scan_date ON parcels(scan_date);"),
    ("IDX_SENTINEL_DATE", "CREATE INDEX IF NOT EXISTS idx_parcels_sentinel_date ON parcels(sentinel_scan_date);"),
    ("IDX_SENTINEL_TREND", "CREATE INDEX IF NOT EXISTS idx_parcels_sentinel_trend ON parcels(sentinel_trend);"),
    ("IDX_USPS_VACANT", "CREATE INDEX IF NOT EXISTS idx_parcels_usps_vacant ON parcels(usps_vacant);"),
    ("IDX_USPS_DATE", "CREATE INDEX IF NOT EXISTS idx_parcels_usps_date ON parcels(usps_check_date);"),
    ("IDX_COMPOSITE", "CREATE INDEX IF NOT EXISTS idx_parcels_composite ON parcels(distress_composite);"),
    // Lecturas ordenadas por convicción (las consultas usan NULLS LAST).
    ("IDX_CONVICTION_DESC", "CREATE INDEX IF NOT EXISTS idx_parcels_conviction_desc ON parcels(conviction_score DESC);"),
    ("IDX_AUDIT_PARCEL", "CREATE INDEX IF NOT EXISTS idx_vacancy_checks_parcel ON vacancy_checks(parcel_uuid);"),
    ("IDX_SIGNALS_COMPOUND", "CREATE INDEX IF NOT EXISTS idx_motivation_signals_compound ON motivation_signals(county_name, state_code, parcel_id);"),
];

/**
 * Ejecuta la secuencia maestra de sincronización del esquema.
 * Corre en el arranque de cada proceso (orchestrator y field-scanner).
 */
#[instrument(skip(database_connection))]
pub async fn apply_catastral_schema(database_connection: &Connection) -> Result<()> {
    info!("🏗️ [SCHEMA_ENGINE]: Initiating structural synchronization V5.4...");

    solidify_genesis_tables(database_connection).await?;
    apply_band_migration_groups(database_connection).await?;
    harden_access_layer(database_connection).await?;

    info!("✅ [SCHEMA_ENGINE]: Catastral ledger level and certified.");
    Ok(())
}

async fn solidify_genesis_tables(db: &Connection) -> Result<()> {
    for (identifier, sql) in GENESIS_TABLES {
        debug!("  ↳ Solidifying: {}", identifier);
        db.execute(*sql, ()).await
            .with_context(|| format!("CRITICAL_SOLIDIFICATION_FAULT: {identifier}"))?;
    }
    Ok(())
}

/// Catálogo de columnas vigente de la tabla `parcels`.
async fn read_parcel_column_catalog(db: &Connection) -> Result<HashSet<String>> {
    let mut rows = db.query("PRAGMA table_info(parcels)", ()).await
        .context("COLUMN_CATALOG_FAULT: pragma rejected")?;

    let mut catalog = HashSet::new();
    while let Some(row) = rows.next().await? {
        // Columna 1 del pragma: nombre de la columna.
        let column_name: String = row.get(1)?;
        catalog.insert(column_name);
    }
    Ok(catalog)
}

async fn apply_band_migration_groups(db: &Connection) -> Result<()> {
    let column_catalog = read_parcel_column_catalog(db).await?;

    for (group_label, group_columns) in MIGRATION_GROUPS {
        let missing: Vec<&(&str, &str)> = group_columns.iter()
            .filter(|(column_name, _)| !column_catalog.contains(*column_name))
            .collect();

        // Grupo completo: el DDL se salta por entero, sin tocar el
        // candado exclusivo de la tabla.
        if missing.is_empty() {
            debug!("  ⚪ [MIGRATION_SKIP]: Group '{}' already level.", group_label);
            continue;
        }

        info!("  🟢 [MIGRATION]: Applying group '{}' ({} column(s)).", group_label, missing.len());
        for (column_name, column_type) in missing {
            let ddl = format!("ALTER TABLE parcels ADD COLUMN {column_name} {column_type}");
            match db.execute(&ddl, ()).await {
                Ok(_) => debug!("    ↳ Column {} added.", column_name),
                Err(fault) => {
                    let message = fault.to_string();
                    // Carrera benigna entre procesos concurrentes.
                    if message.contains("duplicate column name") {
                        debug!("    ⚪ Column {} already level.", column_name);
                    } else {
                        warn!("    ⚠️ [MIGRATION_BYPASS]: {} incomplete: {}", column_name, message);
                    }
                }
            }
        }
    }
    Ok(())
}

async fn harden_access_layer(db: &Connection) -> Result<()> {
    for (identifier, sql) in ACCELERATION_INDEXES {
        debug!("  ↳ Hardening: {}", identifier);
        db.execute(*sql, ()).await
            .with_context(|| format!("CRITICAL_HARDENING_FAULT: {identifier}"))?;
    }
    Ok(())
}
