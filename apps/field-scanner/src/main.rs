// [apps/field-scanner/src/main.rs]
/**
 * =================================================================
 * APARATO: FIELD SCANNER SHELL (V5.2 - SOBERANO)
 * CLASIFICACIÓN: APPLICATION LAYER (ENTRY POINT)
 * RESPONSABILIDAD: ORQUESTACIÓN DE ARGUMENTOS Y DISPARO DE PASES
 *
 * VISION HIPER-HOLÍSTICA:
 * 1. LIBRARY SYNERGY: el binario es un orquestador puro; los pases
 *    residen en 'catastro_field_scanner' para su auditoría en
 *    Proving Grounds.
 * 2. CANCELACIÓN COOPERATIVA: ctrlc iza la bandera compartida; los
 *    pases vacían su chunk en vuelo y abandonan en estado
 *    consistente.
 * 3. MIGRACIÓN AL ARRANQUE: el esquema se nivela al conectar el
 *    ledger, antes de cualquier selección.
 * =================================================================
 */

use anyhow::Result;
use catastro_field_scanner::passes::{
    BulkScanPass, ConvictionFusionPass, HistoricalBaselinePass,
    SentinelEnrichmentPass, VacancySweepPass,
};
use catastro_field_scanner::passes::vacancy_sweep::DEFAULT_COMPOSITE_FLOOR;
use catastro_field_scanner::PassContext;
use catastro_infra_db::LedgerClient;
use catastro_infra_remote::RemoteSourceRegistry;
use catastro_shared_vigia::init_tracing;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

/// Configuración de argumentos del escáner de campo.
#[derive(Parser, Debug)]
#[command(
    author = "Catastro Field Intelligence",
    version = "5.2",
    about = "Escáner catastral: pases de enriquecimiento NDVI, inundación, satelital, vacancia postal y convicción."
)]
struct CommandArguments {
    #[command(subcommand)]
    pass_directive: PassDirective,
}

#[derive(Subcommand, Debug)]
enum PassDirective {
    /// Pase 1: NDVI masivo + zona de inundación (10 workers).
    Bulk {
        /// Volumen máximo de parcelas del barrido.
        #[arg(short, long, default_value_t = 100_000)]
        limit: usize,
    },
    /// Pase 1.5: pendiente histórica + compuesto del condado.
    Baseline {
        #[arg(short, long)]
        county: String,
        #[arg(short, long)]
        state: String,
        #[arg(short, long, default_value_t = 50_000)]
        limit: usize,
    },
    /// Pase 1.5b: enriquecimiento satelital de parcelas marcadas.
    Sentinel {
        #[arg(short, long, default_value_t = 10_000)]
        limit: usize,
    },
    /// Pase 2: verificación de vacancia postal bajo cuota estricta.
    Vacancy {
        /// Piso del compuesto de deterioro para merecer sonda.
        #[arg(long, default_value_t = DEFAULT_COMPOSITE_FLOOR)]
        composite_floor: f64,
        #[arg(short, long, default_value_t = 2_000)]
        limit: usize,
    },
    /// Pase 2.5: fusión de convicción y backfill de motivación.
    Conviction {
        #[arg(short, long)]
        county: String,
        #[arg(short, long)]
        state: String,
    },
    /// Secuencia completa 1 → 1.5 → 1.5b → 2 → 2.5 para un condado.
    All {
        #[arg(short, long)]
        county: String,
        #[arg(short, long)]
        state: String,
        #[arg(short, long, default_value_t = 100_000)]
        limit: usize,
        #[arg(long, default_value_t = DEFAULT_COMPOSITE_FLOOR)]
        composite_floor: f64,
    },
}

fn main() -> Result<()> {
    // 1. CARGA DE ENTORNO SOBERANO
    dotenv().ok();

    // 2. INICIALIZACIÓN DE OBSERVABILIDAD (VIGÍA)
    init_tracing("catastro_field_scanner");

    let cli_configuration = CommandArguments::parse();

    // 3. RUNTIME MULTI-HILO DE TOKIO
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        info!("🗺️ [FIELD_SCANNER]: Ignition sequence starting...");

        // 4. ENLACE AL LEDGER (migra el esquema al conectar)
        let database_connection_url = std::env::var("DATABASE_URL")
            .expect("CRITICAL_FAULT: DATABASE_URL not defined in runtime environment.");
        let database_access_token = std::env::var("TURSO_AUTH_TOKEN").ok();

        let ledger = LedgerClient::connect(&database_connection_url, database_access_token)
            .await
            .expect("FATAL: Ledger link collapse. Ignition aborted.");

        // 5. REGISTRO DE FUENTES REMOTAS
        let remotes = Arc::new(
            RemoteSourceRegistry::provision_from_env()
                .expect("FATAL: Remote source registry provisioning failed."),
        );

        let context = PassContext::new(ledger, remotes);

        // 6. BANDERA DE CANCELACIÓN COOPERATIVA (CTRL-C)
        let cancellation_handle = context.cancellation_handle();
        ctrlc::set_handler(move || {
            warn!("🛑 [FIELD_SCANNER]: Interrupt received. Raising cooperative cancellation flag.");
            cancellation_handle.store(true, Ordering::Relaxed);
        }).expect("CRITICAL: Interrupt handler installation failed.");

        // 7. DESPACHO DEL PASE SOLICITADO
        dispatch_directive(cli_configuration.pass_directive, context).await
    })
}

async fn dispatch_directive(directive: PassDirective, context: PassContext) -> Result<()> {
    match directive {
        PassDirective::Bulk { limit } => {
            let summary = BulkScanPass::new(context).execute(limit).await?;
            info!("🏁 [VERDICT]: {summary}");
        }
        PassDirective::Baseline { county, state, limit } => {
            let summary = HistoricalBaselinePass::new(context)
                .execute(&county, &state, limit)
                .await?;
            info!("🏁 [VERDICT]: {summary}");
        }
        PassDirective::Sentinel { limit } => {
            let summary = SentinelEnrichmentPass::new(context).execute(limit).await?;
            info!("🏁 [VERDICT]: {summary}");
        }
        PassDirective::Vacancy { composite_floor, limit } => {
            let summary = VacancySweepPass::new(context)
                .execute(composite_floor, limit)
                .await?;
            info!("🏁 [VERDICT]: {summary}");
        }
        PassDirective::Conviction { county, state } => {
            let summary = ConvictionFusionPass::new(context).execute(&county, &state).await?;
            info!("🏁 [VERDICT]: {summary}");
        }
        PassDirective::All { county, state, limit, composite_floor } => {
            // Secuencia completa; cada pase es independiente y
            // reanudable, así que un corte a mitad no daña nada.
            let mut aggregate = catastro_domain_models::BatchSummary::default();

            aggregate.absorb(BulkScanPass::new(context.clone()).execute(limit).await?);
            aggregate.absorb(
                HistoricalBaselinePass::new(context.clone())
                    .execute(&county, &state, limit)
                    .await?,
            );
            aggregate.absorb(SentinelEnrichmentPass::new(context.clone()).execute(limit).await?);

            // El Pase 2 es opcional: sin credenciales postales la
            // secuencia sigue hacia la fusión.
            match VacancySweepPass::new(context.clone())
                .execute(composite_floor, limit)
                .await
            {
                Ok(summary) => aggregate.absorb(summary),
                Err(fault) => warn!("⚠️ [ALL]: Vacancy sweep unavailable: {fault}"),
            }

            aggregate.absorb(ConvictionFusionPass::new(context).execute(&county, &state).await?);
            info!("🏁 [VERDICT]: Full sequence {aggregate}");
        }
    }
    Ok(())
}
