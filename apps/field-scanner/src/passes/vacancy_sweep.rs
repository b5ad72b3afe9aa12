// [apps/field-scanner/src/passes/vacancy_sweep.rs]
/*!
 * =================================================================
 * APARATO: VACANCY SWEEP PASS (V5.6 - PASE 2)
 * CLASIFICACIÓN: BATCH ENGINE (ESTRATO L5)
 * RESPONSABILIDAD: VERIFICACIÓN POSTAL BAJO CUOTA ESTRICTA
 *
 * VISION HIPER-HOLÍSTICA:
 * Selección restringida a `distress_composite ≥ C` (7.5 por
 * defecto). UNA parcela a la vez por juego de credenciales: un
 * worker por cuenta drenando una cola compartida, con el jitter
 * obligatorio entre llamadas dentro del cliente. Fallback de
 * dirección de mailing solo cuando `mailing_state = state_code`.
 * Escribe la banda de vacancia y la bitácora de auditoría
 * (best-effort: su fallo jamás bloquea la actualización).
 * =================================================================
 */

use crate::{scan_date_today, PassContext};
use anyhow::{bail, Result};
use catastro_domain_evaluators::evaluate_vacancy;
use catastro_domain_models::{
    BatchSummary, EvidenceBundle, ParcelIdentity, VacancyBand, VacancyProbe,
};
use catastro_infra_db::repositories::{ParcelRepository, VacancyAuditRepository, VacancyCandidate};
use catastro_infra_remote::{CarrierVacancyClient, RemoteError};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// Piso por defecto del compuesto para merecer una sonda postal.
pub const DEFAULT_COMPOSITE_FLOOR: f64 = 7.5;

/// Chunk de compromiso del Pase 2: la cadencia es de ~1 llamada/40 s
/// por cuenta, así que los chunks cortos acotan la pérdida por corte.
const VACANCY_CHUNK_SIZE: usize = 10;

pub struct VacancySweepPass {
    context: PassContext,
}

impl VacancySweepPass {
    pub fn new(context: PassContext) -> Self {
        Self { context }
    }

    #[instrument(skip(self))]
    pub async fn execute(&self, composite_floor: f64, batch_limit: usize) -> Result<BatchSummary> {
        let Some(vacancy_client) = self.context.remotes.vacancy.clone() else {
            bail!("PASS_2_UNAVAILABLE: carrier vacancy credentials are not provisioned");
        };

        let repository = ParcelRepository::new(self.context.ledger.clone());
        let candidates = repository
            .select_vacancy_candidates(composite_floor, batch_limit)
            .await?;

        if candidates.is_empty() {
            info!("⚪ [PASS_2]: No parcels above composite floor {composite_floor:.2}.");
            return Ok(BatchSummary::default());
        }

        let account_total = vacancy_client.account_count();
        info!(
            "📮 [PASS_2]: Sweeping {} parcel(s) with {} credential account(s).",
            candidates.len(), account_total
        );

        let shared_queue = Arc::new(Mutex::new(candidates.into_iter().collect::<VecDeque<_>>()));
        let check_date = scan_date_today();

        // Un worker serial por cuenta; cada cuenta carga su propia
        // cuota horaria, jitter y backoff dentro del cliente.
        let mut worker_handles = Vec::with_capacity(account_total);
        for account_index in 0..account_total {
            let worker = AccountWorker {
                context: self.context.clone(),
                client: vacancy_client.clone(),
                queue: shared_queue.clone(),
                check_date: check_date.clone(),
                account_index,
            };
            worker_handles.push(tokio::spawn(async move { worker.drain_queue().await }));
        }

        let mut summary = BatchSummary::default();
        let mut pass_fault: Option<anyhow::Error> = None;
        for handle in worker_handles {
            match handle.await {
                Ok(Ok(worker_summary)) => summary.absorb(worker_summary),
                Ok(Err(worker_fault)) => pass_fault = Some(worker_fault),
                Err(join_fault) => pass_fault = Some(join_fault.into()),
            }
        }

        // Una credencial muerta colapsa el pase (accionable), pero
        // primero se reporta lo ya comprometido por los demás workers.
        if let Some(fault) = pass_fault {
            warn!("❌ [PASS_2]: Halted with partial verdict {summary}.");
            return Err(fault);
        }

        info!("✅ [PASS_2]: Batch verdict: {summary}");
        Ok(summary)
    }
}

struct AccountWorker {
    context: PassContext,
    client: Arc<CarrierVacancyClient>,
    queue: Arc<Mutex<VecDeque<VacancyCandidate>>>,
    check_date: String,
    account_index: usize,
}

impl AccountWorker {
    async fn drain_queue(&self) -> Result<BatchSummary> {
        let repository = ParcelRepository::new(self.context.ledger.clone());
        let audit = VacancyAuditRepository::new(self.context.ledger.clone());

        let mut summary = BatchSummary::default();
        let mut pending_bands: Vec<(ParcelIdentity, VacancyBand)> = Vec::with_capacity(VACANCY_CHUNK_SIZE);

        loop {
            if self.context.is_cancelled() {
                warn!("🛑 [PASS_2:{}]: Cooperative cancellation requested.", self.account_index + 1);
                break;
            }

            let Some(candidate) = self.queue.lock().await.pop_front() else {
                break;
            };

            // Resolución de dirección con fallback de mailing acotado
            // al mismo estado; sin dirección utilizable se salta.
            let Some((street, city, zip)) = candidate.item.resolve_probe_address() else {
                summary.skipped += 1;
                pending_bands.push((
                    candidate.item.identity.clone(),
                    unresolved_address_band(&self.check_date),
                ));
                continue;
            };

            match self.client
                .check_vacancy(self.account_index, &street, &city, &zip)
                .await
            {
                Ok(probe) => {
                    // Bitácora best-effort: su fallo se anota y sigue.
                    if let Err(audit_fault) = audit
                        .append_probe(&candidate.parcel_uuid, &probe, &self.check_date)
                        .await
                    {
                        warn!("⚠️ [PASS_2]: Audit append bypassed for {}: {audit_fault}",
                            candidate.item.identity);
                    }

                    if probe.vacant {
                        summary.flagged += 1;
                    }
                    pending_bands.push((
                        candidate.item.identity.clone(),
                        compose_vacancy_band(&probe, &self.check_date),
                    ));
                }
                Err(fault @ RemoteError::AuthenticationExpired) => {
                    // Operador requerido: vaciar lo pendiente y colapsar.
                    summary.scanned += repository.persist_vacancy_band(&pending_bands).await? as u64;
                    bail!("PASS_2_CREDENTIAL_FAULT[{}]: {fault}", self.account_index + 1);
                }
                Err(fault) if fault.is_rate_limit() => {
                    // Un límite de tasa NO es fallo de parcela: la
                    // parcela vuelve a la cola para otro intento.
                    warn!("⏳ [PASS_2:{}]: Rate limited. Requeueing {}.",
                        self.account_index + 1, candidate.item.identity);
                    self.queue.lock().await.push_back(candidate);
                }
                Err(fault) => {
                    summary.errors += 1;
                    pending_bands.push((
                        candidate.item.identity.clone(),
                        faulted_probe_band(fault.parcel_error_code(), &self.check_date),
                    ));
                }
            }

            if pending_bands.len() >= VACANCY_CHUNK_SIZE {
                summary.scanned += repository.persist_vacancy_band(&pending_bands).await? as u64;
                pending_bands.clear();
            }
        }

        summary.scanned += repository.persist_vacancy_band(&pending_bands).await? as u64;
        Ok(summary)
    }
}

/// Composición pura de la banda de vacancia desde la sonda.
///
/// Invariante sellado aquí: `usps_vacant = true` ⇒ `flag_vacancy` y
/// `vacancy_confidence ∈ {0.70, 0.75, 0.90}` según el evaluador.
pub fn compose_vacancy_band(probe: &VacancyProbe, check_date: &str) -> VacancyBand {
    let evidence = EvidenceBundle {
        vacancy: Some(probe.clone()),
        ..Default::default()
    };
    let assessment = evaluate_vacancy(&evidence);

    VacancyBand {
        usps_address: probe.normalized_address.clone(),
        usps_city: probe.normalized_city.clone(),
        usps_zip: probe.normalized_zip.clone(),
        usps_zip4: probe.normalized_zip4.clone(),
        usps_vacant: probe.vacant,
        usps_dpv_confirmed: probe.dpv_confirmed,
        usps_business: probe.business,
        usps_address_mismatch: probe.address_mismatch,
        usps_check_date: check_date.to_string(),
        usps_error: probe.error_code.clone(),
        flag_vacancy: assessment.is_some(),
        vacancy_confidence: assessment.map(|verdict| verdict.confidence),
    }
}

fn unresolved_address_band(check_date: &str) -> VacancyBand {
    VacancyBand {
        usps_check_date: check_date.to_string(),
        usps_error: Some("address_unresolved".to_string()),
        ..Default::default()
    }
}

fn faulted_probe_band(error_code: &str, check_date: &str) -> VacancyBand {
    VacancyBand {
        usps_check_date: check_date.to_string(),
        usps_error: Some(error_code.to_string()),
        ..Default::default()
    }
}
