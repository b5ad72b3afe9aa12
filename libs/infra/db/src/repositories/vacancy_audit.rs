// [libs/infra/db/src/repositories/vacancy_audit.rs]
/*!
 * =================================================================
 * APARATO: VACANCY AUDIT REPOSITORY (V5.1 - APPEND ONLY)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: BITÁCORA APPEND-ONLY DE SONDAS POSTALES
 *
 * VISION HIPER-HOLÍSTICA:
 * Registro de TODA sonda de vacancia, llaveado por el UUID opaco de
 * la parcela. Las escrituras son best-effort: un fallo aquí se
 * registra y JAMÁS bloquea la actualización de la parcela.
 * =================================================================
 */

use crate::client::LedgerClient;
use crate::errors::DbError;
use catastro_domain_models::VacancyProbe;
use libsql::params;
use tracing::instrument;
use uuid::Uuid;

pub struct VacancyAuditRepository {
    ledger: LedgerClient,
}

impl VacancyAuditRepository {
    pub fn new(ledger: LedgerClient) -> Self {
        Self { ledger }
    }

    /// Anexa una sonda a la bitácora. El llamador trata el error como
    /// best-effort (log y continuar).
    #[instrument(skip(self, probe))]
    pub async fn append_probe(
        &self,
        parcel_uuid: &str,
        probe: &VacancyProbe,
        checked_at: &str,
    ) -> Result<(), DbError> {
        let connection = self.ledger.fresh_connection()?;

        connection.execute(
            r#"
            INSERT INTO vacancy_checks (
                id, parcel_uuid, probe_address, probe_city, probe_zip,
                vacant, dpv_confirmed, address_mismatch, error_code, checked_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                Uuid::new_v4().to_string(),
                parcel_uuid.to_string(),
                probe.normalized_address.clone(),
                probe.normalized_city.clone(),
                probe.normalized_zip.clone(),
                i64::from(probe.vacant),
                probe.dpv_confirmed.map(i64::from),
                i64::from(probe.address_mismatch),
                probe.error_code.clone(),
                checked_at.to_string()
            ],
        ).await?;

        Ok(())
    }

    /// Volumen total de sondas registradas para una parcela.
    pub async fn probe_count(&self, parcel_uuid: &str) -> Result<i64, DbError> {
        let connection = self.ledger.fresh_connection()?;
        let mut rows = connection.query(
            "SELECT COUNT(*) FROM vacancy_checks WHERE parcel_uuid = ?1",
            params![parcel_uuid.to_string()],
        ).await?;

        match rows.next().await? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(0),
        }
    }
}
