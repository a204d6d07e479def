//! SurrealDB implementation of [`IssuedStatusRepository`].
//!
//! Serial uniqueness is enforced by the `issued_serial` table, whose
//! record id is the serial itself. Claiming a serial and marking the
//! beneficiary as issued happen in one transaction, so two stores
//! racing on the same serial cannot both succeed.

use chrono::{DateTime, Utc};
use lapdist_core::error::LapdistResult;
use lapdist_core::models::issuance::{
    EvidenceKind, IssuanceState, IssuedStatus, LatestIssuer, RecordIssuance,
};
use lapdist_core::repository::IssuedStatusRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::warn;
use uuid::Uuid;

use super::{parse_opt_uuid, parse_uuid};
use crate::error::{DbError, is_unique_violation};

#[derive(Debug, SurrealValue)]
struct IssuedRow {
    issued_status: String,
    issued_laptop_serial: Option<String>,
    issued_at: Option<DateTime<Utc>>,
    issued_by: Option<String>,
    is_requested_to_upgrade: bool,
    evidence_photo: Option<String>,
    bill_receipt: Option<String>,
    store_employee_photo: Option<String>,
    store_employee_name: Option<String>,
    store_employee_mobile: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl IssuedRow {
    fn into_status(self, beneficiary_id: Uuid) -> Result<IssuedStatus, DbError> {
        let issued_status = IssuanceState::parse(&self.issued_status).ok_or_else(|| {
            DbError::Migration(format!("unknown issued status: {}", self.issued_status))
        })?;
        Ok(IssuedStatus {
            beneficiary_id,
            issued_status,
            issued_laptop_serial: self.issued_laptop_serial,
            issued_at: self.issued_at,
            issued_by: parse_opt_uuid(self.issued_by, "issuer")?,
            is_requested_to_upgrade: self.is_requested_to_upgrade,
            evidence_photo: self.evidence_photo,
            bill_receipt: self.bill_receipt,
            store_employee_photo: self.store_employee_photo,
            store_employee_name: self.store_employee_name,
            store_employee_mobile: self.store_employee_mobile,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct LatestIssuerRow {
    store_employee_name: Option<String>,
    store_employee_mobile: Option<String>,
    store_employee_photo: Option<String>,
    #[allow(dead_code)]
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct SerialRow {
    beneficiary_id: String,
}

#[derive(Debug, SurrealValue)]
struct StateRow {
    state: String,
}

/// Look up the beneficiary a serial was issued to.
pub(super) async fn serial_owner<C: Connection>(
    db: &Surreal<C>,
    laptop_serial: &str,
) -> Result<Option<Uuid>, DbError> {
    let mut result = db
        .query("SELECT beneficiary_id FROM type::record('issued_serial', $serial)")
        .bind(("serial", laptop_serial.to_string()))
        .await?;
    let rows: Vec<SerialRow> = result.take(0)?;
    rows.into_iter()
        .next()
        .map(|row| parse_uuid(&row.beneficiary_id, "beneficiary"))
        .transpose()
}

/// Raised inside the issuing transaction when the row is already issued.
const ALREADY_ISSUED: &str = "laptop already issued to beneficiary";
/// Raised inside the upgrade transaction when the request was settled
/// by someone else.
pub(super) const UPGRADE_NOT_PENDING: &str = "upgrade request is no longer pending";
/// Raised inside the upgrade transaction when there is no laptop to swap.
pub(super) const NOT_ISSUED: &str = "no laptop issued to beneficiary";

/// The transaction a serial was being claimed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Claim {
    Issuance,
    Upgrade,
}

impl Claim {
    /// After an unexplained abort, look at what the winning transaction
    /// left behind.
    async fn settled_by_rival<C: Connection>(
        self,
        db: &Surreal<C>,
        beneficiary_id: Uuid,
    ) -> Result<Option<DbError>, DbError> {
        let (query, table) = match self {
            Claim::Issuance => (
                "SELECT issued_status AS state FROM type::record('issued_status', $id)",
                "issued_status",
            ),
            Claim::Upgrade => (
                "SELECT status AS state FROM type::record('upgrade_request', $id)",
                "upgrade_request",
            ),
        };
        let mut result = db
            .query(query)
            .bind(("id", beneficiary_id.to_string()))
            .await?;
        let rows: Vec<StateRow> = result.take(0)?;
        let state = rows.into_iter().next().map(|row| row.state);
        let settled = match (self, state.as_deref()) {
            (Claim::Issuance, Some("issued")) => true,
            (Claim::Upgrade, Some(status)) => status != "Requested",
            _ => false,
        };
        Ok(settled.then(|| DbError::Conflict {
            entity: table.into(),
        }))
    }
}

/// Map a failed serial-claiming transaction to a typed error.
///
/// Guard failures carry their marker in the message. Duplicate serials
/// surface as a duplicate-record error or, when two transactions race,
/// as a bare write conflict, so the serial owner and then the row the
/// transaction was guarding are re-read before giving up.
pub(super) async fn classify_claim_failure<C: Connection>(
    db: &Surreal<C>,
    errors: impl IntoIterator<Item = surrealdb::Error>,
    claim: Claim,
    laptop_serial: &str,
    beneficiary_id: Uuid,
) -> DbError {
    let message = errors
        .into_iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    if message.contains(ALREADY_ISSUED) {
        return DbError::Conflict {
            entity: "issued_status".into(),
        };
    }
    if message.contains(UPGRADE_NOT_PENDING) {
        return DbError::Conflict {
            entity: "upgrade_request".into(),
        };
    }
    if message.contains(NOT_ISSUED) {
        return DbError::NotFound {
            entity: "issued_status".into(),
            id: beneficiary_id.to_string(),
        };
    }
    if is_unique_violation(&message) {
        return DbError::Conflict {
            entity: "issued_serial".into(),
        };
    }
    match serial_owner(db, laptop_serial).await {
        Ok(Some(owner)) if owner != beneficiary_id => {
            return DbError::Conflict {
                entity: "issued_serial".into(),
            };
        }
        Ok(_) => {}
        Err(lookup) => {
            warn!(error = %lookup, "Serial owner lookup failed after aborted transaction");
            return DbError::Migration(message);
        }
    }
    match claim.settled_by_rival(db, beneficiary_id).await {
        Ok(Some(conflict)) => conflict,
        Ok(None) => DbError::Migration(message),
        Err(lookup) => {
            warn!(error = %lookup, ?claim, "State lookup failed after aborted transaction");
            DbError::Migration(message)
        }
    }
}

/// SurrealDB implementation of the IssuedStatus repository.
#[derive(Clone)]
pub struct SurrealIssuedStatusRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealIssuedStatusRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, beneficiary_id: Uuid) -> Result<IssuedStatus, DbError> {
        let id_str = beneficiary_id.to_string();
        let mut result = self
            .db
            .query("SELECT * FROM type::record('issued_status', $id)")
            .bind(("id", id_str.clone()))
            .await?;
        let rows: Vec<IssuedRow> = result.take(0)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "issued_status".into(),
            id: id_str,
        })?;
        row.into_status(beneficiary_id)
    }
}

impl<C: Connection> IssuedStatusRepository for SurrealIssuedStatusRepository<C> {
    async fn find(&self, beneficiary_id: Uuid) -> LapdistResult<Option<IssuedStatus>> {
        match self.fetch(beneficiary_id).await {
            Ok(status) => Ok(Some(status)),
            Err(DbError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn record_issuance(&self, input: RecordIssuance) -> LapdistResult<IssuedStatus> {
        let mut sets = vec![
            "issued_status = 'issued'",
            "issued_laptop_serial = $serial",
            "issued_at = time::now()",
            "issued_by = $issued_by",
            "updated_at = time::now()",
        ];
        if input.evidence.is_some() {
            sets.extend([
                "evidence_photo = $evidence_photo",
                "bill_receipt = $bill_receipt",
                "store_employee_photo = $store_employee_photo",
                "store_employee_name = $store_employee_name",
                "store_employee_mobile = $store_employee_mobile",
            ]);
        }

        let query = format!(
            "BEGIN TRANSACTION; \
             LET $current = (SELECT VALUE issued_status FROM \
             type::record('issued_status', $id))[0]; \
             IF $current = 'issued' {{ THROW '{ALREADY_ISSUED}' }}; \
             CREATE type::record('issued_serial', $serial) SET \
             beneficiary_id = $id; \
             UPSERT type::record('issued_status', $id) SET {}; \
             COMMIT TRANSACTION;",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", input.beneficiary_id.to_string()))
            .bind(("serial", input.laptop_serial.clone()))
            .bind(("issued_by", input.issued_by.to_string()));

        if let Some(evidence) = input.evidence {
            builder = builder
                .bind(("evidence_photo", evidence.evidence_photo))
                .bind(("bill_receipt", evidence.bill_receipt))
                .bind(("store_employee_photo", evidence.store_employee_photo))
                .bind(("store_employee_name", evidence.store_employee_name))
                .bind(("store_employee_mobile", evidence.store_employee_mobile));
        }

        let mut response = builder.await.map_err(DbError::from)?;
        let errors = response.take_errors();
        if !errors.is_empty() {
            return Err(classify_claim_failure(
                &self.db,
                errors.into_values(),
                Claim::Issuance,
                &input.laptop_serial,
                input.beneficiary_id,
            )
            .await
            .into());
        }

        Ok(self.fetch(input.beneficiary_id).await?)
    }

    async fn attach_evidence(
        &self,
        beneficiary_id: Uuid,
        kind: EvidenceKind,
        reference: String,
        actor_id: Uuid,
    ) -> LapdistResult<IssuedStatus> {
        let query = format!(
            "UPSERT type::record('issued_status', $id) SET \
             {} = $reference, \
             issued_by = $issued_by, \
             updated_at = time::now()",
            kind.field()
        );

        let result = self
            .db
            .query(&query)
            .bind(("id", beneficiary_id.to_string()))
            .bind(("reference", reference))
            .bind(("issued_by", actor_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<IssuedRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "issued_status".into(),
            id: beneficiary_id.to_string(),
        })?;

        Ok(row.into_status(beneficiary_id)?)
    }

    async fn set_employee_details(
        &self,
        beneficiary_id: Uuid,
        name: String,
        mobile: String,
    ) -> LapdistResult<IssuedStatus> {
        let result = self
            .db
            .query(
                "UPSERT type::record('issued_status', $id) SET \
                 store_employee_name = $name, \
                 store_employee_mobile = $mobile, \
                 updated_at = time::now()",
            )
            .bind(("id", beneficiary_id.to_string()))
            .bind(("name", name))
            .bind(("mobile", mobile))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<IssuedRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "issued_status".into(),
            id: beneficiary_id.to_string(),
        })?;

        Ok(row.into_status(beneficiary_id)?)
    }

    async fn latest_issuer(&self, actor_id: Uuid) -> LapdistResult<Option<LatestIssuer>> {
        let mut result = self
            .db
            .query(
                "SELECT store_employee_name, store_employee_mobile, \
                 store_employee_photo, updated_at FROM issued_status \
                 WHERE issued_by = $issued_by \
                 AND store_employee_photo != NONE \
                 ORDER BY updated_at DESC LIMIT 1",
            )
            .bind(("issued_by", actor_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<LatestIssuerRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().next().map(|row| LatestIssuer {
            store_employee_name: row.store_employee_name,
            store_employee_mobile: row.store_employee_mobile,
            store_employee_photo: row.store_employee_photo,
        }))
    }

    async fn serial_owner(&self, laptop_serial: &str) -> LapdistResult<Option<Uuid>> {
        Ok(serial_owner(&self.db, laptop_serial).await?)
    }
}
