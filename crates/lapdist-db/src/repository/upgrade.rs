//! SurrealDB implementation of [`UpgradeRequestRepository`].

use chrono::{DateTime, Utc};
use lapdist_core::error::{LapdistError, LapdistResult};
use lapdist_core::models::upgrade::{CreateUpgradeRequest, UpgradeRequest, UpgradeStatus};
use lapdist_core::repository::UpgradeRequestRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::issuance::{Claim, NOT_ISSUED, UPGRADE_NOT_PENDING, classify_claim_failure};
use super::parse_uuid;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct UpgradeRow {
    status: String,
    upgrade_reason: String,
    upgrade_product_type: String,
    upgrade_product_info: Option<String>,
    cost_of_upgrade: u64,
    new_laptop_serial: Option<String>,
    scheduled_at: Option<DateTime<Utc>>,
    requested_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UpgradeRow {
    fn into_request(self, beneficiary_id: Uuid) -> Result<UpgradeRequest, DbError> {
        let status = UpgradeStatus::parse(&self.status)
            .ok_or_else(|| DbError::Migration(format!("unknown upgrade status: {}", self.status)))?;
        Ok(UpgradeRequest {
            beneficiary_id,
            status,
            upgrade_reason: self.upgrade_reason,
            upgrade_product_type: self.upgrade_product_type,
            upgrade_product_info: self.upgrade_product_info,
            cost_of_upgrade: self.cost_of_upgrade,
            new_laptop_serial: self.new_laptop_serial,
            scheduled_at: self.scheduled_at,
            requested_by: parse_uuid(&self.requested_by, "requesting user")?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the UpgradeRequest repository.
#[derive(Clone)]
pub struct SurrealUpgradeRequestRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUpgradeRequestRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch(&self, beneficiary_id: Uuid) -> Result<Option<UpgradeRequest>, DbError> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('upgrade_request', $id)")
            .bind(("id", beneficiary_id.to_string()))
            .await?;
        let rows: Vec<UpgradeRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(|row| row.into_request(beneficiary_id))
            .transpose()
    }

    async fn fetch_existing(&self, beneficiary_id: Uuid) -> Result<UpgradeRequest, DbError> {
        self.fetch(beneficiary_id)
            .await?
            .ok_or_else(|| DbError::NotFound {
                entity: "upgrade_request".into(),
                id: beneficiary_id.to_string(),
            })
    }
}

impl<C: Connection> UpgradeRequestRepository for SurrealUpgradeRequestRepository<C> {
    async fn find(&self, beneficiary_id: Uuid) -> LapdistResult<Option<UpgradeRequest>> {
        Ok(self.fetch(beneficiary_id).await?)
    }

    async fn submit(&self, input: CreateUpgradeRequest) -> LapdistResult<UpgradeRequest> {
        let id_str = input.beneficiary_id.to_string();

        let result = self
            .db
            .query(
                "UPSERT type::record('upgrade_request', $id) SET \
                 status = 'Requested', \
                 upgrade_reason = $upgrade_reason, \
                 upgrade_product_type = $upgrade_product_type, \
                 upgrade_product_info = $upgrade_product_info, \
                 cost_of_upgrade = $cost_of_upgrade, \
                 new_laptop_serial = NONE, \
                 scheduled_at = $scheduled_at, \
                 requested_by = $requested_by, \
                 created_at = time::now(), \
                 updated_at = time::now()",
            )
            .bind(("id", id_str.clone()))
            .bind(("upgrade_reason", input.upgrade_reason))
            .bind(("upgrade_product_type", input.upgrade_product_type))
            .bind(("upgrade_product_info", input.upgrade_product_info))
            .bind(("cost_of_upgrade", input.cost_of_upgrade))
            .bind(("scheduled_at", input.scheduled_at))
            .bind(("requested_by", input.requested_by.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<UpgradeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "upgrade_request".into(),
            id: id_str,
        })?;

        Ok(row.into_request(input.beneficiary_id)?)
    }

    async fn accept(
        &self,
        beneficiary_id: Uuid,
        new_laptop_serial: String,
        actor_id: Uuid,
    ) -> LapdistResult<UpgradeRequest> {
        let query = format!(
            "BEGIN TRANSACTION; \
             LET $request = (SELECT VALUE status FROM \
             type::record('upgrade_request', $id))[0]; \
             IF $request != 'Requested' {{ THROW '{UPGRADE_NOT_PENDING}' }}; \
             LET $issued = (SELECT VALUE issued_status FROM \
             type::record('issued_status', $id))[0]; \
             IF $issued != 'issued' {{ THROW '{NOT_ISSUED}' }}; \
             CREATE type::record('issued_serial', $serial) SET \
             beneficiary_id = $id; \
             UPDATE type::record('issued_status', $id) SET \
             issued_laptop_serial = $serial, \
             issued_at = time::now(), \
             issued_by = $issued_by, \
             is_requested_to_upgrade = true, \
             updated_at = time::now(); \
             UPDATE type::record('upgrade_request', $id) SET \
             status = 'Accepted', \
             new_laptop_serial = $serial, \
             updated_at = time::now(); \
             COMMIT TRANSACTION;"
        );

        let mut response = self
            .db
            .query(&query)
            .bind(("id", beneficiary_id.to_string()))
            .bind(("serial", new_laptop_serial.clone()))
            .bind(("issued_by", actor_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let errors = response.take_errors();
        if !errors.is_empty() {
            return Err(classify_claim_failure(
                &self.db,
                errors.into_values(),
                Claim::Upgrade,
                &new_laptop_serial,
                beneficiary_id,
            )
            .await
            .into());
        }

        Ok(self.fetch_existing(beneficiary_id).await?)
    }

    async fn cancel(&self, beneficiary_id: Uuid) -> LapdistResult<UpgradeRequest> {
        let result = self
            .db
            .query(
                "UPDATE type::record('upgrade_request', $id) SET \
                 status = 'Cancelled', updated_at = time::now() \
                 WHERE status = 'Requested'",
            )
            .bind(("id", beneficiary_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<UpgradeRow> = result.take(0).map_err(DbError::from)?;
        if let Some(row) = rows.into_iter().next() {
            return Ok(row.into_request(beneficiary_id)?);
        }

        let existing = self.fetch_existing(beneficiary_id).await?;
        Err(LapdistError::Validation {
            message: format!(
                "upgrade request is {} and cannot be cancelled",
                existing.status.as_str()
            ),
        })
    }
}
