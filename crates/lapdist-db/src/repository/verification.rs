//! SurrealDB implementation of [`VerificationStatusRepository`].

use chrono::{DateTime, Utc};
use lapdist_core::error::{LapdistError, LapdistResult};
use lapdist_core::models::verification::{
    RecordOverride, RecordVerification, VerificationStatus,
};
use lapdist_core::repository::VerificationStatusRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::parse_opt_uuid;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct VerificationRow {
    is_coupon_verified: bool,
    is_aadhar_verified: bool,
    is_facial_verified: bool,
    is_otp_verified: bool,
    coupon_verified_at: Option<DateTime<Utc>>,
    aadhar_verified_at: Option<DateTime<Utc>>,
    facial_verified_at: Option<DateTime<Utc>>,
    otp_verified_at: Option<DateTime<Utc>>,
    uploaded_candidate_photo: Option<String>,
    entered_aadhar_number: Option<String>,
    overriding_user: Option<String>,
    overriding_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl VerificationRow {
    fn into_status(self, beneficiary_id: Uuid) -> Result<VerificationStatus, DbError> {
        Ok(VerificationStatus {
            beneficiary_id,
            is_coupon_verified: self.is_coupon_verified,
            is_aadhar_verified: self.is_aadhar_verified,
            is_facial_verified: self.is_facial_verified,
            is_otp_verified: self.is_otp_verified,
            coupon_verified_at: self.coupon_verified_at,
            aadhar_verified_at: self.aadhar_verified_at,
            facial_verified_at: self.facial_verified_at,
            otp_verified_at: self.otp_verified_at,
            uploaded_candidate_photo: self.uploaded_candidate_photo,
            entered_aadhar_number: self.entered_aadhar_number,
            overriding_user: parse_opt_uuid(self.overriding_user, "overriding user")?,
            overriding_reason: self.overriding_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the VerificationStatus repository.
#[derive(Clone)]
pub struct SurrealVerificationStatusRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealVerificationStatusRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> VerificationStatusRepository for SurrealVerificationStatusRepository<C> {
    async fn find(&self, beneficiary_id: Uuid) -> LapdistResult<Option<VerificationStatus>> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('verification_status', $id)")
            .bind(("id", beneficiary_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<VerificationRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.into_status(beneficiary_id)?)),
            None => Ok(None),
        }
    }

    async fn record_checks(&self, input: RecordVerification) -> LapdistResult<VerificationStatus> {
        let id_str = input.beneficiary_id.to_string();

        let result = self
            .db
            .query(
                "UPSERT type::record('verification_status', $id) SET \
                 is_coupon_verified = $is_coupon_verified, \
                 coupon_verified_at = time::now(), \
                 is_aadhar_verified = $is_aadhar_verified, \
                 aadhar_verified_at = time::now(), \
                 is_facial_verified = $is_facial_verified, \
                 facial_verified_at = time::now(), \
                 is_otp_verified = false, \
                 otp_verified_at = NONE, \
                 uploaded_candidate_photo = $uploaded_candidate_photo, \
                 entered_aadhar_number = $entered_aadhar_number, \
                 updated_at = time::now()",
            )
            .bind(("id", id_str.clone()))
            .bind(("is_coupon_verified", input.is_coupon_verified))
            .bind(("is_aadhar_verified", input.is_aadhar_verified))
            .bind(("is_facial_verified", input.is_facial_verified))
            .bind(("uploaded_candidate_photo", input.uploaded_candidate_photo))
            .bind(("entered_aadhar_number", input.entered_aadhar_number))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<VerificationRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "verification_status".into(),
            id: id_str,
        })?;

        Ok(row.into_status(input.beneficiary_id)?)
    }

    async fn record_override(
        &self,
        beneficiary_id: Uuid,
        input: RecordOverride,
    ) -> LapdistResult<VerificationStatus> {
        let id_str = beneficiary_id.to_string();

        let result = self
            .db
            .query(
                "UPDATE type::record('verification_status', $id) SET \
                 overriding_user = $overriding_user, \
                 overriding_reason = $overriding_reason, \
                 updated_at = time::now()",
            )
            .bind(("id", id_str.clone()))
            .bind(("overriding_user", input.overriding_user.to_string()))
            .bind(("overriding_reason", input.overriding_reason))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<VerificationRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "verification_status".into(),
            id: id_str,
        })?;

        Ok(row.into_status(beneficiary_id)?)
    }

    async fn mark_otp_verified(&self, beneficiary_id: Uuid) -> LapdistResult<VerificationStatus> {
        let id_str = beneficiary_id.to_string();

        let result = self
            .db
            .query(
                "UPDATE type::record('verification_status', $id) SET \
                 is_otp_verified = true, \
                 otp_verified_at = time::now(), \
                 updated_at = time::now() \
                 WHERE (is_aadhar_verified AND is_facial_verified) \
                 OR overriding_user != NONE",
            )
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<VerificationRow> = result.take(0).map_err(DbError::from)?;
        if let Some(row) = rows.into_iter().next() {
            return Ok(row.into_status(beneficiary_id)?);
        }

        // Nothing updated: either the row is missing or the guard held.
        match self.find(beneficiary_id).await? {
            None => Err(DbError::NotFound {
                entity: "verification_status".into(),
                id: id_str,
            }
            .into()),
            Some(_) => Err(LapdistError::Validation {
                message: "identity checks are neither passed nor overridden".into(),
            }),
        }
    }
}
