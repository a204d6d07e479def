//! SurrealDB implementation of [`OtpRepository`].

use chrono::{DateTime, Utc};
use lapdist_core::error::LapdistResult;
use lapdist_core::models::otp::{CreateOtp, Otp};
use lapdist_core::repository::OtpRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct OtpRow {
    code: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl OtpRow {
    fn into_otp(self, beneficiary_id: Uuid) -> Otp {
        Otp {
            beneficiary_id,
            code: self.code,
            expires_at: self.expires_at,
            created_at: self.created_at,
        }
    }
}

/// SurrealDB implementation of the OTP repository.
#[derive(Clone)]
pub struct SurrealOtpRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealOtpRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> OtpRepository for SurrealOtpRepository<C> {
    async fn find(&self, beneficiary_id: Uuid) -> LapdistResult<Option<Otp>> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('otp', $id)")
            .bind(("id", beneficiary_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<OtpRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().next().map(|row| row.into_otp(beneficiary_id)))
    }

    async fn create(&self, input: CreateOtp) -> LapdistResult<Otp> {
        let id_str = input.beneficiary_id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('otp', $id) SET \
                 code = $code, \
                 expires_at = $expires_at",
            )
            .bind(("id", id_str.clone()))
            .bind(("code", input.code))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "otp"))?;

        let rows: Vec<OtpRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "otp".into(),
            id: id_str,
        })?;

        Ok(row.into_otp(input.beneficiary_id))
    }

    async fn delete(&self, beneficiary_id: Uuid) -> LapdistResult<()> {
        self.db
            .query("DELETE type::record('otp', $id)")
            .bind(("id", beneficiary_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        Ok(())
    }
}
