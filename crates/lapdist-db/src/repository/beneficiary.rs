//! SurrealDB implementation of [`BeneficiaryRepository`].

use chrono::{DateTime, Utc};
use lapdist_core::error::{LapdistError, LapdistResult};
use lapdist_core::models::beneficiary::{Beneficiary, CreateBeneficiary, UpdateBeneficiary};
use lapdist_core::repository::BeneficiaryRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::warn;
use uuid::Uuid;

use super::{parse_opt_uuid, parse_uuid};
use crate::error::{DbError, is_unique_violation};

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct BeneficiaryRow {
    full_name: String,
    mobile_number: String,
    email: Option<String>,
    coupon_code: Option<String>,
    gift_card_code: Option<String>,
    aadhar_number_hashed: String,
    aadhar_number_masked: String,
    photo: Option<String>,
    store_id: Option<String>,
    is_candidate_verified: bool,
    vendor_spoc_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BeneficiaryRow {
    fn into_beneficiary(self, id: Uuid) -> Result<Beneficiary, DbError> {
        Ok(Beneficiary {
            id,
            full_name: self.full_name,
            mobile_number: self.mobile_number,
            email: self.email,
            coupon_code: self.coupon_code,
            gift_card_code: self.gift_card_code,
            aadhar_number_hashed: self.aadhar_number_hashed,
            aadhar_number_masked: self.aadhar_number_masked,
            photo: self.photo,
            store_id: parse_opt_uuid(self.store_id, "store")?,
            is_candidate_verified: self.is_candidate_verified,
            vendor_spoc_id: parse_opt_uuid(self.vendor_spoc_id, "vendor")?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct VoucherRow {
    beneficiary_id: String,
}

/// SurrealDB implementation of the Beneficiary repository.
#[derive(Clone)]
pub struct SurrealBeneficiaryRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealBeneficiaryRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Owner of a coupon or gift-card code, if registered.
    async fn voucher_owner(&self, code: &str) -> Result<Option<Uuid>, DbError> {
        let mut result = self
            .db
            .query("SELECT beneficiary_id FROM type::record('voucher_code', $code)")
            .bind(("code", code.to_string()))
            .await?;
        let rows: Vec<VoucherRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(|row| parse_uuid(&row.beneficiary_id, "beneficiary"))
            .transpose()
    }

    /// Explain an aborted registration. A racing registration that took
    /// one of the codes aborts this one without a duplicate-key message.
    async fn classify_create_failure(&self, message: String, codes: &[&str]) -> LapdistError {
        if message.contains("voucher_code") && is_unique_violation(&message) {
            return voucher_taken();
        }
        if is_unique_violation(&message) {
            return LapdistError::AlreadyExists {
                entity: "beneficiary".into(),
            };
        }
        for code in codes {
            match self.voucher_owner(code).await {
                Ok(Some(_)) => return voucher_taken(),
                Ok(None) => {}
                Err(lookup) => {
                    warn!(error = %lookup, "Voucher owner lookup failed after aborted registration");
                    break;
                }
            }
        }
        DbError::Migration(message).into()
    }
}

fn voucher_taken() -> LapdistError {
    LapdistError::AlreadyExists {
        entity: "voucher_code".into(),
    }
}

impl<C: Connection> BeneficiaryRepository for SurrealBeneficiaryRepository<C> {
    async fn create(&self, input: CreateBeneficiary) -> LapdistResult<Beneficiary> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        // Each code is claimed as its own record so a code can never be
        // held by two beneficiaries, whichever column it sits in.
        let mut claims = String::new();
        if input.coupon_code.is_some() {
            claims.push_str(
                "CREATE type::record('voucher_code', $coupon_code) SET \
                 beneficiary_id = $id, kind = 'coupon'; ",
            );
        }
        if input.gift_card_code.is_some() {
            claims.push_str(
                "CREATE type::record('voucher_code', $gift_card_code) SET \
                 beneficiary_id = $id, kind = 'gift_card'; ",
            );
        }
        let query = format!(
            "BEGIN TRANSACTION; \
             {claims}\
             CREATE type::record('beneficiary', $id) SET \
             full_name = $full_name, \
             mobile_number = $mobile_number, \
             email = $email, \
             coupon_code = $coupon_code, \
             gift_card_code = $gift_card_code, \
             aadhar_number_hashed = $aadhar_number_hashed, \
             aadhar_number_masked = $aadhar_number_masked, \
             photo = $photo, \
             store_id = $store_id, \
             is_candidate_verified = false, \
             vendor_spoc_id = $vendor_spoc_id; \
             COMMIT TRANSACTION;"
        );

        let codes: Vec<String> = [&input.coupon_code, &input.gift_card_code]
            .into_iter()
            .flatten()
            .cloned()
            .collect();

        let mut response = self
            .db
            .query(&query)
            .bind(("id", id_str))
            .bind(("full_name", input.full_name))
            .bind(("mobile_number", input.mobile_number))
            .bind(("email", input.email))
            .bind(("coupon_code", input.coupon_code))
            .bind(("gift_card_code", input.gift_card_code))
            .bind(("aadhar_number_hashed", input.aadhar_number_hashed))
            .bind(("aadhar_number_masked", input.aadhar_number_masked))
            .bind(("photo", input.photo))
            .bind(("store_id", input.store_id.map(|s| s.to_string())))
            .bind((
                "vendor_spoc_id",
                input.vendor_spoc_id.map(|v| v.to_string()),
            ))
            .await
            .map_err(DbError::from)?;

        let errors = response.take_errors();
        if !errors.is_empty() {
            let message = errors
                .into_values()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            let codes: Vec<&str> = codes.iter().map(String::as_str).collect();
            return Err(self.classify_create_failure(message, &codes).await);
        }

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> LapdistResult<Beneficiary> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('beneficiary', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<BeneficiaryRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "beneficiary".into(),
            id: id_str,
        })?;

        Ok(row.into_beneficiary(id)?)
    }

    async fn get_by_voucher_code(&self, code: &str) -> LapdistResult<Beneficiary> {
        let owner = self
            .voucher_owner(code)
            .await?
            .ok_or_else(|| DbError::NotFound {
                entity: "beneficiary".into(),
                id: format!("voucher={code}"),
            })?;
        self.get_by_id(owner).await
    }

    async fn update(&self, id: Uuid, input: UpdateBeneficiary) -> LapdistResult<Beneficiary> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.full_name.is_some() {
            sets.push("full_name = $full_name");
        }
        if input.mobile_number.is_some() {
            sets.push("mobile_number = $mobile_number");
        }
        if input.email.is_some() {
            sets.push("email = $email");
        }
        if input.photo.is_some() {
            sets.push("photo = $photo");
        }
        if input.store_id.is_some() {
            sets.push("store_id = $store_id");
        }
        if input.is_candidate_verified.is_some() {
            sets.push("is_candidate_verified = $is_candidate_verified");
        }
        if input.vendor_spoc_id.is_some() {
            sets.push("vendor_spoc_id = $vendor_spoc_id");
        }
        sets.push("updated_at = time::now()");

        // UPDATE on a missing record id creates nothing and returns no rows.
        let query = format!(
            "UPDATE type::record('beneficiary', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(full_name) = input.full_name {
            builder = builder.bind(("full_name", full_name));
        }
        if let Some(mobile_number) = input.mobile_number {
            builder = builder.bind(("mobile_number", mobile_number));
        }
        if let Some(email) = input.email {
            builder = builder.bind(("email", email));
        }
        if let Some(photo) = input.photo {
            builder = builder.bind(("photo", photo));
        }
        if let Some(store_id) = input.store_id {
            builder = builder.bind(("store_id", store_id.map(|s| s.to_string())));
        }
        if let Some(verified) = input.is_candidate_verified {
            builder = builder.bind(("is_candidate_verified", verified));
        }
        if let Some(vendor_spoc_id) = input.vendor_spoc_id {
            builder = builder.bind(("vendor_spoc_id", vendor_spoc_id.map(|v| v.to_string())));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "beneficiary"))?;

        let rows: Vec<BeneficiaryRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "beneficiary".into(),
            id: id_str,
        })?;

        Ok(row.into_beneficiary(id)?)
    }
}
