//! Beneficiary domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Beneficiary {
    pub id: Uuid,
    pub full_name: String,
    pub mobile_number: String,
    pub email: Option<String>,
    /// Voucher code handed out at registration.
    pub coupon_code: Option<String>,
    /// Alternate voucher key used by later distribution rounds.
    pub gift_card_code: Option<String>,
    /// Argon2id PHC string of the national ID number.
    pub aadhar_number_hashed: String,
    pub aadhar_number_masked: String,
    /// Storage reference of the registered photo.
    pub photo: Option<String>,
    pub store_id: Option<Uuid>,
    /// HR / registration approval, distinct from identity verification.
    pub is_candidate_verified: bool,
    pub vendor_spoc_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBeneficiary {
    pub full_name: String,
    pub mobile_number: String,
    pub email: Option<String>,
    pub coupon_code: Option<String>,
    pub gift_card_code: Option<String>,
    /// Already hashed; see `lapdist_verify::identity`.
    pub aadhar_number_hashed: String,
    pub aadhar_number_masked: String,
    pub photo: Option<String>,
    pub store_id: Option<Uuid>,
    pub vendor_spoc_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateBeneficiary {
    pub full_name: Option<String>,
    pub mobile_number: Option<String>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub email: Option<Option<String>>,
    pub photo: Option<Option<String>>,
    pub store_id: Option<Option<Uuid>>,
    pub is_candidate_verified: Option<bool>,
    pub vendor_spoc_id: Option<Option<Uuid>>,
}

/// The slice of a beneficiary returned to the store-side client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeneficiarySummary {
    pub beneficiary_id: Uuid,
    pub photo: Option<String>,
    pub full_name: String,
    pub mobile_number: String,
}

impl From<&Beneficiary> for BeneficiarySummary {
    fn from(b: &Beneficiary) -> Self {
        Self {
            beneficiary_id: b.id,
            photo: b.photo.clone(),
            full_name: b.full_name.clone(),
            mobile_number: b.mobile_number.clone(),
        }
    }
}
