//! Verification status domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of every identity check run for a beneficiary, overwritten
/// in place on each verification attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationStatus {
    pub beneficiary_id: Uuid,
    pub is_coupon_verified: bool,
    pub is_aadhar_verified: bool,
    pub is_facial_verified: bool,
    pub is_otp_verified: bool,
    pub coupon_verified_at: Option<DateTime<Utc>>,
    pub aadhar_verified_at: Option<DateTime<Utc>>,
    pub facial_verified_at: Option<DateTime<Utc>>,
    pub otp_verified_at: Option<DateTime<Utc>>,
    /// Storage reference of the photo captured at the counter.
    pub uploaded_candidate_photo: Option<String>,
    /// What the agent typed, encrypted or masked for audit.
    pub entered_aadhar_number: Option<String>,
    pub overriding_user: Option<Uuid>,
    pub overriding_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VerificationStatus {
    /// Manual consent was recorded for this beneficiary.
    pub fn is_overridden(&self) -> bool {
        self.overriding_user.is_some()
    }

    /// Both identity checks passed, or a human gave consent.
    pub fn identity_cleared(&self) -> bool {
        (self.is_aadhar_verified && self.is_facial_verified) || self.is_overridden()
    }

    pub fn is_all_verified(&self) -> bool {
        self.is_coupon_verified && self.is_aadhar_verified && self.is_facial_verified
    }
}

/// Typed patch written by a consolidated verification attempt.
///
/// Resets `is_otp_verified`; override fields are left untouched.
#[derive(Debug, Clone)]
pub struct RecordVerification {
    pub beneficiary_id: Uuid,
    pub is_coupon_verified: bool,
    pub is_aadhar_verified: bool,
    pub is_facial_verified: bool,
    pub uploaded_candidate_photo: String,
    pub entered_aadhar_number: String,
}

#[derive(Debug, Clone)]
pub struct RecordOverride {
    pub overriding_user: Uuid,
    pub overriding_reason: String,
}
