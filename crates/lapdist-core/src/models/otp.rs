//! One-time password record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// At most one live OTP exists per beneficiary (record id = beneficiary id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Otp {
    pub beneficiary_id: Uuid,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Otp {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whole seconds left before expiry, zero once expired.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(0) as u64
    }
}

#[derive(Debug, Clone)]
pub struct CreateOtp {
    pub beneficiary_id: Uuid,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}
