//! Upgrade request domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UpgradeStatus {
    Requested,
    Accepted,
    Cancelled,
}

impl UpgradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpgradeStatus::Requested => "Requested",
            UpgradeStatus::Accepted => "Accepted",
            UpgradeStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Requested" => Some(UpgradeStatus::Requested),
            "Accepted" => Some(UpgradeStatus::Accepted),
            "Cancelled" => Some(UpgradeStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeRequest {
    pub beneficiary_id: Uuid,
    pub status: UpgradeStatus,
    pub upgrade_reason: String,
    pub upgrade_product_type: String,
    pub upgrade_product_info: Option<String>,
    /// Price difference paid by the beneficiary.
    pub cost_of_upgrade: u64,
    pub new_laptop_serial: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub requested_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UpgradeRequest {
    pub fn is_accepted(&self) -> bool {
        self.status == UpgradeStatus::Accepted
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUpgradeRequest {
    pub beneficiary_id: Uuid,
    pub upgrade_reason: String,
    pub upgrade_product_type: String,
    pub upgrade_product_info: Option<String>,
    pub cost_of_upgrade: u64,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub requested_by: Uuid,
}
