//! Issued status domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum IssuanceState {
    NotIssued,
    Issued,
}

impl IssuanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssuanceState::NotIssued => "not_issued",
            IssuanceState::Issued => "issued",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_issued" => Some(IssuanceState::NotIssued),
            "issued" => Some(IssuanceState::Issued),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedStatus {
    pub beneficiary_id: Uuid,
    pub issued_status: IssuanceState,
    /// Globally unique; a serial is handed to at most one beneficiary ever.
    pub issued_laptop_serial: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub issued_by: Option<Uuid>,
    /// Set once an upgrade swap has been accepted.
    pub is_requested_to_upgrade: bool,
    pub evidence_photo: Option<String>,
    pub bill_receipt: Option<String>,
    pub store_employee_photo: Option<String>,
    pub store_employee_name: Option<String>,
    pub store_employee_mobile: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IssuedStatus {
    pub fn is_issued(&self) -> bool {
        self.issued_status == IssuanceState::Issued
    }
}

/// Evidence captured at the counter when the unit is handed over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuanceEvidence {
    pub evidence_photo: String,
    pub bill_receipt: String,
    pub store_employee_photo: String,
    pub store_employee_name: String,
    pub store_employee_mobile: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceKind {
    LaptopPhoto,
    BillReceipt,
    EmployeePhoto,
}

impl EvidenceKind {
    /// Column the reference is written to.
    pub fn field(&self) -> &'static str {
        match self {
            EvidenceKind::LaptopPhoto => "evidence_photo",
            EvidenceKind::BillReceipt => "bill_receipt",
            EvidenceKind::EmployeePhoto => "store_employee_photo",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordIssuance {
    pub beneficiary_id: Uuid,
    pub laptop_serial: String,
    pub issued_by: Uuid,
    /// `None` keeps the evidence uploaded beforehand.
    pub evidence: Option<IssuanceEvidence>,
}

/// Issuing-employee details reused across transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestIssuer {
    pub store_employee_name: Option<String>,
    pub store_employee_mobile: Option<String>,
    pub store_employee_photo: Option<String>,
}
