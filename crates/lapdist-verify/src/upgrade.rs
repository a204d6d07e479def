//! Upgrade workflow: `NoUpgrade -> Requested -> {Accepted, Cancelled}`.
//!
//! Only beneficiaries who already received a laptop may request an
//! upgrade, and the same identity gate as issuance applies throughout.

use chrono::{DateTime, Utc};
use lapdist_core::error::LapdistError;
use lapdist_core::models::beneficiary::BeneficiarySummary;
use lapdist_core::models::issuance::IssuedStatus;
use lapdist_core::models::upgrade::{CreateUpgradeRequest, UpgradeRequest, UpgradeStatus};
use lapdist_core::repository::{
    BeneficiaryRepository, IssuedStatusRepository, UpgradeRequestRepository,
    VerificationStatusRepository,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::VerifyError;
use crate::gates;

#[derive(Debug, Clone)]
pub struct UpgradePayload {
    pub upgrade_reason: String,
    pub upgrade_product_type: String,
    pub upgrade_product_info: Option<String>,
    pub cost_of_upgrade: u64,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct UpgradeCheck {
    /// Voucher code or gift-card code.
    pub voucher_code: String,
    pub existing_laptop_serial: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpgradeEligibility {
    pub beneficiary: BeneficiarySummary,
    pub current_laptop_serial: String,
    pub upgrade_request: Option<UpgradeRequest>,
}

pub struct UpgradeWorkflow<B, V, I, U>
where
    B: BeneficiaryRepository,
    V: VerificationStatusRepository,
    I: IssuedStatusRepository,
    U: UpgradeRequestRepository,
{
    beneficiary_repo: B,
    status_repo: V,
    issued_repo: I,
    upgrade_repo: U,
}

impl<B, V, I, U> UpgradeWorkflow<B, V, I, U>
where
    B: BeneficiaryRepository,
    V: VerificationStatusRepository,
    I: IssuedStatusRepository,
    U: UpgradeRequestRepository,
{
    pub fn new(beneficiary_repo: B, status_repo: V, issued_repo: I, upgrade_repo: U) -> Self {
        Self {
            beneficiary_repo,
            status_repo,
            issued_repo,
            upgrade_repo,
        }
    }

    async fn issued(&self, beneficiary_id: Uuid) -> Result<IssuedStatus, VerifyError> {
        self.issued_repo
            .find(beneficiary_id)
            .await?
            .filter(IssuedStatus::is_issued)
            .ok_or(VerifyError::NotYetIssued)
    }

    async fn identity_cleared(&self, beneficiary_id: Uuid) -> Result<(), VerifyError> {
        let status = self.status_repo.find(beneficiary_id).await?;
        gates::identity_cleared(status.as_ref())?;
        Ok(())
    }

    pub async fn request_upgrade(
        &self,
        beneficiary_id: Uuid,
        payload: UpgradePayload,
        actor_id: Uuid,
    ) -> Result<UpgradeRequest, VerifyError> {
        if payload.upgrade_reason.trim().is_empty()
            || payload.upgrade_product_type.trim().is_empty()
        {
            return Err(VerifyError::InvalidFormat(
                "upgrade reason and product type are required".into(),
            ));
        }

        self.beneficiary_repo.get_by_id(beneficiary_id).await?;
        self.issued(beneficiary_id).await?;
        self.identity_cleared(beneficiary_id).await?;

        match self.upgrade_repo.find(beneficiary_id).await? {
            Some(existing) if existing.status == UpgradeStatus::Requested => {
                return Err(VerifyError::UpgradeExists("requested"));
            }
            Some(existing) if existing.is_accepted() => {
                return Err(VerifyError::UpgradeExists("accepted"));
            }
            _ => {}
        }

        let request = self
            .upgrade_repo
            .submit(CreateUpgradeRequest {
                beneficiary_id,
                upgrade_reason: payload.upgrade_reason.trim().to_string(),
                upgrade_product_type: payload.upgrade_product_type.trim().to_string(),
                upgrade_product_info: payload.upgrade_product_info,
                cost_of_upgrade: payload.cost_of_upgrade,
                scheduled_at: payload.scheduled_at,
                requested_by: actor_id,
            })
            .await?;
        info!(%beneficiary_id, %actor_id, "upgrade requested");
        Ok(request)
    }

    /// Re-check a beneficiary at the counter before swapping units.
    pub async fn verify_for_upgrade(
        &self,
        check: UpgradeCheck,
        store_id: Uuid,
    ) -> Result<UpgradeEligibility, VerifyError> {
        let beneficiary = match self
            .beneficiary_repo
            .get_by_voucher_code(check.voucher_code.trim())
            .await
        {
            Ok(b) => b,
            Err(LapdistError::NotFound { .. }) => return Err(VerifyError::VoucherNotFound),
            Err(e) => return Err(e.into()),
        };
        if !beneficiary.is_candidate_verified {
            return Err(VerifyError::NotApproved);
        }
        if beneficiary.store_id != Some(store_id) {
            return Err(VerifyError::WrongStore);
        }

        self.identity_cleared(beneficiary.id).await?;
        let issued = self.issued(beneficiary.id).await?;
        let current = issued.issued_laptop_serial.unwrap_or_default();
        if current != check.existing_laptop_serial.trim() {
            return Err(VerifyError::SerialMismatch);
        }

        Ok(UpgradeEligibility {
            beneficiary: BeneficiarySummary::from(&beneficiary),
            current_laptop_serial: current,
            upgrade_request: self.upgrade_repo.find(beneficiary.id).await?,
        })
    }

    /// Accept a pending request and swap in the new unit.
    pub async fn confirm_upgrade(
        &self,
        beneficiary_id: Uuid,
        new_laptop_serial: &str,
        actor_id: Uuid,
    ) -> Result<UpgradeRequest, VerifyError> {
        let new_laptop_serial = new_laptop_serial.trim();
        if new_laptop_serial.is_empty() {
            return Err(VerifyError::InvalidFormat("laptop serial is empty".into()));
        }

        let pending = self
            .upgrade_repo
            .find(beneficiary_id)
            .await?
            .filter(|r| r.status == UpgradeStatus::Requested)
            .ok_or(VerifyError::UpgradeNotPending)?;
        self.identity_cleared(beneficiary_id).await?;
        self.issued(beneficiary_id).await?;

        let accepted = self
            .upgrade_repo
            .accept(pending.beneficiary_id, new_laptop_serial.to_string(), actor_id)
            .await
            .map_err(|e| match e {
                LapdistError::AlreadyExists { entity } if entity == "upgrade_request" => {
                    VerifyError::UpgradeNotPending
                }
                LapdistError::NotFound { entity, .. } if entity == "issued_status" => {
                    VerifyError::NotYetIssued
                }
                LapdistError::AlreadyExists { .. } => VerifyError::DuplicateSerial,
                other => other.into(),
            })?;
        info!(%beneficiary_id, new_laptop_serial, %actor_id, "upgrade accepted");
        Ok(accepted)
    }

    pub async fn close_upgrade_request(
        &self,
        beneficiary_id: Uuid,
    ) -> Result<UpgradeRequest, VerifyError> {
        let cancelled = self
            .upgrade_repo
            .cancel(beneficiary_id)
            .await
            .map_err(|e| match e {
                LapdistError::Validation { .. } | LapdistError::NotFound { .. } => {
                    VerifyError::UpgradeNotPending
                }
                other => other.into(),
            })?;
        info!(%beneficiary_id, "upgrade request closed");
        Ok(cancelled)
    }
}
