//! Issuance ledger: who received which unit, and the evidence for it.
//!
//! The ledger trusts its caller to have checked verification gates;
//! see [`crate::issuance::IssuanceService`].

use lapdist_core::error::LapdistError;
use lapdist_core::models::issuance::{
    EvidenceKind, IssuanceEvidence, IssuedStatus, LatestIssuer, RecordIssuance,
};
use lapdist_core::repository::IssuedStatusRepository;
use lapdist_core::storage::FileStore;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::VerifyError;
use crate::files::{content_path, image_extension};

fn evidence_slug(kind: EvidenceKind) -> &'static str {
    match kind {
        EvidenceKind::LaptopPhoto => "laptop",
        EvidenceKind::BillReceipt => "bill",
        EvidenceKind::EmployeePhoto => "employee",
    }
}

fn evidence_ref(status: &IssuedStatus, kind: EvidenceKind) -> Option<&str> {
    match kind {
        EvidenceKind::LaptopPhoto => status.evidence_photo.as_deref(),
        EvidenceKind::BillReceipt => status.bill_receipt.as_deref(),
        EvidenceKind::EmployeePhoto => status.store_employee_photo.as_deref(),
    }
}

pub struct IssuanceLedger<I: IssuedStatusRepository, F: FileStore> {
    issued_repo: I,
    files: F,
}

impl<I: IssuedStatusRepository, F: FileStore> IssuanceLedger<I, F> {
    pub fn new(issued_repo: I, files: F) -> Self {
        Self { issued_repo, files }
    }

    /// Record that `laptop_serial` was handed to the beneficiary.
    ///
    /// Without inline `evidence`, the laptop photo and bill receipt must
    /// already have been attached.
    pub async fn issue(
        &self,
        beneficiary_id: Uuid,
        laptop_serial: &str,
        evidence: Option<IssuanceEvidence>,
        actor_id: Uuid,
    ) -> Result<IssuedStatus, VerifyError> {
        let laptop_serial = laptop_serial.trim();
        if laptop_serial.is_empty() {
            return Err(VerifyError::InvalidFormat("laptop serial is empty".into()));
        }

        let existing = self.issued_repo.find(beneficiary_id).await?;
        if existing.as_ref().is_some_and(|s| s.is_issued()) {
            return Err(VerifyError::AlreadyIssued);
        }
        if evidence.is_none() {
            let existing = existing.as_ref();
            if existing.and_then(|s| s.evidence_photo.as_ref()).is_none() {
                return Err(VerifyError::EvidenceMissing("laptop photo"));
            }
            if existing.and_then(|s| s.bill_receipt.as_ref()).is_none() {
                return Err(VerifyError::EvidenceMissing("bill receipt"));
            }
        }

        let status = self
            .issued_repo
            .record_issuance(RecordIssuance {
                beneficiary_id,
                laptop_serial: laptop_serial.to_string(),
                issued_by: actor_id,
                evidence,
            })
            .await
            .map_err(|e| match e {
                LapdistError::AlreadyExists { entity } if entity == "issued_status" => {
                    VerifyError::AlreadyIssued
                }
                LapdistError::AlreadyExists { .. } => VerifyError::DuplicateSerial,
                other => other.into(),
            })?;

        info!(%beneficiary_id, laptop_serial, %actor_id, "laptop issued");
        Ok(status)
    }

    /// Store one piece of evidence ahead of issuance.
    pub async fn attach_evidence(
        &self,
        beneficiary_id: Uuid,
        kind: EvidenceKind,
        bytes: Vec<u8>,
        content_type: &str,
        actor_id: Uuid,
    ) -> Result<IssuedStatus, VerifyError> {
        let extension = image_extension(content_type)?;
        if bytes.is_empty() {
            return Err(VerifyError::InvalidFormat("upload is empty".into()));
        }

        let existing = self.issued_repo.find(beneficiary_id).await?;
        if existing.as_ref().is_some_and(|s| s.is_issued()) {
            return Err(VerifyError::AlreadyIssued);
        }
        let previous = existing
            .as_ref()
            .and_then(|s| evidence_ref(s, kind))
            .map(String::from);

        let path = content_path(
            &format!("issuance/{beneficiary_id}/{}", evidence_slug(kind)),
            &bytes,
            extension,
        );
        let reference = self.files.save(bytes, path).await?;

        let status = match self
            .issued_repo
            .attach_evidence(beneficiary_id, kind, reference.clone(), actor_id)
            .await
        {
            Ok(status) => status,
            Err(e) => {
                if previous.as_deref() != Some(reference.as_str()) {
                    self.discard(&reference).await;
                }
                return Err(e.into());
            }
        };

        if let Some(previous) = previous.filter(|p| *p != reference) {
            self.discard(&previous).await;
        }
        Ok(status)
    }

    async fn discard(&self, reference: &str) {
        if let Err(e) = self.files.delete(reference).await {
            warn!(reference, error = %e, "failed to delete stale evidence");
        }
    }

    pub async fn set_employee_details(
        &self,
        beneficiary_id: Uuid,
        name: &str,
        mobile: &str,
    ) -> Result<IssuedStatus, VerifyError> {
        let (name, mobile) = (name.trim(), mobile.trim());
        if name.is_empty() || mobile.is_empty() {
            return Err(VerifyError::InvalidFormat(
                "employee name and mobile are required".into(),
            ));
        }
        Ok(self
            .issued_repo
            .set_employee_details(beneficiary_id, name.to_string(), mobile.to_string())
            .await?)
    }

    /// Employee details last used by this store user, for pre-filling.
    pub async fn latest_issuer(&self, actor_id: Uuid) -> Result<Option<LatestIssuer>, VerifyError> {
        Ok(self.issued_repo.latest_issuer(actor_id).await?)
    }

    pub async fn details(&self, beneficiary_id: Uuid) -> Result<Option<IssuedStatus>, VerifyError> {
        Ok(self.issued_repo.find(beneficiary_id).await?)
    }
}
