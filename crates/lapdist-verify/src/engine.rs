//! Verification state engine: the consolidated counter check and the
//! manual override.

use std::fmt;

use lapdist_core::error::LapdistError;
use lapdist_core::models::beneficiary::BeneficiarySummary;
use lapdist_core::models::verification::{RecordOverride, RecordVerification, VerificationStatus};
use lapdist_core::repository::{
    BeneficiaryRepository, IssuedStatusRepository, VerificationStatusRepository,
};
use lapdist_core::storage::FileStore;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit;
use crate::config::VerificationConfig;
use crate::error::VerifyError;
use crate::face::{FaceEngine, FaceMatchError, FaceMatcher};
use crate::files::{content_path, image_extension};
use crate::gates;
use crate::identity::IdentityHasher;

/// Input captured at the counter.
pub struct ConsolidateRequest {
    /// Voucher code or gift-card code.
    pub voucher_code: String,
    pub photo: Vec<u8>,
    pub photo_content_type: String,
    pub id_number: String,
}

impl fmt::Debug for ConsolidateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsolidateRequest")
            .field("voucher_code", &self.voucher_code)
            .field("photo_len", &self.photo.len())
            .field("photo_content_type", &self.photo_content_type)
            .field("id_number", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationFlags {
    pub is_all_verified: bool,
    pub is_coupon_verified: bool,
    pub is_aadhar_verified: bool,
    pub is_facial_verified: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    pub message: String,
    pub verification_status: VerificationFlags,
    pub beneficiary: BeneficiarySummary,
    pub failed_verifications: Vec<&'static str>,
    /// Identity checks failed; an override with consent is needed.
    pub requires_consent: bool,
    pub is_already_issued: bool,
    /// Non-blocking notes, e.g. a failed liveness check.
    pub advisories: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverrideOutcome {
    pub can_proceed_to_otp: bool,
    pub status: VerificationStatus,
}

pub struct VerificationService<B, V, I, F, E>
where
    B: BeneficiaryRepository,
    V: VerificationStatusRepository,
    I: IssuedStatusRepository,
    F: FileStore,
    E: FaceEngine,
{
    beneficiary_repo: B,
    status_repo: V,
    issued_repo: I,
    files: F,
    face: FaceMatcher<E>,
    hasher: IdentityHasher,
    config: VerificationConfig,
}

impl<B, V, I, F, E> VerificationService<B, V, I, F, E>
where
    B: BeneficiaryRepository,
    V: VerificationStatusRepository,
    I: IssuedStatusRepository,
    F: FileStore,
    E: FaceEngine,
{
    pub fn new(
        beneficiary_repo: B,
        status_repo: V,
        issued_repo: I,
        files: F,
        face: FaceMatcher<E>,
        config: VerificationConfig,
    ) -> Result<Self, VerifyError> {
        Ok(Self {
            beneficiary_repo,
            status_repo,
            issued_repo,
            files,
            face,
            hasher: IdentityHasher::new(&config)?,
            config,
        })
    }

    pub fn hasher(&self) -> &IdentityHasher {
        &self.hasher
    }

    /// Run every counter check for one beneficiary and persist the
    /// outcome in a single write.
    ///
    /// Structural failures (unknown code, not approved, wrong store,
    /// no registered photo, no face) abort with an error. Identity
    /// mismatches are reported in the outcome and leave the beneficiary
    /// eligible for an override.
    pub async fn consolidate_verification(
        &self,
        request: ConsolidateRequest,
        store_id: Uuid,
    ) -> Result<VerificationOutcome, VerifyError> {
        let extension = image_extension(&request.photo_content_type)?;
        if request.photo.is_empty() {
            return Err(VerifyError::InvalidFormat("photo is empty".into()));
        }

        // 1. Resolve the voucher.
        let beneficiary = match self
            .beneficiary_repo
            .get_by_voucher_code(request.voucher_code.trim())
            .await
        {
            Ok(b) => b,
            Err(LapdistError::NotFound { .. }) => return Err(VerifyError::VoucherNotFound),
            Err(e) => return Err(e.into()),
        };
        let beneficiary_id = beneficiary.id;

        // 2. Approval and store allotment.
        if !beneficiary.is_candidate_verified {
            return Err(VerifyError::NotApproved);
        }
        if beneficiary.store_id != Some(store_id) {
            warn!(%beneficiary_id, %store_id, "verification attempted at wrong store");
            return Err(VerifyError::WrongStore);
        }

        // 3. Already issued: nothing more to check.
        let issued = self.issued_repo.find(beneficiary_id).await?;
        if issued.as_ref().is_some_and(|s| s.is_issued()) {
            info!(%beneficiary_id, "verification skipped, laptop already issued");
            return Ok(VerificationOutcome {
                message: "Beneficiary has already received the laptop.".into(),
                verification_status: VerificationFlags::default(),
                beneficiary: BeneficiarySummary::from(&beneficiary),
                failed_verifications: Vec::new(),
                requires_consent: false,
                is_already_issued: true,
                advisories: Vec::new(),
            });
        }

        // 4. ID number against the stored hash.
        let aadhar_ok = self
            .hasher
            .verify_id(&request.id_number, &beneficiary.aadhar_number_hashed);

        // 5. Face against the registered photo.
        let reference_ref = beneficiary
            .photo
            .as_deref()
            .ok_or(VerifyError::PhotoNotRegistered)?;
        let reference = match self.files.read(reference_ref).await {
            Ok(bytes) => bytes,
            Err(LapdistError::NotFound { .. }) => return Err(VerifyError::PhotoNotRegistered),
            Err(e) => return Err(e.into()),
        };

        let mut advisories = Vec::new();
        if self.config.liveness_check && !self.face.is_live(request.photo.clone()).await {
            advisories.push("Liveness check did not pass for the uploaded photo.".to_string());
        }

        let facial_ok = match self.face.verify(request.photo.clone(), reference).await {
            Ok(matched) => matched,
            Err(FaceMatchError::NoFaceDetected) => return Err(VerifyError::NoFaceDetected),
            Err(e) => {
                warn!(%beneficiary_id, error = %e, "face match could not complete");
                advisories.push(format!("Facial verification could not be completed: {e}"));
                false
            }
        };

        // 6. Store the counter photo, then write the outcome.
        let path = content_path(
            &format!("verification/{beneficiary_id}"),
            &request.photo,
            extension,
        );
        let previous_photo = self
            .status_repo
            .find(beneficiary_id)
            .await?
            .and_then(|s| s.uploaded_candidate_photo);
        let new_photo = self.files.save(request.photo, path).await?;

        let entered = audit::seal_entered_id(
            self.config.audit_encryption_key.as_ref(),
            &request.id_number,
            self.config.mask_visible_digits,
        )?;
        let record = RecordVerification {
            beneficiary_id,
            is_coupon_verified: true,
            is_aadhar_verified: aadhar_ok,
            is_facial_verified: facial_ok,
            uploaded_candidate_photo: new_photo.clone(),
            entered_aadhar_number: entered,
        };
        let status = match self.status_repo.record_checks(record).await {
            Ok(status) => status,
            Err(e) => {
                if previous_photo.as_deref() != Some(new_photo.as_str()) {
                    self.discard(&new_photo).await;
                }
                return Err(e.into());
            }
        };

        if let Some(previous) = previous_photo.filter(|p| *p != new_photo) {
            self.discard(&previous).await;
        }

        // 7. Report.
        let mut failed = Vec::new();
        if !aadhar_ok {
            failed.push("aadhar");
        }
        if !facial_ok {
            failed.push("facial");
        }
        let flags = VerificationFlags {
            is_all_verified: status.is_all_verified(),
            is_coupon_verified: status.is_coupon_verified,
            is_aadhar_verified: status.is_aadhar_verified,
            is_facial_verified: status.is_facial_verified,
        };
        let message = if flags.is_all_verified {
            "All verifications passed. Proceed to OTP.".to_string()
        } else {
            format!(
                "Verification failed for: {}. Override with consent to proceed.",
                failed.join(", ")
            )
        };
        info!(
            %beneficiary_id,
            aadhar = aadhar_ok,
            facial = facial_ok,
            "consolidated verification recorded"
        );

        Ok(VerificationOutcome {
            message,
            verification_status: flags,
            beneficiary: BeneficiarySummary::from(&beneficiary),
            requires_consent: !failed.is_empty(),
            failed_verifications: failed,
            is_already_issued: false,
            advisories,
        })
    }

    async fn discard(&self, reference: &str) {
        if let Err(e) = self.files.delete(reference).await {
            warn!(reference, error = %e, "failed to delete stale photo");
        }
    }

    /// Record human consent to proceed despite failed identity checks.
    pub async fn override_verification(
        &self,
        beneficiary_id: Uuid,
        reason: &str,
        actor_id: Uuid,
    ) -> Result<OverrideOutcome, VerifyError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(VerifyError::ReasonRequired);
        }

        let status = self.status_repo.find(beneficiary_id).await?;
        gates::coupon_verified(status.as_ref())?;

        let status = self
            .status_repo
            .record_override(
                beneficiary_id,
                RecordOverride {
                    overriding_user: actor_id,
                    overriding_reason: reason.to_string(),
                },
            )
            .await?;
        info!(%beneficiary_id, %actor_id, "verification overridden");

        Ok(OverrideOutcome {
            can_proceed_to_otp: status.identity_cleared(),
            status,
        })
    }

    pub async fn status(
        &self,
        beneficiary_id: Uuid,
    ) -> Result<Option<VerificationStatus>, VerifyError> {
        Ok(self.status_repo.find(beneficiary_id).await?)
    }
}
