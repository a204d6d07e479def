//! Shared fixtures: in-memory SurrealDB, stub collaborators, and a
//! fully wired set of services.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use lapdist_core::error::{LapdistError, LapdistResult};
use lapdist_core::models::beneficiary::{Beneficiary, CreateBeneficiary};
use lapdist_core::models::issuance::IssuanceEvidence;
use lapdist_core::notify::{DeliveryChannel, DeliveryReport, OtpSender};
use lapdist_core::repository::{BeneficiaryRepository, OtpRepository};
use lapdist_core::storage::FileStore;
use lapdist_db::DbManager;
use lapdist_db::repository::{
    SurrealBeneficiaryRepository, SurrealIssuedStatusRepository, SurrealOtpRepository,
    SurrealUpgradeRequestRepository, SurrealVerificationStatusRepository,
};
use lapdist_verify::engine::ConsolidateRequest;
use lapdist_verify::face::{FaceEngine, FaceEngineError, FaceMatcher};
use lapdist_verify::identity::mask_id;
use lapdist_verify::{
    IssuanceLedger, IssuanceService, OtpGate, OtpIssuer, UpgradeWorkflow, VerificationConfig,
    VerificationService,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

pub const ID_NUMBER: &str = "123456789012";
pub const REFERENCE_FACE: &[u8] = b"face-A";

/// In-memory file store.
#[derive(Clone, Default)]
pub struct MemoryFiles {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryFiles {
    pub fn contains(&self, reference: &str) -> bool {
        self.files.lock().unwrap().contains_key(reference)
    }

    pub fn paths_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut paths: Vec<String> = self
            .files
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        paths.sort();
        paths
    }
}

impl FileStore for MemoryFiles {
    async fn save(&self, bytes: Vec<u8>, path: String) -> LapdistResult<String> {
        self.files.lock().unwrap().insert(path.clone(), bytes);
        Ok(path)
    }

    async fn read(&self, reference: &str) -> LapdistResult<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .ok_or_else(|| LapdistError::NotFound {
                entity: "file".into(),
                id: reference.into(),
            })
    }

    async fn delete(&self, reference: &str) -> LapdistResult<()> {
        self.files.lock().unwrap().remove(reference);
        Ok(())
    }

    async fn exists(&self, reference: &str) -> LapdistResult<bool> {
        Ok(self.contains(reference))
    }
}

/// Matches when the bytes are equal. `no-face` has no face; a
/// `spoof:` prefix fails liveness but is ignored for matching.
pub struct StubFace;

impl FaceEngine for StubFace {
    fn compare(&self, candidate: &[u8], reference: &[u8]) -> Result<bool, FaceEngineError> {
        if candidate == b"no-face" {
            return Err(FaceEngineError::NoFaceDetected);
        }
        if candidate == b"corrupt" {
            return Err(FaceEngineError::Inference("cannot decode image".into()));
        }
        let candidate = candidate.strip_prefix(b"spoof:").unwrap_or(candidate);
        Ok(candidate == reference)
    }

    fn is_live(&self, image: &[u8]) -> Result<bool, FaceEngineError> {
        Ok(!image.starts_with(b"spoof:"))
    }
}

#[derive(Debug, Clone)]
pub struct Sent {
    pub channel: DeliveryChannel,
    pub destination: String,
    pub message: String,
}

#[derive(Clone, Default)]
pub struct RecordingSender {
    pub sent: Arc<Mutex<Vec<Sent>>>,
    pub failing: Arc<AtomicBool>,
}

impl RecordingSender {
    pub fn messages(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl OtpSender for RecordingSender {
    async fn send(
        &self,
        channel: DeliveryChannel,
        destination: &str,
        message: &str,
    ) -> LapdistResult<DeliveryReport> {
        if self.failing.load(Ordering::SeqCst) {
            return Ok(DeliveryReport {
                delivered: false,
                provider_status: "503 gateway unavailable".into(),
            });
        }
        self.sent.lock().unwrap().push(Sent {
            channel,
            destination: destination.into(),
            message: message.into(),
        });
        Ok(DeliveryReport {
            delivered: true,
            provider_status: "202 Accepted".into(),
        })
    }
}

pub type Beneficiaries = SurrealBeneficiaryRepository<Db>;
pub type Statuses = SurrealVerificationStatusRepository<Db>;
pub type Issued = SurrealIssuedStatusRepository<Db>;

pub struct Harness {
    pub db: Surreal<Db>,
    pub store_id: Uuid,
    pub actor_id: Uuid,
    pub files: MemoryFiles,
    pub sender: RecordingSender,
    pub beneficiaries: Beneficiaries,
    pub otp_repo: SurrealOtpRepository<Db>,
    pub verification: VerificationService<Beneficiaries, Statuses, Issued, MemoryFiles, StubFace>,
    pub otp: OtpGate<Beneficiaries, Statuses, SurrealOtpRepository<Db>, RecordingSender>,
    pub issuance: IssuanceService<Beneficiaries, Statuses, Issued, MemoryFiles>,
    pub upgrades:
        UpgradeWorkflow<Beneficiaries, Statuses, Issued, SurrealUpgradeRequestRepository<Db>>,
}

pub fn test_config() -> VerificationConfig {
    VerificationConfig {
        id_hash_memory_kib: 1024,
        id_hash_iterations: 1,
        admin_email: "admin@lapdist.test".into(),
        ..Default::default()
    }
}

pub async fn harness() -> Harness {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    let manager = DbManager::attach(db).await.unwrap();

    let config = test_config();
    let files = MemoryFiles::default();
    let sender = RecordingSender::default();

    let verification = VerificationService::new(
        manager.beneficiaries(),
        manager.verification_statuses(),
        manager.issued_statuses(),
        files.clone(),
        FaceMatcher::new(|| Ok(StubFace), &config),
        config.clone(),
    )
    .unwrap();
    let otp = OtpGate::new(
        manager.beneficiaries(),
        manager.verification_statuses(),
        OtpIssuer::new(manager.otps(), sender.clone(), &config),
        config.admin_email.clone(),
    );
    let issuance = IssuanceService::new(
        manager.beneficiaries(),
        manager.verification_statuses(),
        IssuanceLedger::new(manager.issued_statuses(), files.clone()),
    );
    let upgrades = UpgradeWorkflow::new(
        manager.beneficiaries(),
        manager.verification_statuses(),
        manager.issued_statuses(),
        manager.upgrade_requests(),
    );

    Harness {
        store_id: Uuid::new_v4(),
        actor_id: Uuid::new_v4(),
        files,
        sender,
        beneficiaries: manager.beneficiaries(),
        otp_repo: manager.otps(),
        verification,
        otp,
        issuance,
        upgrades,
        db: manager.client().clone(),
    }
}

fn unique_mobile() -> String {
    format!("9{:09}", Uuid::new_v4().as_u128() % 1_000_000_000)
}

impl Harness {
    /// Register an approved beneficiary allotted to this harness's store,
    /// with [`REFERENCE_FACE`] as the registered photo.
    pub async fn enrol(&self, coupon_code: &str) -> Beneficiary {
        self.enrol_with_codes(Some(coupon_code), None).await
    }

    pub async fn enrol_with_codes(
        &self,
        coupon_code: Option<&str>,
        gift_card_code: Option<&str>,
    ) -> Beneficiary {
        let mobile = unique_mobile();
        let photo = self
            .files
            .save(REFERENCE_FACE.to_vec(), format!("candidates/{mobile}.jpg"))
            .await
            .unwrap();
        let beneficiary = self
            .beneficiaries
            .create(CreateBeneficiary {
                full_name: format!("Beneficiary {mobile}"),
                mobile_number: mobile,
                email: None,
                coupon_code: coupon_code.map(Into::into),
                gift_card_code: gift_card_code.map(Into::into),
                aadhar_number_hashed: self.verification.hasher().hash_id(ID_NUMBER).unwrap(),
                aadhar_number_masked: mask_id(ID_NUMBER, 4).unwrap(),
                photo: Some(photo),
                store_id: Some(self.store_id),
                vendor_spoc_id: None,
            })
            .await
            .unwrap();
        self.beneficiaries
            .update(
                beneficiary.id,
                lapdist_core::models::beneficiary::UpdateBeneficiary {
                    is_candidate_verified: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
    }

    pub fn request(&self, code: &str, photo: &[u8], id_number: &str) -> ConsolidateRequest {
        ConsolidateRequest {
            voucher_code: code.into(),
            photo: photo.to_vec(),
            photo_content_type: "image/jpeg".into(),
            id_number: id_number.into(),
        }
    }

    pub async fn current_otp(&self, beneficiary_id: Uuid) -> String {
        self.otp_repo
            .find(beneficiary_id)
            .await
            .unwrap()
            .expect("an OTP should be stored")
            .code
    }

    /// Enrol, pass every check, and confirm the OTP.
    pub async fn ready_for_issue(&self, coupon_code: &str) -> Beneficiary {
        let beneficiary = self.enrol(coupon_code).await;
        let outcome = self
            .verification
            .consolidate_verification(
                self.request(coupon_code, REFERENCE_FACE, ID_NUMBER),
                self.store_id,
            )
            .await
            .unwrap();
        assert!(outcome.verification_status.is_all_verified);
        self.otp
            .request(beneficiary.id, DeliveryChannel::Sms)
            .await
            .unwrap();
        let code = self.current_otp(beneficiary.id).await;
        self.otp.verify(beneficiary.id, &code).await.unwrap();
        beneficiary
    }
}

pub fn evidence() -> IssuanceEvidence {
    IssuanceEvidence {
        evidence_photo: "issuance/laptop.jpg".into(),
        bill_receipt: "issuance/bill.jpg".into(),
        store_employee_photo: "issuance/employee.jpg".into(),
        store_employee_name: "Ravi".into(),
        store_employee_mobile: "9000000001".into(),
    }
}
