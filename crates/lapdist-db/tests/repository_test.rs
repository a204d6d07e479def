//! Integration tests for the repositories using in-memory SurrealDB.

use chrono::{Duration, Utc};
use lapdist_core::error::LapdistError;
use lapdist_core::models::beneficiary::{CreateBeneficiary, UpdateBeneficiary};
use lapdist_core::models::issuance::{EvidenceKind, IssuanceEvidence, RecordIssuance};
use lapdist_core::models::otp::CreateOtp;
use lapdist_core::models::upgrade::{CreateUpgradeRequest, UpgradeStatus};
use lapdist_core::models::verification::{RecordOverride, RecordVerification};
use lapdist_core::repository::{
    BeneficiaryRepository, IssuedStatusRepository, OtpRepository, UpgradeRequestRepository,
    VerificationStatusRepository,
};
use lapdist_db::repository::{
    SurrealBeneficiaryRepository, SurrealIssuedStatusRepository, SurrealOtpRepository,
    SurrealUpgradeRequestRepository, SurrealVerificationStatusRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    lapdist_db::DbManager::attach(db).await.unwrap().client().clone()
}

fn beneficiary(mobile: &str, coupon: Option<&str>, gift: Option<&str>) -> CreateBeneficiary {
    CreateBeneficiary {
        full_name: format!("Beneficiary {mobile}"),
        mobile_number: mobile.into(),
        email: None,
        coupon_code: coupon.map(Into::into),
        gift_card_code: gift.map(Into::into),
        aadhar_number_hashed: "$argon2id$placeholder".into(),
        aadhar_number_masked: "XXXX XXXX 1234".into(),
        photo: Some("candidates/ref.jpg".into()),
        store_id: Some(Uuid::new_v4()),
        vendor_spoc_id: None,
    }
}

fn checks(beneficiary_id: Uuid, aadhar: bool, facial: bool) -> RecordVerification {
    RecordVerification {
        beneficiary_id,
        is_coupon_verified: true,
        is_aadhar_verified: aadhar,
        is_facial_verified: facial,
        uploaded_candidate_photo: "verification/photo.jpg".into(),
        entered_aadhar_number: "XXXX XXXX 1234".into(),
    }
}

// -----------------------------------------------------------------------
// Beneficiary
// -----------------------------------------------------------------------

#[tokio::test]
async fn create_and_resolve_by_either_voucher_key() {
    let db = setup().await;
    let repo = SurrealBeneficiaryRepository::new(db);

    let created = repo
        .create(beneficiary("9000000001", Some("ABC123"), Some("GIFT-9")))
        .await
        .unwrap();
    assert!(!created.is_candidate_verified);

    let by_coupon = repo.get_by_voucher_code("ABC123").await.unwrap();
    assert_eq!(by_coupon.id, created.id);

    let by_gift = repo.get_by_voucher_code("GIFT-9").await.unwrap();
    assert_eq!(by_gift.id, created.id);

    let fetched = repo.get_by_id(created.id).await.unwrap();
    assert_eq!(fetched.store_id, created.store_id);
}

#[tokio::test]
async fn unknown_voucher_is_not_found() {
    let db = setup().await;
    let repo = SurrealBeneficiaryRepository::new(db);

    let err = repo.get_by_voucher_code("NOPE").await.unwrap_err();
    assert!(matches!(err, LapdistError::NotFound { .. }));
}

#[tokio::test]
async fn duplicate_voucher_code_rejected() {
    let db = setup().await;
    let repo = SurrealBeneficiaryRepository::new(db);

    repo.create(beneficiary("9000000001", Some("ABC123"), None))
        .await
        .unwrap();
    let err = repo
        .create(beneficiary("9000000002", None, Some("ABC123")))
        .await
        .unwrap_err();
    assert!(matches!(err, LapdistError::AlreadyExists { .. }));
}

#[tokio::test]
async fn concurrent_registrations_cannot_share_a_voucher_code() {
    let db = setup().await;
    let repo = SurrealBeneficiaryRepository::new(db);

    let (left, right) = tokio::join!(
        repo.create(beneficiary("9000000001", Some("SHARED-1"), None)),
        repo.create(beneficiary("9000000002", None, Some("SHARED-1"))),
    );
    let winner = match (left, right) {
        (Ok(created), Err(err)) | (Err(err), Ok(created)) => {
            assert!(
                matches!(&err, LapdistError::AlreadyExists { entity } if entity == "voucher_code"),
                "unexpected error: {err:?}"
            );
            created
        }
        other => panic!("expected exactly one registration, got {other:?}"),
    };

    assert_eq!(repo.get_by_voucher_code("SHARED-1").await.unwrap().id, winner.id);
}

#[tokio::test]
async fn one_beneficiary_cannot_reuse_its_coupon_as_gift_card() {
    let db = setup().await;
    let repo = SurrealBeneficiaryRepository::new(db);

    let err = repo
        .create(beneficiary("9000000001", Some("SAME-1"), Some("SAME-1")))
        .await
        .unwrap_err();
    assert!(matches!(err, LapdistError::AlreadyExists { entity } if entity == "voucher_code"));
    // Nothing from the aborted registration is left behind.
    assert!(matches!(
        repo.get_by_voucher_code("SAME-1").await,
        Err(LapdistError::NotFound { .. })
    ));
    repo.create(beneficiary("9000000001", Some("SAME-1"), None))
        .await
        .unwrap();
}

#[tokio::test]
async fn duplicate_mobile_is_a_beneficiary_conflict() {
    let db = setup().await;
    let repo = SurrealBeneficiaryRepository::new(db);

    repo.create(beneficiary("9000000001", Some("MOB-1"), None))
        .await
        .unwrap();
    let err = repo
        .create(beneficiary("9000000001", Some("MOB-2"), None))
        .await
        .unwrap_err();
    assert!(matches!(err, LapdistError::AlreadyExists { entity } if entity == "beneficiary"));
    assert!(matches!(
        repo.get_by_voucher_code("MOB-2").await,
        Err(LapdistError::NotFound { .. })
    ));
}

#[tokio::test]
async fn approval_flag_is_updated() {
    let db = setup().await;
    let repo = SurrealBeneficiaryRepository::new(db);
    let created = repo
        .create(beneficiary("9000000001", Some("ABC123"), None))
        .await
        .unwrap();

    let updated = repo
        .update(
            created.id,
            UpdateBeneficiary {
                is_candidate_verified: Some(true),
                photo: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(updated.is_candidate_verified);
    assert!(updated.photo.is_none());
}

// -----------------------------------------------------------------------
// Verification status
// -----------------------------------------------------------------------

#[tokio::test]
async fn verification_row_is_overwritten_in_place() {
    let db = setup().await;
    let repo = SurrealVerificationStatusRepository::new(db);
    let id = Uuid::new_v4();

    assert!(repo.find(id).await.unwrap().is_none());

    let first = repo.record_checks(checks(id, false, false)).await.unwrap();
    assert!(!first.is_aadhar_verified);

    let second = repo.record_checks(checks(id, true, true)).await.unwrap();
    assert!(second.is_all_verified());
    assert_eq!(second.created_at, first.created_at);
}

#[tokio::test]
async fn otp_flag_guarded_by_identity_checks() {
    let db = setup().await;
    let repo = SurrealVerificationStatusRepository::new(db);
    let id = Uuid::new_v4();

    repo.record_checks(checks(id, true, false)).await.unwrap();
    let err = repo.mark_otp_verified(id).await.unwrap_err();
    assert!(matches!(err, LapdistError::Validation { .. }));

    let overridden = repo
        .record_override(
            id,
            RecordOverride {
                overriding_user: Uuid::new_v4(),
                overriding_reason: "face mismatch due to lighting".into(),
            },
        )
        .await
        .unwrap();
    assert!(overridden.is_overridden());

    let status = repo.mark_otp_verified(id).await.unwrap();
    assert!(status.is_otp_verified);
    assert!(status.otp_verified_at.is_some());
}

#[tokio::test]
async fn override_without_row_is_not_found() {
    let db = setup().await;
    let repo = SurrealVerificationStatusRepository::new(db);

    let err = repo
        .record_override(
            Uuid::new_v4(),
            RecordOverride {
                overriding_user: Uuid::new_v4(),
                overriding_reason: "reason".into(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LapdistError::NotFound { .. }));
}

// -----------------------------------------------------------------------
// Issued status
// -----------------------------------------------------------------------

fn evidence() -> IssuanceEvidence {
    IssuanceEvidence {
        evidence_photo: "issuance/laptop.jpg".into(),
        bill_receipt: "issuance/bill.jpg".into(),
        store_employee_photo: "issuance/employee.jpg".into(),
        store_employee_name: "Ravi".into(),
        store_employee_mobile: "9811111111".into(),
    }
}

#[tokio::test]
async fn serial_cannot_be_issued_twice() {
    let db = setup().await;
    let repo = SurrealIssuedStatusRepository::new(db);
    let (x, y) = (Uuid::new_v4(), Uuid::new_v4());
    let actor = Uuid::new_v4();

    let issued = repo
        .record_issuance(RecordIssuance {
            beneficiary_id: x,
            laptop_serial: "SN-777".into(),
            issued_by: actor,
            evidence: Some(evidence()),
        })
        .await
        .unwrap();
    assert!(issued.is_issued());
    assert_eq!(issued.issued_laptop_serial.as_deref(), Some("SN-777"));

    let err = repo
        .record_issuance(RecordIssuance {
            beneficiary_id: y,
            laptop_serial: "SN-777".into(),
            issued_by: actor,
            evidence: Some(evidence()),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LapdistError::AlreadyExists { .. }));

    // The losing beneficiary must not have been marked as issued.
    assert!(repo.find(y).await.unwrap().is_none());
    assert_eq!(repo.serial_owner("SN-777").await.unwrap(), Some(x));
}

#[tokio::test]
async fn issued_beneficiary_cannot_claim_second_serial() {
    let db = setup().await;
    let repo = SurrealIssuedStatusRepository::new(db);
    let id = Uuid::new_v4();
    let actor = Uuid::new_v4();

    repo.record_issuance(RecordIssuance {
        beneficiary_id: id,
        laptop_serial: "SN-100".into(),
        issued_by: actor,
        evidence: Some(evidence()),
    })
    .await
    .unwrap();

    let err = repo
        .record_issuance(RecordIssuance {
            beneficiary_id: id,
            laptop_serial: "SN-101".into(),
            issued_by: actor,
            evidence: Some(evidence()),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LapdistError::AlreadyExists { ref entity } if entity == "issued_status"));

    // The second serial was rolled back with the transaction.
    assert!(repo.serial_owner("SN-101").await.unwrap().is_none());
    let row = repo.find(id).await.unwrap().unwrap();
    assert_eq!(row.issued_laptop_serial.as_deref(), Some("SN-100"));
}

#[tokio::test]
async fn evidence_upload_creates_not_issued_row() {
    let db = setup().await;
    let repo = SurrealIssuedStatusRepository::new(db);
    let id = Uuid::new_v4();
    let actor = Uuid::new_v4();

    let row = repo
        .attach_evidence(id, EvidenceKind::BillReceipt, "issuance/bill.jpg".into(), actor)
        .await
        .unwrap();
    assert!(!row.is_issued());
    assert_eq!(row.bill_receipt.as_deref(), Some("issuance/bill.jpg"));
    assert!(row.issued_laptop_serial.is_none());
}

#[tokio::test]
async fn latest_issuer_returns_most_recent_employee() {
    let db = setup().await;
    let repo = SurrealIssuedStatusRepository::new(db);
    let actor = Uuid::new_v4();

    assert!(repo.latest_issuer(actor).await.unwrap().is_none());

    repo.record_issuance(RecordIssuance {
        beneficiary_id: Uuid::new_v4(),
        laptop_serial: "SN-1".into(),
        issued_by: actor,
        evidence: Some(evidence()),
    })
    .await
    .unwrap();

    let latest = repo.latest_issuer(actor).await.unwrap().unwrap();
    assert_eq!(latest.store_employee_name.as_deref(), Some("Ravi"));
    assert_eq!(
        latest.store_employee_photo.as_deref(),
        Some("issuance/employee.jpg")
    );
}

// -----------------------------------------------------------------------
// OTP
// -----------------------------------------------------------------------

#[tokio::test]
async fn one_otp_record_per_beneficiary() {
    let db = setup().await;
    let repo = SurrealOtpRepository::new(db);
    let id = Uuid::new_v4();
    let expires_at = Utc::now() + Duration::minutes(20);

    let otp = repo
        .create(CreateOtp {
            beneficiary_id: id,
            code: "123456".into(),
            expires_at,
        })
        .await
        .unwrap();
    assert_eq!(otp.code, "123456");

    let err = repo
        .create(CreateOtp {
            beneficiary_id: id,
            code: "654321".into(),
            expires_at,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LapdistError::AlreadyExists { .. }));

    repo.delete(id).await.unwrap();
    assert!(repo.find(id).await.unwrap().is_none());
}

// -----------------------------------------------------------------------
// Upgrade requests
// -----------------------------------------------------------------------

fn upgrade(beneficiary_id: Uuid) -> CreateUpgradeRequest {
    CreateUpgradeRequest {
        beneficiary_id,
        upgrade_reason: "needs more memory".into(),
        upgrade_product_type: "16GB model".into(),
        upgrade_product_info: None,
        cost_of_upgrade: 4500,
        scheduled_at: None,
        requested_by: Uuid::new_v4(),
    }
}

#[tokio::test]
async fn accept_swaps_serial_and_flags_upgrade() {
    let db = setup().await;
    let issued = SurrealIssuedStatusRepository::new(db.clone());
    let upgrades = SurrealUpgradeRequestRepository::new(db);
    let id = Uuid::new_v4();
    let actor = Uuid::new_v4();

    issued
        .record_issuance(RecordIssuance {
            beneficiary_id: id,
            laptop_serial: "SN-OLD".into(),
            issued_by: actor,
            evidence: Some(evidence()),
        })
        .await
        .unwrap();

    let submitted = upgrades.submit(upgrade(id)).await.unwrap();
    assert_eq!(submitted.status, UpgradeStatus::Requested);

    let accepted = upgrades.accept(id, "SN-NEW".into(), actor).await.unwrap();
    assert!(accepted.is_accepted());
    assert_eq!(accepted.new_laptop_serial.as_deref(), Some("SN-NEW"));

    let row = issued.find(id).await.unwrap().unwrap();
    assert!(row.is_requested_to_upgrade);
    assert_eq!(row.issued_laptop_serial.as_deref(), Some("SN-NEW"));
    // The original serial stays claimed.
    assert_eq!(issued.serial_owner("SN-OLD").await.unwrap(), Some(id));
}

#[tokio::test]
async fn accepted_request_cannot_be_cancelled() {
    let db = setup().await;
    let upgrades = SurrealUpgradeRequestRepository::new(db);
    let id = Uuid::new_v4();

    upgrades.submit(upgrade(id)).await.unwrap();
    let cancelled = upgrades.cancel(id).await.unwrap();
    assert_eq!(cancelled.status, UpgradeStatus::Cancelled);

    let err = upgrades.cancel(id).await.unwrap_err();
    assert!(matches!(err, LapdistError::Validation { .. }));
}

#[tokio::test]
async fn accept_rechecks_request_and_issuance_in_transaction() {
    let db = setup().await;
    let issued = SurrealIssuedStatusRepository::new(db.clone());
    let upgrades = SurrealUpgradeRequestRepository::new(db);
    let id = Uuid::new_v4();
    let actor = Uuid::new_v4();

    // Requested, but nothing issued yet.
    upgrades.submit(upgrade(id)).await.unwrap();
    let err = upgrades.accept(id, "SN-EARLY".into(), actor).await.unwrap_err();
    assert!(matches!(err, LapdistError::NotFound { entity, .. } if entity == "issued_status"));
    assert_eq!(issued.serial_owner("SN-EARLY").await.unwrap(), None);

    issued
        .record_issuance(RecordIssuance {
            beneficiary_id: id,
            laptop_serial: "SN-FIRST".into(),
            issued_by: actor,
            evidence: Some(evidence()),
        })
        .await
        .unwrap();
    upgrades.cancel(id).await.unwrap();

    // Cancelled requests never claim a serial.
    let err = upgrades.accept(id, "SN-LATE".into(), actor).await.unwrap_err();
    assert!(matches!(err, LapdistError::AlreadyExists { entity } if entity == "upgrade_request"));
    assert_eq!(issued.serial_owner("SN-LATE").await.unwrap(), None);
    let row = issued.find(id).await.unwrap().unwrap();
    assert_eq!(row.issued_laptop_serial.as_deref(), Some("SN-FIRST"));
    assert!(!row.is_requested_to_upgrade);
}
