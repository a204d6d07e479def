//! Issuance gates, evidence handling and serial uniqueness.

mod common;

use common::{ID_NUMBER, Issued, REFERENCE_FACE, evidence, harness};
use lapdist_core::models::issuance::EvidenceKind;
use lapdist_core::repository::IssuedStatusRepository;
use lapdist_verify::{IssueLaptopRequest, VerifyError};
use uuid::Uuid;

fn issue(beneficiary_id: Uuid, serial: &str) -> IssueLaptopRequest {
    IssueLaptopRequest {
        beneficiary_id,
        laptop_serial: serial.into(),
        evidence: Some(evidence()),
    }
}

#[tokio::test]
async fn issued_beneficiary_short_circuits_verification() {
    let h = harness().await;
    let b = h.ready_for_issue("CPN-7001").await;

    let status = h
        .issuance
        .issue_laptop(issue(b.id, "SN-7001"), h.store_id, h.actor_id)
        .await
        .unwrap();
    assert!(status.is_issued());
    assert_eq!(status.issued_laptop_serial.as_deref(), Some("SN-7001"));
    assert_eq!(status.issued_by, Some(h.actor_id));

    let before = h.verification.status(b.id).await.unwrap().unwrap();
    let outcome = h
        .verification
        .consolidate_verification(h.request("CPN-7001", b"face-Z", "000000000000"), h.store_id)
        .await
        .unwrap();
    assert!(outcome.is_already_issued);
    assert!(!outcome.verification_status.is_all_verified);

    // The settled verification record is left untouched.
    let after = h.verification.status(b.id).await.unwrap().unwrap();
    assert_eq!(after.updated_at, before.updated_at);
    assert_eq!(after.uploaded_candidate_photo, before.uploaded_candidate_photo);
    assert!(after.is_otp_verified);
}

#[tokio::test]
async fn second_issuance_is_rejected() {
    let h = harness().await;
    let b = h.ready_for_issue("CPN-7002").await;
    h.issuance
        .issue_laptop(issue(b.id, "SN-001"), h.store_id, h.actor_id)
        .await
        .unwrap();

    assert!(matches!(
        h.issuance
            .ledger()
            .issue(b.id, "SN-7003", Some(evidence()), h.actor_id)
            .await,
        Err(VerifyError::AlreadyIssued)
    ));
    let row = h.issuance.ledger().details(b.id).await.unwrap().unwrap();
    assert_eq!(row.issued_laptop_serial.as_deref(), Some("SN-001"));
}

#[tokio::test]
async fn issuance_requires_every_gate() {
    let h = harness().await;
    let b = h.enrol("CPN-7004").await;

    assert!(matches!(
        h.issuance
            .issue_laptop(issue(b.id, "SN-7004"), h.store_id, h.actor_id)
            .await,
        Err(VerifyError::NotInitiated)
    ));

    h.verification
        .consolidate_verification(h.request("CPN-7004", REFERENCE_FACE, ID_NUMBER), h.store_id)
        .await
        .unwrap();
    assert!(matches!(
        h.issuance
            .issue_laptop(issue(b.id, "SN-7004"), h.store_id, h.actor_id)
            .await,
        Err(VerifyError::OtpNotVerified)
    ));
    assert!(matches!(
        h.issuance
            .issue_laptop(issue(b.id, "SN-7004"), Uuid::new_v4(), h.actor_id)
            .await,
        Err(VerifyError::WrongStore)
    ));
    assert!(h.issuance.ledger().details(b.id).await.unwrap().is_none());
}

#[tokio::test]
async fn serial_belongs_to_one_beneficiary() {
    let h = harness().await;
    let first = h.ready_for_issue("CPN-7005").await;
    let second = h.ready_for_issue("CPN-7006").await;

    h.issuance
        .issue_laptop(issue(first.id, "SN-777"), h.store_id, h.actor_id)
        .await
        .unwrap();
    assert!(matches!(
        h.issuance
            .issue_laptop(issue(second.id, "SN-777"), h.store_id, h.actor_id)
            .await,
        Err(VerifyError::DuplicateSerial)
    ));
    assert!(h.issuance.ledger().details(second.id).await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_issuance_of_one_serial_has_one_winner() {
    let h = harness().await;
    let a = h.ready_for_issue("CPN-7007").await;
    let b = h.ready_for_issue("CPN-7008").await;

    let ledger = h.issuance.ledger();
    let (left, right) = tokio::join!(
        ledger.issue(a.id, "SN-RACE", Some(evidence()), h.actor_id),
        ledger.issue(b.id, "SN-RACE", Some(evidence()), h.actor_id),
    );

    let results = [left, right];
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(VerifyError::DuplicateSerial)))
    );
}

#[tokio::test]
async fn concurrent_issuance_to_one_beneficiary_has_one_winner() {
    let h = harness().await;
    let b = h.ready_for_issue("CPN-7010").await;

    let ledger = h.issuance.ledger();
    let (left, right) = tokio::join!(
        ledger.issue(b.id, "SN-7010-A", Some(evidence()), h.actor_id),
        ledger.issue(b.id, "SN-7010-B", Some(evidence()), h.actor_id),
    );

    let (winner, loser) = match (left, right) {
        (Ok(_), Err(e)) => ("SN-7010-A", e),
        (Err(e), Ok(_)) => ("SN-7010-B", e),
        other => panic!("expected exactly one issuance, got {other:?}"),
    };
    assert!(matches!(loser, VerifyError::AlreadyIssued));

    let row = ledger.details(b.id).await.unwrap().unwrap();
    assert_eq!(row.issued_laptop_serial.as_deref(), Some(winner));

    // The losing serial was rolled back and stays free for someone else.
    let issued = Issued::new(h.db.clone());
    let lost = if winner == "SN-7010-A" { "SN-7010-B" } else { "SN-7010-A" };
    assert_eq!(issued.serial_owner(winner).await.unwrap(), Some(b.id));
    assert_eq!(issued.serial_owner(lost).await.unwrap(), None);
}

#[tokio::test]
async fn issue_without_inline_evidence_needs_uploads() {
    let h = harness().await;
    let b = h.ready_for_issue("CPN-7009").await;
    let request = |serial: &str| IssueLaptopRequest {
        beneficiary_id: b.id,
        laptop_serial: serial.into(),
        evidence: None,
    };

    assert!(matches!(
        h.issuance
            .issue_laptop(request("SN-7009"), h.store_id, h.actor_id)
            .await,
        Err(VerifyError::EvidenceMissing("laptop photo"))
    ));

    let ledger = h.issuance.ledger();
    let row = ledger
        .attach_evidence(b.id, EvidenceKind::LaptopPhoto, b"laptop".to_vec(), "image/png", h.actor_id)
        .await
        .unwrap();
    assert!(!row.is_issued());
    let laptop_ref = row.evidence_photo.unwrap();
    assert!(laptop_ref.starts_with(&format!("issuance/{}/laptop/", b.id)));
    assert!(laptop_ref.ends_with(".png"));

    assert!(matches!(
        h.issuance
            .issue_laptop(request("SN-7009"), h.store_id, h.actor_id)
            .await,
        Err(VerifyError::EvidenceMissing("bill receipt"))
    ));

    ledger
        .attach_evidence(b.id, EvidenceKind::BillReceipt, b"bill".to_vec(), "image/jpeg", h.actor_id)
        .await
        .unwrap();
    let issued = h
        .issuance
        .issue_laptop(request("SN-7009"), h.store_id, h.actor_id)
        .await
        .unwrap();
    assert!(issued.is_issued());
    assert_eq!(issued.evidence_photo.as_deref(), Some(laptop_ref.as_str()));

    assert!(matches!(
        ledger
            .attach_evidence(b.id, EvidenceKind::BillReceipt, b"late".to_vec(), "image/jpeg", h.actor_id)
            .await,
        Err(VerifyError::AlreadyIssued)
    ));
}

#[tokio::test]
async fn replaced_evidence_removes_old_file() {
    let h = harness().await;
    let b = h.enrol("CPN-7010").await;
    let ledger = h.issuance.ledger();

    let first = ledger
        .attach_evidence(b.id, EvidenceKind::EmployeePhoto, b"one".to_vec(), "image/jpeg", h.actor_id)
        .await
        .unwrap()
        .store_employee_photo
        .unwrap();
    let second = ledger
        .attach_evidence(b.id, EvidenceKind::EmployeePhoto, b"two".to_vec(), "image/jpeg", h.actor_id)
        .await
        .unwrap()
        .store_employee_photo
        .unwrap();

    assert_ne!(first, second);
    assert!(!h.files.contains(&first));
    assert!(h.files.contains(&second));
}

#[tokio::test]
async fn employee_details_are_prefilled_from_last_issue() {
    let h = harness().await;
    let b = h.ready_for_issue("CPN-7011").await;
    assert!(h.issuance.ledger().latest_issuer(h.actor_id).await.unwrap().is_none());

    h.issuance
        .issue_laptop(issue(b.id, "SN-7011"), h.store_id, h.actor_id)
        .await
        .unwrap();

    let latest = h
        .issuance
        .ledger()
        .latest_issuer(h.actor_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.store_employee_name.as_deref(), Some("Ravi"));

    let updated = h
        .issuance
        .ledger()
        .set_employee_details(b.id, "Meena", "9000000002")
        .await
        .unwrap();
    assert_eq!(updated.store_employee_name.as_deref(), Some("Meena"));
}
