//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Satellite records are keyed
//! by the owning beneficiary id; `find` methods return `None` when the
//! row has not been created yet.

use uuid::Uuid;

use crate::error::LapdistResult;
use crate::models::{
    beneficiary::{Beneficiary, CreateBeneficiary, UpdateBeneficiary},
    issuance::{EvidenceKind, IssuedStatus, LatestIssuer, RecordIssuance},
    otp::{CreateOtp, Otp},
    upgrade::{CreateUpgradeRequest, UpgradeRequest},
    verification::{RecordOverride, RecordVerification, VerificationStatus},
};

pub trait BeneficiaryRepository: Send + Sync {
    fn create(
        &self,
        input: CreateBeneficiary,
    ) -> impl Future<Output = LapdistResult<Beneficiary>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = LapdistResult<Beneficiary>> + Send;
    /// Resolve by voucher code or gift-card code, whichever matches.
    fn get_by_voucher_code(
        &self,
        code: &str,
    ) -> impl Future<Output = LapdistResult<Beneficiary>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateBeneficiary,
    ) -> impl Future<Output = LapdistResult<Beneficiary>> + Send;
}

pub trait VerificationStatusRepository: Send + Sync {
    fn find(
        &self,
        beneficiary_id: Uuid,
    ) -> impl Future<Output = LapdistResult<Option<VerificationStatus>>> + Send;

    /// Create or overwrite the check outcomes in a single statement.
    fn record_checks(
        &self,
        input: RecordVerification,
    ) -> impl Future<Output = LapdistResult<VerificationStatus>> + Send;

    fn record_override(
        &self,
        beneficiary_id: Uuid,
        input: RecordOverride,
    ) -> impl Future<Output = LapdistResult<VerificationStatus>> + Send;

    /// Set `is_otp_verified`. Rejected with `Validation` unless both
    /// identity checks passed or an override is on record.
    fn mark_otp_verified(
        &self,
        beneficiary_id: Uuid,
    ) -> impl Future<Output = LapdistResult<VerificationStatus>> + Send;
}

pub trait IssuedStatusRepository: Send + Sync {
    fn find(
        &self,
        beneficiary_id: Uuid,
    ) -> impl Future<Output = LapdistResult<Option<IssuedStatus>>> + Send;

    /// Claim the serial and mark the beneficiary as issued atomically.
    ///
    /// Fails with `AlreadyExists { entity: "issued_serial" }` when the
    /// serial already belongs to someone, and with
    /// `AlreadyExists { entity: "issued_status" }` when the beneficiary
    /// was issued in the meantime.
    fn record_issuance(
        &self,
        input: RecordIssuance,
    ) -> impl Future<Output = LapdistResult<IssuedStatus>> + Send;

    /// Store an evidence reference, creating a `not_issued` row if needed.
    fn attach_evidence(
        &self,
        beneficiary_id: Uuid,
        kind: EvidenceKind,
        reference: String,
        actor_id: Uuid,
    ) -> impl Future<Output = LapdistResult<IssuedStatus>> + Send;

    fn set_employee_details(
        &self,
        beneficiary_id: Uuid,
        name: String,
        mobile: String,
    ) -> impl Future<Output = LapdistResult<IssuedStatus>> + Send;

    /// Employee details of the most recent row touched by `actor_id`.
    fn latest_issuer(
        &self,
        actor_id: Uuid,
    ) -> impl Future<Output = LapdistResult<Option<LatestIssuer>>> + Send;

    /// Owner of a serial, if it was ever issued.
    fn serial_owner(
        &self,
        laptop_serial: &str,
    ) -> impl Future<Output = LapdistResult<Option<Uuid>>> + Send;
}

pub trait UpgradeRequestRepository: Send + Sync {
    fn find(
        &self,
        beneficiary_id: Uuid,
    ) -> impl Future<Output = LapdistResult<Option<UpgradeRequest>>> + Send;

    /// Create the request, replacing a previously cancelled one.
    fn submit(
        &self,
        input: CreateUpgradeRequest,
    ) -> impl Future<Output = LapdistResult<UpgradeRequest>> + Send;

    /// Accept the request: claim the new serial, swap it into the issued
    /// status and flag the row as an upgrade, all in one transaction.
    fn accept(
        &self,
        beneficiary_id: Uuid,
        new_laptop_serial: String,
        actor_id: Uuid,
    ) -> impl Future<Output = LapdistResult<UpgradeRequest>> + Send;

    fn cancel(
        &self,
        beneficiary_id: Uuid,
    ) -> impl Future<Output = LapdistResult<UpgradeRequest>> + Send;
}

pub trait OtpRepository: Send + Sync {
    fn find(
        &self,
        beneficiary_id: Uuid,
    ) -> impl Future<Output = LapdistResult<Option<Otp>>> + Send;
    /// Fails with `AlreadyExists` if a record is present.
    fn create(&self, input: CreateOtp) -> impl Future<Output = LapdistResult<Otp>> + Send;
    fn delete(&self, beneficiary_id: Uuid) -> impl Future<Output = LapdistResult<()>> + Send;
}
