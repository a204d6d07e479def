//! Verification error types.

use lapdist_core::error::LapdistError;
use thiserror::Error;

/// Classification used at the process boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    BadRequest,
    Conflict,
    VerificationFailed,
    Internal,
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("invalid voucher/gift code")]
    VoucherNotFound,

    #[error("beneficiary is not approved by the HR / registration officer yet")]
    NotApproved,

    #[error("beneficiary is not allotted to this store")]
    WrongStore,

    #[error("beneficiary photo is not registered")]
    PhotoNotRegistered,

    #[error("no face detected in the uploaded image")]
    NoFaceDetected,

    #[error("face verification failed: {0}")]
    FaceMatch(String),

    #[error("beneficiary already received the laptop")]
    AlreadyIssued,

    #[error("laptop serial is already issued to another beneficiary")]
    DuplicateSerial,

    #[error("an unexpired OTP already exists; try again after {remaining_secs} seconds")]
    OtpAlreadyPending { remaining_secs: u64 },

    #[error("OTP not found; request an OTP before verifying")]
    OtpNotFound,

    #[error("OTP has expired")]
    OtpExpired,

    #[error("invalid OTP")]
    OtpMismatch,

    #[error("verification process is not initiated")]
    NotInitiated,

    #[error("voucher code is not verified")]
    CouponNotVerified,

    #[error("identity checks are neither passed nor overridden")]
    IdentityNotCleared,

    #[error("OTP is not verified")]
    OtpNotVerified,

    #[error("an override reason is required")]
    ReasonRequired,

    #[error("issuance evidence missing: {0}")]
    EvidenceMissing(&'static str),

    #[error("laptop serial does not match the unit on file")]
    SerialMismatch,

    #[error("beneficiary has not received a laptop yet")]
    NotYetIssued,

    #[error("no pending upgrade request")]
    UpgradeNotPending,

    #[error("an upgrade request is already {0}")]
    UpgradeExists(&'static str),

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("no {0} destination on record")]
    MissingDestination(&'static str),

    #[error("failed to send code: {0}")]
    Delivery(String),

    #[error("cryptography error: {0}")]
    Crypto(String),

    #[error(transparent)]
    Core(#[from] LapdistError),
}

impl VerifyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VerifyError::VoucherNotFound
            | VerifyError::PhotoNotRegistered
            | VerifyError::OtpNotFound => ErrorKind::NotFound,
            VerifyError::NotApproved
            | VerifyError::WrongStore
            | VerifyError::CouponNotVerified
            | VerifyError::IdentityNotCleared
            | VerifyError::OtpNotVerified => ErrorKind::Forbidden,
            VerifyError::NoFaceDetected
            | VerifyError::OtpExpired
            | VerifyError::OtpMismatch
            | VerifyError::NotInitiated
            | VerifyError::ReasonRequired
            | VerifyError::EvidenceMissing(_)
            | VerifyError::SerialMismatch
            | VerifyError::NotYetIssued
            | VerifyError::UpgradeNotPending
            | VerifyError::InvalidFormat(_)
            | VerifyError::MissingDestination(_) => ErrorKind::BadRequest,
            VerifyError::AlreadyIssued
            | VerifyError::DuplicateSerial
            | VerifyError::OtpAlreadyPending { .. }
            | VerifyError::UpgradeExists(_) => ErrorKind::Conflict,
            VerifyError::FaceMatch(_) => ErrorKind::VerificationFailed,
            VerifyError::Delivery(_) | VerifyError::Crypto(_) => ErrorKind::Internal,
            VerifyError::Core(core) => match core {
                LapdistError::NotFound { .. } => ErrorKind::NotFound,
                LapdistError::AlreadyExists { .. } => ErrorKind::Conflict,
                LapdistError::AuthorizationDenied { .. } => ErrorKind::Forbidden,
                LapdistError::Validation { .. } => ErrorKind::BadRequest,
                _ => ErrorKind::Internal,
            },
        }
    }
}

impl From<VerifyError> for LapdistError {
    fn from(err: VerifyError) -> Self {
        if let VerifyError::Core(core) = err {
            return core;
        }
        match err.kind() {
            ErrorKind::Forbidden => LapdistError::AuthorizationDenied {
                reason: err.to_string(),
            },
            ErrorKind::VerificationFailed | ErrorKind::Internal => {
                LapdistError::Internal(err.to_string())
            }
            ErrorKind::NotFound | ErrorKind::BadRequest | ErrorKind::Conflict => {
                LapdistError::Validation {
                    message: err.to_string(),
                }
            }
        }
    }
}
