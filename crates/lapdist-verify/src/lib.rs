//! Laptop distribution verification: identity hashing, OTP issuance,
//! face matching, the verification state engine, the issuance ledger
//! and the upgrade workflow.

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod face;
pub mod face_client;
pub mod files;
pub mod gates;
pub mod identity;
pub mod issuance;
pub mod ledger;
pub mod notifier;
pub mod otp;
pub mod upgrade;

pub use config::VerificationConfig;
pub use engine::{ConsolidateRequest, VerificationOutcome, VerificationService};
pub use error::{ErrorKind, VerifyError};
pub use face::{FaceEngine, FaceEngineError, FaceMatchError, FaceMatcher};
pub use issuance::{IssuanceService, IssueLaptopRequest};
pub use ledger::IssuanceLedger;
pub use otp::{OtpGate, OtpIssuer};
pub use upgrade::UpgradeWorkflow;
