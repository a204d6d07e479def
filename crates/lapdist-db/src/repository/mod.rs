//! SurrealDB repository implementations.

mod beneficiary;
mod issuance;
mod otp;
mod upgrade;
mod verification;

pub use beneficiary::SurrealBeneficiaryRepository;
pub use issuance::SurrealIssuedStatusRepository;
pub use otp::SurrealOtpRepository;
pub use upgrade::SurrealUpgradeRequestRepository;
pub use verification::SurrealVerificationStatusRepository;

use uuid::Uuid;

use crate::error::DbError;

fn parse_uuid(value: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::Migration(format!("invalid {what} UUID: {e}")))
}

fn parse_opt_uuid(value: Option<String>, what: &str) -> Result<Option<Uuid>, DbError> {
    value.map(|v| parse_uuid(&v, what)).transpose()
}
