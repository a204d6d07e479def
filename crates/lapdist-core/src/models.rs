//! Domain models.
//!
//! The beneficiary is the aggregate root; every other record is a
//! single-row satellite keyed by the beneficiary id.

pub mod beneficiary;
pub mod issuance;
pub mod otp;
pub mod upgrade;
pub mod verification;
