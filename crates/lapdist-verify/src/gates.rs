//! Precondition checks shared by OTP, issuance and upgrade flows.

use lapdist_core::models::verification::VerificationStatus;

use crate::error::VerifyError;

/// A verification record exists and its voucher check passed.
pub fn coupon_verified(
    status: Option<&VerificationStatus>,
) -> Result<&VerificationStatus, VerifyError> {
    let status = status.ok_or(VerifyError::NotInitiated)?;
    if !status.is_coupon_verified {
        return Err(VerifyError::CouponNotVerified);
    }
    Ok(status)
}

/// Voucher verified and identity either proven or overridden.
pub fn identity_cleared(
    status: Option<&VerificationStatus>,
) -> Result<&VerificationStatus, VerifyError> {
    let status = coupon_verified(status)?;
    if !status.identity_cleared() {
        return Err(VerifyError::IdentityNotCleared);
    }
    Ok(status)
}

/// Everything required before a laptop is handed over.
pub fn ready_for_issuance(
    status: Option<&VerificationStatus>,
) -> Result<&VerificationStatus, VerifyError> {
    let status = identity_cleared(status)?;
    if !status.is_otp_verified {
        return Err(VerifyError::OtpNotVerified);
    }
    Ok(status)
}
