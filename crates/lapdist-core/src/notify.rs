//! OTP delivery collaborator (SMS / e-mail gateways).

use serde::{Deserialize, Serialize};

use crate::error::LapdistResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryChannel {
    /// Text message to the beneficiary's mobile number.
    Sms,
    /// E-mail to the beneficiary's registered address.
    Email,
    /// E-mail to the programme admin, who relays the code.
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: bool,
    pub provider_status: String,
}

/// Fire-and-report delivery; no retry is attempted here.
pub trait OtpSender: Send + Sync {
    fn send(
        &self,
        channel: DeliveryChannel,
        destination: &str,
        message: &str,
    ) -> impl Future<Output = LapdistResult<DeliveryReport>> + Send;
}
