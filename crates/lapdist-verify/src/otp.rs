//! One-time codes: generation, storage, delivery and verification.
//!
//! [`OtpIssuer`] knows nothing about verification gates. [`OtpGate`]
//! wraps it with the checks that must hold before a code may be sent
//! or accepted.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use lapdist_core::error::LapdistError;
use lapdist_core::models::beneficiary::Beneficiary;
use lapdist_core::models::otp::CreateOtp;
use lapdist_core::models::verification::VerificationStatus;
use lapdist_core::notify::{DeliveryChannel, DeliveryReport, OtpSender};
use lapdist_core::repository::{BeneficiaryRepository, OtpRepository, VerificationStatusRepository};
use rand::Rng;
use serde::Serialize;
use subtle::ConstantTimeEq;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::VerificationConfig;
use crate::error::VerifyError;
use crate::gates;
use crate::identity::mask_digits;

/// A live code. `Debug` never prints the value.
#[derive(Clone)]
pub struct IssuedOtp {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for IssuedOtp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedOtp")
            .field("code", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Recipient {
    pub channel: DeliveryChannel,
    pub destination: String,
}

pub struct OtpIssuer<O: OtpRepository, S: OtpSender> {
    otp_repo: O,
    sender: S,
    length: u32,
    ttl: Duration,
    template: String,
}

impl<O: OtpRepository, S: OtpSender> OtpIssuer<O, S> {
    pub fn new(otp_repo: O, sender: S, config: &VerificationConfig) -> Self {
        Self {
            otp_repo,
            sender,
            length: config.otp_length.clamp(4, 9),
            ttl: Duration::seconds(config.otp_ttl_secs as i64),
            template: config.otp_message_template.clone(),
        }
    }

    /// Random numeric code without a leading zero.
    fn generate(&self) -> String {
        let low = 10u32.pow(self.length - 1);
        let high = 10u32.pow(self.length);
        rand::rng().random_range(low..high).to_string()
    }

    fn render(&self, code: &str) -> String {
        self.template
            .replace("{otp}", code)
            .replace("{minutes}", &self.ttl.num_minutes().to_string())
    }

    /// Create a fresh code for the beneficiary.
    ///
    /// An unexpired code blocks reissue; an expired one is replaced.
    pub async fn issue(&self, beneficiary_id: Uuid) -> Result<IssuedOtp, VerifyError> {
        let now = Utc::now();
        if let Some(existing) = self.otp_repo.find(beneficiary_id).await? {
            if !existing.is_expired(now) {
                return Err(VerifyError::OtpAlreadyPending {
                    remaining_secs: existing.remaining_secs(now),
                });
            }
            self.otp_repo.delete(beneficiary_id).await?;
        }

        let input = CreateOtp {
            beneficiary_id,
            code: self.generate(),
            expires_at: now + self.ttl,
        };
        match self.otp_repo.create(input).await {
            Ok(otp) => {
                info!(%beneficiary_id, expires_at = %otp.expires_at, "OTP issued");
                Ok(IssuedOtp {
                    code: otp.code,
                    expires_at: otp.expires_at,
                })
            }
            // Lost a race with a concurrent issue for the same beneficiary.
            Err(LapdistError::AlreadyExists { .. }) => {
                let remaining_secs = self
                    .otp_repo
                    .find(beneficiary_id)
                    .await?
                    .map(|o| o.remaining_secs(Utc::now()))
                    .unwrap_or(0);
                Err(VerifyError::OtpAlreadyPending { remaining_secs })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Hand the code to the delivery collaborator.
    pub async fn deliver(
        &self,
        recipient: &Recipient,
        otp: &IssuedOtp,
    ) -> Result<DeliveryReport, VerifyError> {
        let report = self
            .sender
            .send(recipient.channel, &recipient.destination, &self.render(&otp.code))
            .await
            .map_err(|e| VerifyError::Delivery(e.to_string()))?;
        if !report.delivered {
            warn!(channel = ?recipient.channel, status = %report.provider_status, "OTP delivery rejected");
            return Err(VerifyError::Delivery(report.provider_status));
        }
        Ok(report)
    }

    /// Re-deliver the live code, or issue a new one if none is live.
    pub async fn resend(
        &self,
        beneficiary_id: Uuid,
        recipient: &Recipient,
    ) -> Result<IssuedOtp, VerifyError> {
        let otp = match self.otp_repo.find(beneficiary_id).await? {
            Some(existing) if !existing.is_expired(Utc::now()) => IssuedOtp {
                code: existing.code,
                expires_at: existing.expires_at,
            },
            _ => self.issue(beneficiary_id).await?,
        };
        self.deliver(recipient, &otp).await?;
        info!(%beneficiary_id, channel = ?recipient.channel, "OTP resent");
        Ok(otp)
    }

    /// Check a submitted code. The record is consumed on success and
    /// removed once expired.
    pub async fn verify(&self, beneficiary_id: Uuid, submitted: &str) -> Result<(), VerifyError> {
        let otp = self
            .otp_repo
            .find(beneficiary_id)
            .await?
            .ok_or(VerifyError::OtpNotFound)?;

        if otp.is_expired(Utc::now()) {
            self.otp_repo.delete(beneficiary_id).await?;
            return Err(VerifyError::OtpExpired);
        }
        let submitted = submitted.trim().as_bytes();
        let matches = otp.code.len() == submitted.len()
            && bool::from(otp.code.as_bytes().ct_eq(submitted));
        if !matches {
            return Err(VerifyError::OtpMismatch);
        }

        self.otp_repo.delete(beneficiary_id).await?;
        Ok(())
    }
}

/// Where a code was sent, with the destination masked.
#[derive(Debug, Clone, Serialize)]
pub struct OtpDispatch {
    pub channel: DeliveryChannel,
    pub destination: String,
    pub expires_at: DateTime<Utc>,
}

fn mask_destination(destination: &str) -> String {
    match destination.split_once('@') {
        Some((local, domain)) => {
            let first = local.chars().next().unwrap_or('*');
            format!("{first}***@{domain}")
        }
        None => mask_digits(destination, 4).replace(' ', ""),
    }
}

/// Gate-checked OTP operations for the counter.
pub struct OtpGate<B, V, O, S>
where
    B: BeneficiaryRepository,
    V: VerificationStatusRepository,
    O: OtpRepository,
    S: OtpSender,
{
    beneficiary_repo: B,
    status_repo: V,
    issuer: OtpIssuer<O, S>,
    admin_email: String,
}

impl<B, V, O, S> OtpGate<B, V, O, S>
where
    B: BeneficiaryRepository,
    V: VerificationStatusRepository,
    O: OtpRepository,
    S: OtpSender,
{
    pub fn new(beneficiary_repo: B, status_repo: V, issuer: OtpIssuer<O, S>, admin_email: String) -> Self {
        Self {
            beneficiary_repo,
            status_repo,
            issuer,
            admin_email,
        }
    }

    fn recipient(
        &self,
        beneficiary: &Beneficiary,
        channel: DeliveryChannel,
    ) -> Result<Recipient, VerifyError> {
        let destination = match channel {
            DeliveryChannel::Sms => beneficiary.mobile_number.clone(),
            DeliveryChannel::Email => beneficiary
                .email
                .clone()
                .ok_or(VerifyError::MissingDestination("e-mail"))?,
            DeliveryChannel::Admin => self.admin_email.clone(),
        };
        Ok(Recipient {
            channel,
            destination,
        })
    }

    async fn cleared(&self, beneficiary_id: Uuid) -> Result<Beneficiary, VerifyError> {
        let beneficiary = self.beneficiary_repo.get_by_id(beneficiary_id).await?;
        let status = self.status_repo.find(beneficiary_id).await?;
        gates::identity_cleared(status.as_ref())?;
        Ok(beneficiary)
    }

    /// Issue and deliver a code once identity has been cleared.
    ///
    /// A delivery failure leaves the code stored; use [`Self::resend`].
    pub async fn request(
        &self,
        beneficiary_id: Uuid,
        channel: DeliveryChannel,
    ) -> Result<OtpDispatch, VerifyError> {
        let beneficiary = self.cleared(beneficiary_id).await?;
        let recipient = self.recipient(&beneficiary, channel)?;
        let otp = self.issuer.issue(beneficiary_id).await?;
        self.issuer.deliver(&recipient, &otp).await?;
        Ok(OtpDispatch {
            channel,
            destination: mask_destination(&recipient.destination),
            expires_at: otp.expires_at,
        })
    }

    pub async fn resend(
        &self,
        beneficiary_id: Uuid,
        channel: DeliveryChannel,
    ) -> Result<OtpDispatch, VerifyError> {
        let beneficiary = self.cleared(beneficiary_id).await?;
        let recipient = self.recipient(&beneficiary, channel)?;
        let otp = self.issuer.resend(beneficiary_id, &recipient).await?;
        Ok(OtpDispatch {
            channel,
            destination: mask_destination(&recipient.destination),
            expires_at: otp.expires_at,
        })
    }

    /// Accept a code and record it on the verification status.
    pub async fn verify(
        &self,
        beneficiary_id: Uuid,
        submitted: &str,
    ) -> Result<VerificationStatus, VerifyError> {
        self.cleared(beneficiary_id).await?;
        self.issuer.verify(beneficiary_id, submitted).await?;
        let status = self
            .status_repo
            .mark_otp_verified(beneficiary_id)
            .await
            .map_err(|e| match e {
                LapdistError::Validation { .. } => VerifyError::IdentityNotCleared,
                other => other.into(),
            })?;
        info!(%beneficiary_id, "OTP verified");
        Ok(status)
    }
}
