//! [`OtpSender`] that posts to an HTTP notification gateway.
//!
//! The gateway relays SMS and e-mail; it receives
//! `{"channel", "to", "message"}` and answers 2xx once accepted.

use lapdist_core::error::{LapdistError, LapdistResult};
use lapdist_core::notify::{DeliveryChannel, DeliveryReport, OtpSender};
use serde_json::{Value, json};
use tracing::debug;

#[derive(Clone)]
pub struct HttpNotifier {
    client: reqwest::Client,
    endpoint: String,
    api_token: String,
}

impl HttpNotifier {
    pub fn new(endpoint: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_token: api_token.into(),
        }
    }
}

fn payload(channel: DeliveryChannel, destination: &str, message: &str) -> Value {
    let channel = match channel {
        DeliveryChannel::Sms => "sms",
        DeliveryChannel::Email | DeliveryChannel::Admin => "email",
    };
    json!({
        "channel": channel,
        "to": destination,
        "message": message,
    })
}

impl OtpSender for HttpNotifier {
    async fn send(
        &self,
        channel: DeliveryChannel,
        destination: &str,
        message: &str,
    ) -> LapdistResult<DeliveryReport> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_token)
            .json(&payload(channel, destination, message))
            .send()
            .await
            .map_err(|e| LapdistError::Delivery(e.to_string()))?;

        let status = response.status();
        debug!(?channel, %status, "notification gateway responded");
        if status.is_success() {
            return Ok(DeliveryReport {
                delivered: true,
                provider_status: status.to_string(),
            });
        }
        let body = response.text().await.unwrap_or_default();
        Ok(DeliveryReport {
            delivered: false,
            provider_status: format!("{status}: {body}"),
        })
    }
}
