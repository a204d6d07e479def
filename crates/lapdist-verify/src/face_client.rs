//! [`FaceEngine`] backed by an HTTP inference service.
//!
//! The service exposes `POST /verify` taking `{"img1", "img2"}` and
//! `POST /anti-spoof` taking `{"img"}`, both as base64 images. Calls
//! are made from the blocking pool, which may drive the runtime with
//! [`Handle::block_on`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio::runtime::Handle;

use crate::face::{FaceEngine, FaceEngineError};

pub struct RemoteFaceEngine {
    client: reqwest::Client,
    base_url: String,
    handle: Handle,
}

impl RemoteFaceEngine {
    pub fn new(base_url: impl Into<String>, handle: Handle) -> Result<Self, FaceEngineError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| FaceEngineError::Inference(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            handle,
        })
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, FaceEngineError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| FaceEngineError::Inference(format!("request: {e}")))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| FaceEngineError::Inference(format!("response body: {e}")))?;

        if status.is_success() {
            return Ok(payload);
        }
        let message = payload
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if status == StatusCode::UNPROCESSABLE_ENTITY || is_no_face(&message) {
            return Err(FaceEngineError::NoFaceDetected);
        }
        Err(FaceEngineError::Inference(format!("{status}: {message}")))
    }

    fn flag(payload: &Value, field: &str) -> Result<bool, FaceEngineError> {
        payload
            .get(field)
            .and_then(Value::as_bool)
            .ok_or_else(|| FaceEngineError::Inference(format!("response missing `{field}`")))
    }
}

fn is_no_face(message: &str) -> bool {
    message.to_ascii_lowercase().contains("face could not be detected")
}

impl FaceEngine for RemoteFaceEngine {
    fn compare(&self, candidate: &[u8], reference: &[u8]) -> Result<bool, FaceEngineError> {
        let body = json!({
            "img1": STANDARD.encode(candidate),
            "img2": STANDARD.encode(reference),
        });
        let payload = self.handle.block_on(self.post("/verify", body))?;
        Self::flag(&payload, "verified")
    }

    fn is_live(&self, image: &[u8]) -> Result<bool, FaceEngineError> {
        let body = json!({ "img": STANDARD.encode(image) });
        let payload = self.handle.block_on(self.post("/anti-spoof", body))?;
        Self::flag(&payload, "is_real")
    }
}
