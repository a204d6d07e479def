//! Sealing of the ID number entered at the counter.
//!
//! The entered value is kept on the verification record for audit.
//! With a key configured it is stored as `base64(nonce || ciphertext || tag)`
//! under AES-256-GCM; without one only a masked form is kept.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::VerifyError;
use crate::identity::mask_digits;

const NONCE_LEN: usize = 12;

/// Encrypt `plaintext` with AES-256-GCM.
pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> Result<String, VerifyError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| VerifyError::Crypto(format!("AES-GCM encrypt: {e}")))?;

    let mut combined = nonce_bytes.to_vec();
    combined.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(combined))
}

pub fn decrypt(key: &[u8; 32], encoded: &str) -> Result<Vec<u8>, VerifyError> {
    let combined = STANDARD
        .decode(encoded)
        .map_err(|e| VerifyError::Crypto(format!("base64 decode: {e}")))?;

    if combined.len() <= NONCE_LEN {
        return Err(VerifyError::Crypto("ciphertext too short".into()));
    }

    let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| VerifyError::Crypto(format!("AES-GCM decrypt: {e}")))
}

/// Produce the audit form of an entered ID number.
pub fn seal_entered_id(
    key: Option<&[u8; 32]>,
    entered: &str,
    visible_digits: usize,
) -> Result<String, VerifyError> {
    match key {
        Some(key) => encrypt(key, entered.as_bytes()),
        None => {
            let compact: String = entered.chars().filter(|c| !c.is_whitespace()).collect();
            Ok(mask_digits(&compact, visible_digits))
        }
    }
}

/// Recover an entered ID number sealed with [`seal_entered_id`].
pub fn open_entered_id(key: &[u8; 32], sealed: &str) -> Result<String, VerifyError> {
    let bytes = decrypt(key, sealed)?;
    String::from_utf8(bytes).map_err(|e| VerifyError::Crypto(format!("utf-8: {e}")))
}
