//! National ID hashing, verification, and masking using Argon2id.
//!
//! ID numbers are normalised to bare digits before hashing so that
//! "1234 5678 9012" and "123456789012" hash identically.

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};

use crate::config::VerificationConfig;
use crate::error::VerifyError;

/// Digits in a national ID number.
pub const ID_NUMBER_LENGTH: usize = 12;

/// Strip spaces and dashes from an entered ID number.
///
/// Any other non-digit character is rejected.
pub fn normalize_id(plain: &str) -> Result<String, VerifyError> {
    let mut digits = String::with_capacity(plain.len());
    for c in plain.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' => {}
            _ => {
                return Err(VerifyError::InvalidFormat(
                    "ID number may only contain digits".into(),
                ));
            }
        }
    }
    Ok(digits)
}

/// Mask an ID number for display, e.g. `XXXX XXXX 1234`.
pub fn mask_id(plain: &str, visible_digits: usize) -> Result<String, VerifyError> {
    let digits = normalize_id(plain)?;
    if digits.len() != ID_NUMBER_LENGTH {
        return Err(VerifyError::InvalidFormat(format!(
            "ID number must be {ID_NUMBER_LENGTH} digits"
        )));
    }
    Ok(mask_digits(&digits, visible_digits))
}

/// Mask all but the trailing `visible` characters, grouped in fours.
pub(crate) fn mask_digits(value: &str, visible: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    let hidden = chars.len().saturating_sub(visible);
    chars
        .iter()
        .enumerate()
        .map(|(i, c)| if i < hidden { 'X' } else { *c })
        .collect::<Vec<_>>()
        .chunks(4)
        .map(|group| group.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Argon2id hasher for national ID numbers.
#[derive(Clone)]
pub struct IdentityHasher {
    argon2: Argon2<'static>,
    pepper: Option<String>,
}

impl IdentityHasher {
    pub fn new(config: &VerificationConfig) -> Result<Self, VerifyError> {
        let params = Params::new(
            config.id_hash_memory_kib,
            config.id_hash_iterations,
            config.id_hash_parallelism,
            None,
        )
        .map_err(|e| VerifyError::Crypto(format!("argon2 params: {e}")))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            pepper: config.id_pepper.clone(),
        })
    }

    fn peppered(&self, digits: &str) -> String {
        match &self.pepper {
            Some(p) => format!("{p}{digits}"),
            None => digits.to_string(),
        }
    }

    /// Hash an ID number into a PHC-format string with a fresh salt.
    pub fn hash_id(&self, plain: &str) -> Result<String, VerifyError> {
        let digits = normalize_id(plain)?;
        if digits.len() != ID_NUMBER_LENGTH {
            return Err(VerifyError::InvalidFormat(format!(
                "ID number must be {ID_NUMBER_LENGTH} digits"
            )));
        }
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(self.peppered(&digits).as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| VerifyError::Crypto(format!("hash error: {e}")))
    }

    /// Check an entered ID number against a stored hash.
    ///
    /// Malformed input or a malformed stored hash yields `false`; this
    /// never fails.
    pub fn verify_id(&self, plain: &str, hash: &str) -> bool {
        let Ok(digits) = normalize_id(plain) else {
            return false;
        };
        let Ok(parsed) = argon2::PasswordHash::new(hash) else {
            return false;
        };
        self.argon2
            .verify_password(self.peppered(&digits).as_bytes(), &parsed)
            .is_ok()
    }
}
