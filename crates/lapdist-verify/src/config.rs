//! Verification configuration.

/// Configuration for the verification and issuance services.
#[derive(Debug, Clone)]
pub struct VerificationConfig {
    /// Number of digits in a one-time code (default: 6).
    pub otp_length: u32,
    /// OTP lifetime in seconds (default: 1200 = 20 minutes).
    pub otp_ttl_secs: u64,
    /// Delivery text; `{otp}` and `{minutes}` are substituted.
    pub otp_message_template: String,
    /// Destination for [`DeliveryChannel::Admin`](lapdist_core::notify::DeliveryChannel::Admin).
    pub admin_email: String,
    /// Maximum concurrent face-match inferences (default: 2).
    pub face_match_concurrency: usize,
    /// Per-call face-match timeout in seconds (default: 30).
    pub face_match_timeout_secs: u64,
    /// Run the advisory anti-spoof check before matching.
    pub liveness_check: bool,
    /// Trailing digits left visible when masking an ID number.
    pub mask_visible_digits: usize,
    /// Argon2id memory cost in KiB (default: 19456 = 19 MiB).
    pub id_hash_memory_kib: u32,
    /// Argon2id iterations (default: 2).
    pub id_hash_iterations: u32,
    /// Argon2id lanes (default: 1).
    pub id_hash_parallelism: u32,
    /// Optional pepper prepended to ID numbers before hashing.
    pub id_pepper: Option<String>,
    /// 256-bit AES-GCM key for the entered ID number kept for audit.
    /// `None` stores a masked form instead.
    pub audit_encryption_key: Option<[u8; 32]>,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            otp_length: 6,
            otp_ttl_secs: 1200,
            otp_message_template: "Your OTP is {otp} for receiving the laptop. \
                                   It is valid for {minutes} minutes. \
                                   Do not share it with anyone other than the store staff."
                .into(),
            admin_email: "admin@localhost".into(),
            face_match_concurrency: 2,
            face_match_timeout_secs: 30,
            liveness_check: true,
            mask_visible_digits: 4,
            id_hash_memory_kib: 19456,
            id_hash_iterations: 2,
            id_hash_parallelism: 1,
            id_pepper: None,
            audit_encryption_key: None,
        }
    }
}
