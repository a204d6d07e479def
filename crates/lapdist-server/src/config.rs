use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, bail};
use lapdist_db::DbConfig;
use lapdist_verify::VerificationConfig;

/// Process configuration loaded from environment variables.
///
/// A `.env` file in the working directory is read first when present.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db: DbConfig,
    pub verification: VerificationConfig,
    /// Root directory for photos and issuance evidence.
    pub upload_root: PathBuf,
    /// Base URL of the face inference service.
    pub face_service_url: String,
    /// Notification gateway endpoint for SMS and e-mail.
    pub notify_url: String,
    pub notify_token: String,
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value")),
        Err(_) => Ok(default),
    }
}

fn audit_key(key: &str) -> anyhow::Result<Option<[u8; 32]>> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(None);
    };
    let bytes = hex::decode(raw.trim()).with_context(|| format!("{key} must be hex"))?;
    let Ok(key_bytes) = <[u8; 32]>::try_from(bytes.as_slice()) else {
        bail!("{key} must be 32 bytes (64 hex characters)");
    };
    Ok(Some(key_bytes))
}

impl ServerConfig {
    /// | Env Var                      | Default                  |
    /// |------------------------------|--------------------------|
    /// | `LAPDIST_DB_URL`             | `127.0.0.1:8000`         |
    /// | `LAPDIST_DB_NAMESPACE`       | `lapdist`                |
    /// | `LAPDIST_DB_DATABASE`        | `main`                   |
    /// | `LAPDIST_DB_USER`            | `root`                   |
    /// | `LAPDIST_DB_PASSWORD`        | `root`                   |
    /// | `LAPDIST_UPLOAD_ROOT`        | `./uploads`              |
    /// | `LAPDIST_FACE_URL`           | `http://127.0.0.1:5005`  |
    /// | `LAPDIST_NOTIFY_URL`         | `http://127.0.0.1:8025/send` |
    /// | `LAPDIST_NOTIFY_TOKEN`       | empty                    |
    /// | `LAPDIST_ADMIN_EMAIL`        | `admin@localhost`        |
    /// | `LAPDIST_OTP_TTL_SECS`       | `1200`                   |
    /// | `LAPDIST_FACE_CONCURRENCY`   | `2`                      |
    /// | `LAPDIST_FACE_TIMEOUT_SECS`  | `30`                     |
    /// | `LAPDIST_LIVENESS_CHECK`     | `true`                   |
    /// | `LAPDIST_ID_PEPPER`          | unset                    |
    /// | `LAPDIST_AUDIT_KEY`          | unset (mask only)        |
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = DbConfig::default();
        let db = DbConfig {
            url: var_or("LAPDIST_DB_URL", &defaults.url),
            namespace: var_or("LAPDIST_DB_NAMESPACE", &defaults.namespace),
            database: var_or("LAPDIST_DB_DATABASE", &defaults.database),
            username: var_or("LAPDIST_DB_USER", &defaults.username),
            password: var_or("LAPDIST_DB_PASSWORD", &defaults.password),
        };

        let base = VerificationConfig::default();
        let verification = VerificationConfig {
            admin_email: var_or("LAPDIST_ADMIN_EMAIL", &base.admin_email),
            otp_ttl_secs: parse_or("LAPDIST_OTP_TTL_SECS", base.otp_ttl_secs)?,
            face_match_concurrency: parse_or("LAPDIST_FACE_CONCURRENCY", base.face_match_concurrency)?,
            face_match_timeout_secs: parse_or("LAPDIST_FACE_TIMEOUT_SECS", base.face_match_timeout_secs)?,
            liveness_check: parse_or("LAPDIST_LIVENESS_CHECK", base.liveness_check)?,
            id_pepper: std::env::var("LAPDIST_ID_PEPPER").ok(),
            audit_encryption_key: audit_key("LAPDIST_AUDIT_KEY")?,
            ..base
        };

        Ok(Self {
            db,
            verification,
            upload_root: PathBuf::from(var_or("LAPDIST_UPLOAD_ROOT", "./uploads")),
            face_service_url: var_or("LAPDIST_FACE_URL", "http://127.0.0.1:5005"),
            notify_url: var_or("LAPDIST_NOTIFY_URL", "http://127.0.0.1:8025/send"),
            notify_token: var_or("LAPDIST_NOTIFY_TOKEN", ""),
        })
    }
}
