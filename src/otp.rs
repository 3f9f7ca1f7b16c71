//! One-time codes and password reset tokens
//!
//! Codes are 6-digit numbers kept in an [`ExpiringStore`] under
//! `otp:<subject>`; reset tokens are UUIDs under `reset:<subject>`. Both are
//! single-use: a successful verification consumes the entry, a mismatch
//! leaves it in place until it expires.

use crate::cache::ExpiringStore;
use crate::metrics;
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// OTP configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OtpConfig {
    /// Lifetime of a one-time code in seconds
    pub code_ttl_secs: u64,
    /// Lifetime of a reset token in seconds
    pub reset_token_ttl_secs: u64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            code_ttl_secs: 300,
            reset_token_ttl_secs: 900,
        }
    }
}

/// OTP error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OtpError {
    /// Nothing issued, or it expired
    #[error("Code is invalid or has expired")]
    Missing,

    /// Wrong value supplied
    #[error("Code does not match")]
    Mismatch,

    /// Subject was empty
    #[error("Subject is required")]
    EmptySubject,

    /// Notifier could not hand the secret over
    #[error("Failed to send code: {0}")]
    Notify(String),
}

/// Secret handed to a notifier
#[derive(Debug, Clone, PartialEq)]
pub enum Secret {
    OneTimeCode(String),
    ResetToken(String),
}

/// Delivery seam for codes and tokens (e.g. an email sender)
#[async_trait]
pub trait CodeNotifier: Send + Sync {
    async fn notify(&self, subject: &str, secret: &Secret) -> Result<(), String>;
}

/// Notifier that only writes to the log
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl CodeNotifier for LogNotifier {
    async fn notify(&self, subject: &str, secret: &Secret) -> Result<(), String> {
        match secret {
            Secret::OneTimeCode(code) => debug!(subject, code = %code, "One-time code issued"),
            Secret::ResetToken(token) => debug!(subject, token = %token, "Reset token issued"),
        }
        Ok(())
    }
}

/// Issues and verifies one-time codes and reset tokens
#[derive(Clone)]
pub struct OtpService {
    store: ExpiringStore<String, String>,
    notifier: Arc<dyn CodeNotifier>,
    config: OtpConfig,
}

impl OtpService {
    pub fn new(notifier: Arc<dyn CodeNotifier>, config: OtpConfig) -> Self {
        Self {
            store: ExpiringStore::new(),
            notifier,
            config,
        }
    }

    /// Generate a code for `subject`, replacing any outstanding one
    pub async fn issue_code(&self, subject: &str) -> Result<(), OtpError> {
        let subject = normalize(subject)?;
        let code = generate_code();

        self.store
            .insert(
                code_key(&subject),
                code.clone(),
                Duration::from_secs(self.config.code_ttl_secs),
            )
            .await;
        metrics::OTP_ISSUED_TOTAL.inc();

        self.notifier
            .notify(&subject, &Secret::OneTimeCode(code))
            .await
            .map_err(|e| {
                warn!(subject = %subject, error = %e, "Failed to send one-time code");
                OtpError::Notify(e)
            })?;

        info!(subject = %subject, "One-time code sent");
        Ok(())
    }

    /// Check `code` for `subject`; consumes it on success
    pub async fn verify_code(&self, subject: &str, code: &str) -> Result<(), OtpError> {
        let subject = normalize(subject)?;
        self.verify(code_key(&subject), code.trim()).await
    }

    /// Generate a password reset token for `subject`
    pub async fn issue_reset_token(&self, subject: &str) -> Result<String, OtpError> {
        let subject = normalize(subject)?;
        let token = Uuid::new_v4().to_string();

        self.store
            .insert(
                reset_key(&subject),
                token.clone(),
                Duration::from_secs(self.config.reset_token_ttl_secs),
            )
            .await;
        metrics::OTP_ISSUED_TOTAL.inc();

        self.notifier
            .notify(&subject, &Secret::ResetToken(token.clone()))
            .await
            .map_err(OtpError::Notify)?;

        info!(subject = %subject, "Reset token issued");
        Ok(token)
    }

    /// Check a reset token for `subject`; consumes it on success
    pub async fn verify_reset_token(&self, subject: &str, token: &str) -> Result<(), OtpError> {
        let subject = normalize(subject)?;
        self.verify(reset_key(&subject), token.trim()).await
    }

    /// Drop expired codes and tokens
    pub async fn purge_expired(&self) -> usize {
        self.store.purge_expired().await
    }

    async fn verify(&self, key: String, supplied: &str) -> Result<(), OtpError> {
        let result = match self.store.take_if(&key, |expected| expected == supplied).await {
            Some(true) => Ok(()),
            Some(false) => Err(OtpError::Mismatch),
            None => Err(OtpError::Missing),
        };

        let label = match &result {
            Ok(()) => "ok",
            Err(OtpError::Mismatch) => "mismatch",
            Err(_) => "missing",
        };
        metrics::OTP_VERIFICATIONS_TOTAL
            .with_label_values(&[label])
            .inc();

        if let Err(e) = &result {
            warn!(key = %key, error = %e, "Verification failed");
        }
        result
    }
}

fn normalize(subject: &str) -> Result<String, OtpError> {
    let subject = subject.trim().to_lowercase();
    if subject.is_empty() {
        return Err(OtpError::EmptySubject);
    }
    Ok(subject)
}

fn code_key(subject: &str) -> String {
    format!("otp:{}", subject)
}

fn reset_key(subject: &str) -> String {
    format!("reset:{}", subject)
}

/// Uniform 6-digit code
fn generate_code() -> String {
    rand::rng().random_range(100_000..=999_999u32).to_string()
}
