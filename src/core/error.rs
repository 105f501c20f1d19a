//! Error types shared across the library.

use crate::providers::ProviderError;
use thiserror::Error;

/// Library-wide error type.
///
/// Verification never surfaces these: every network failure during a
/// deliverability check is folded into a [`crate::VerificationResult`].
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Domain extraction failed: {0}")]
    DomainExtraction(String),

    #[error("DNS lookup failed: {0}")]
    Dns(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SMTP connectivity check failed: {0}")]
    SmtpConnectivity(String),

    #[error("Contact store error: {0}")]
    Store(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

pub type Result<T> = std::result::Result<T, AppError>;
