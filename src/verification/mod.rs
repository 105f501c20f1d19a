//! Deliverability verification: the third-party API, the SMTP probe, and how
//! their answers are combined.

pub mod api;

pub use api::{map_api_status, ApiVerifier};

use crate::core::models::{EmailStatus, VerificationResult};
use crate::utils::smtp::SmtpProber;
use async_trait::async_trait;

/// Anything that can classify an address.
#[async_trait]
pub trait EmailVerifier: Send + Sync {
    /// True when [`EmailVerifier::verify_via_api`] can return a result.
    fn has_api(&self) -> bool;

    /// Third-party API check only. `None` when no API is configured.
    async fn verify_via_api(&self, email: &str) -> Option<VerificationResult>;

    /// Best available classification using every configured technique.
    async fn verify(&self, email: &str) -> VerificationResult;
}

/// Combines [`ApiVerifier`] and [`SmtpProber`].
///
/// The API is authoritative when it has an opinion, since it can tell
/// catch-all domains apart. The SMTP probe only runs when the API answered
/// unknown or is not configured. An SMTP accept while an API is configured
/// stays unknown, because an accepting server may accept everything.
#[derive(Clone, Default)]
pub struct DeliverabilityVerifier {
    api: Option<ApiVerifier>,
    smtp: Option<SmtpProber>,
}

impl DeliverabilityVerifier {
    pub fn new(api: Option<ApiVerifier>, smtp: Option<SmtpProber>) -> Self {
        Self { api, smtp }
    }

    pub fn has_smtp(&self) -> bool {
        self.smtp.is_some()
    }

    /// SMTP probe alone, taken at face value.
    pub async fn verify_smtp_only(&self, email: &str) -> VerificationResult {
        match &self.smtp {
            Some(smtp) => smtp.probe(email).await,
            None => VerificationResult::unknown("smtp_disabled"),
        }
    }

    fn combine(api_result: VerificationResult, smtp_result: VerificationResult) -> VerificationResult {
        match smtp_result.status {
            EmailStatus::Valid => VerificationResult {
                status: EmailStatus::Unknown,
                reason: "smtp_accepted_provisional".to_string(),
                ..smtp_result
            },
            EmailStatus::Invalid => smtp_result,
            _ if api_result.reason == "api_unknown" => smtp_result,
            _ => api_result,
        }
    }
}

#[async_trait]
impl EmailVerifier for DeliverabilityVerifier {
    fn has_api(&self) -> bool {
        self.api.is_some()
    }

    async fn verify_via_api(&self, email: &str) -> Option<VerificationResult> {
        match &self.api {
            Some(api) => Some(api.verify(email).await),
            None => None,
        }
    }

    async fn verify(&self, email: &str) -> VerificationResult {
        let api_result = match &self.api {
            Some(api) => {
                let result = api.verify(email).await;
                if result.status != EmailStatus::Unknown {
                    return result;
                }
                Some(result)
            }
            None => None,
        };

        let Some(smtp) = &self.smtp else {
            return api_result.unwrap_or_else(|| VerificationResult::unknown("no_verifier"));
        };

        let smtp_result = smtp.probe(email).await;
        match api_result {
            Some(api_result) => {
                let combined = Self::combine(api_result, smtp_result);
                tracing::debug!(target: "verification_api",
                    "Combined API/SMTP verdict for <{}>: {} ({})", email, combined.status, combined.reason);
                combined
            }
            None => smtp_result,
        }
    }
}
