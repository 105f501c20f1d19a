//! # Lead Sleuth Core Library
//!
//! Finds a named decision maker and a deliverable email address for business
//! leads. A cascade of discovery providers (people search, email finder,
//! public registry plus pattern guessing) proposes contacts, and a
//! deliverability verifier combining a third-party API with a direct SMTP
//! probe classifies each address as valid, invalid, risky or unknown.
//!
//! It is designed to be used either directly as a library or via the
//! `lead-sleuth` command-line tool.

mod core;
pub mod providers;
pub mod store;
mod utils;
pub mod verification;

pub use crate::core::batch::{BatchOrchestrator, BatchSummary};
pub use crate::core::cascade::{rank_candidates, AcceptedContact, ProviderCascade, RunState};
pub use crate::core::config::{get_random_sleep_duration, Config, ConfigBuilder, ConfigFile};
pub use crate::core::credentials::{CredentialLease, CredentialPool};
pub use crate::core::error::{AppError, Result};
pub use crate::core::models::{
    BusinessRecord, CandidateContact, DiscoverySource, EmailStatus, PersistedContact, Role,
    VerificationResult,
};
pub use crate::utils::dns::{DnsMxResolver, MailServer, MxLookup};
pub use crate::utils::domain::{extract_mail_domain, is_non_organizational_host};
pub use crate::utils::patterns::{generate_email_patterns, is_generic_email, is_valid_syntax};
pub use crate::utils::roles::{classify_title, decision_maker_score, role_for_title, title_priority};
pub use crate::utils::smtp::{SmtpProber, SmtpReply};

use crate::providers::Providers;
use crate::store::{BusinessSource, ContactStore};
use crate::verification::{ApiVerifier, DeliverabilityVerifier, EmailVerifier};
use reqwest::Client;
use std::sync::Arc;

/// Shared HTTP client for every provider and the verification API.
pub fn build_http_client(config: &Config) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| AppError::Initialization(format!("Failed to build HTTP client: {}", e)))?;
    tracing::debug!("HTTP client initialized.");
    Ok(client)
}

/// Builds the verifier from configuration: the API client when a key is set,
/// and the SMTP prober (with its DNS resolver) when SMTP checks are enabled.
pub fn build_verifier(config: Arc<Config>, http_client: Client) -> Result<DeliverabilityVerifier> {
    let api = ApiVerifier::from_config(config.clone(), http_client);
    let smtp = if config.enable_smtp_checks {
        let resolver: Arc<dyn MxLookup> = Arc::new(DnsMxResolver::new(&config)?);
        Some(SmtpProber::new(config.clone(), resolver))
    } else {
        None
    };
    tracing::debug!(
        "Verifier initialized (API: {}, SMTP: {}).",
        api.is_some(),
        smtp.is_some()
    );
    Ok(DeliverabilityVerifier::new(api, smtp))
}

/// Initializes shared resources (HTTP client, DNS resolver, provider
/// adapters) and returns a ready cascade.
pub fn initialize_pipeline(config: Arc<Config>) -> Result<ProviderCascade> {
    let http_client = build_http_client(&config)?;
    let verifier: Arc<dyn EmailVerifier> =
        Arc::new(build_verifier(config.clone(), http_client.clone())?);
    let providers = Providers::from_config(config.clone(), http_client);
    tracing::info!("Lead Sleuth pipeline initialized successfully.");
    Ok(ProviderCascade::new(config, providers, verifier))
}

/// Runs one batch over the given collaborators with HTTP-backed providers.
pub async fn run_batch(
    config: Arc<Config>,
    businesses: Arc<dyn BusinessSource>,
    contacts: Arc<dyn ContactStore>,
) -> Result<BatchSummary> {
    let cascade = initialize_pipeline(config.clone())?;
    BatchOrchestrator::new(config, cascade, businesses, contacts)
        .run()
        .await
}

/// Classifies a single address. With `smtp_only` the API is bypassed and the
/// SMTP probe's answer is returned as-is.
pub async fn verify_single_email(
    config: Arc<Config>,
    email: &str,
    smtp_only: bool,
) -> Result<VerificationResult> {
    let http_client = build_http_client(&config)?;
    let verifier = build_verifier(config, http_client)?;
    let result = if smtp_only {
        verifier.verify_smtp_only(email).await
    } else {
        verifier.verify(email).await
    };
    tracing::info!(
        "Verification of <{}>: {} ({})",
        email.trim(),
        result.status,
        result.reason
    );
    Ok(result)
}

/// Performs an early check for outbound SMTP connectivity.
pub async fn check_smtp_connectivity(config: &Config) -> Result<()> {
    utils::smtp::check_smtp_connectivity(config).await
}
