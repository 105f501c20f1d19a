//! Contains validation logic for the final Config struct.

use super::{Config, Result, MAX_CONCURRENCY};
use crate::core::error::AppError;
use std::collections::HashSet;

/// Validates the configuration after loading and overrides.
/// Clamps or normalizes values where a sensible correction exists.
pub(crate) fn validate_config(config: &mut Config) -> Result<()> {
    if config.sleep_between_requests.0 < 0.0 || config.sleep_between_requests.1 < 0.0 {
        return Err(AppError::Config(
            "Sleep durations cannot be negative.".to_string(),
        ));
    }
    if config.sleep_between_requests.0 > config.sleep_between_requests.1 {
        tracing::warn!(
            "Min sleep ({:.2}s) > Max sleep ({:.2}s). Setting max sleep = min sleep.",
            config.sleep_between_requests.0,
            config.sleep_between_requests.1
        );
        config.sleep_between_requests.1 = config.sleep_between_requests.0;
    }
    if config.dns_servers.is_empty() {
        tracing::debug!("DNS servers list is empty. The system resolver configuration will be used.");
    }
    if config.max_concurrency == 0 {
        tracing::warn!("Max concurrency was set to 0. Setting to 1.");
        config.max_concurrency = 1;
    }
    if config.max_concurrency > MAX_CONCURRENCY {
        tracing::warn!(
            "Max concurrency ({}) exceeds the provider-friendly cap. Clamping to {}.",
            config.max_concurrency,
            MAX_CONCURRENCY
        );
        config.max_concurrency = MAX_CONCURRENCY;
    }
    if config.smtp_timeout.is_zero() {
        return Err(AppError::Config(
            "SMTP timeout must be greater than zero.".to_string(),
        ));
    }
    if !config.smtp_sender_email.contains('@') || !config.smtp_sender_email.contains('.') {
        return Err(AppError::Config(format!(
            "Invalid SMTP sender email format: {}",
            config.smtp_sender_email
        )));
    }
    if config.email_finder_max_people == 0 {
        tracing::warn!("email_finder_max_people was 0. Setting to 1.");
        config.email_finder_max_people = 1;
    }

    let mut seen = HashSet::new();
    let before = config.people_search_keys.len();
    config.people_search_keys = config
        .people_search_keys
        .iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .collect();
    if config.people_search_keys.len() != before {
        tracing::warn!(
            "Dropped {} blank or duplicate people-search credential(s).",
            before - config.people_search_keys.len()
        );
    }

    if config.verifier_key.is_none() && !config.enable_smtp_checks {
        tracing::warn!("No verifier key configured and SMTP checks disabled. Every email will be classified unknown.");
    }
    if config.enable_registry_fallback && config.verifier_key.is_none() {
        tracing::info!("Registry fallback needs a verifier key; it will be skipped.");
    }
    Ok(())
}
