//! Handles loading configuration from files and applying it to the Config struct.

use super::{Config, ConfigFile};
use anyhow::Context;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Loads configuration settings from a TOML file.
pub(crate) fn load_config_file(file_path: &str) -> anyhow::Result<ConfigFile> {
    let path = Path::new(file_path);
    if !path.exists() || !path.is_file() {
        return Err(anyhow::anyhow!(
            "File not found or is not a file: {}",
            file_path
        ));
    }
    tracing::debug!("Attempting to read config file: {}", file_path);
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", file_path))?;

    tracing::debug!("Attempting to parse TOML from: {}", file_path);
    let config_file_content: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML configuration from {}", file_path))?;

    tracing::debug!("Successfully parsed configuration file: {}", file_path);
    Ok(config_file_content)
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Merges a parsed `ConfigFile` onto `config`. Fields left unset keep their current value.
pub(crate) fn apply_file_config(config: &mut Config, file_config: &ConfigFile) {
    // Network
    if let Some(timeout) = file_config.network.request_timeout {
        config.request_timeout = Duration::from_secs(timeout);
    }
    if let Some(min_sleep) = file_config.network.min_sleep {
        config.sleep_between_requests.0 = min_sleep;
    }
    if let Some(max_sleep) = file_config.network.max_sleep {
        config.sleep_between_requests.1 = max_sleep;
    }
    if let Some(ref user_agent) = file_config.network.user_agent {
        config.user_agent = user_agent.clone();
    }

    // DNS
    if let Some(timeout) = file_config.dns.dns_timeout {
        config.dns_timeout = Duration::from_secs(timeout);
    }
    if let Some(ref servers) = file_config.dns.dns_servers {
        config.dns_servers = servers.clone();
    }

    // SMTP
    if let Some(timeout) = file_config.smtp.smtp_timeout {
        config.smtp_timeout = Duration::from_secs(timeout);
    }
    if let Some(port) = file_config.smtp.smtp_port {
        config.smtp_port = port;
    }
    if let Some(ref sender) = file_config.smtp.smtp_sender_email {
        config.smtp_sender_email = sender.trim().to_string();
    }
    if let Some(enable) = file_config.smtp.enable_smtp_checks {
        config.enable_smtp_checks = enable;
    }

    // Providers
    let providers = &file_config.providers;
    if let Some(ref keys) = providers.people_search_keys {
        config.people_search_keys = keys.clone().into_keys();
    }
    if let Some(ref url) = providers.people_search_url {
        config.people_search_url = url.trim().to_string();
    }
    if let Some(ref key) = providers.email_finder_key {
        config.email_finder_key = non_blank(key);
    }
    if let Some(ref url) = providers.email_finder_url {
        config.email_finder_url = url.trim().to_string();
    }
    if let Some(ref key) = providers.verifier_key {
        config.verifier_key = non_blank(key);
    }
    if let Some(ref url) = providers.verifier_url {
        config.verifier_url = url.trim().to_string();
    }
    if let Some(ref url) = providers.registry_url {
        config.registry_url = url.trim().to_string();
    }
    if let Some(enable) = providers.enable_registry_fallback {
        config.enable_registry_fallback = enable;
    }
    if let Some(ref titles) = providers.target_titles {
        if !titles.is_empty() {
            config.target_titles = titles.clone();
        }
    }
    if let Some(max_people) = providers.email_finder_max_people {
        config.email_finder_max_people = max_people;
    }
    if let Some(ref prefixes) = providers.generic_email_prefixes {
        config.generic_email_prefixes = prefixes.iter().map(|p| p.to_lowercase()).collect();
    }

    // Batch
    if let Some(concurrency) = file_config.batch.max_concurrency {
        config.max_concurrency = concurrency;
    }
    if let Some(limit) = file_config.batch.limit {
        config.limit = limit;
    }
    if let Some(verify_limit) = file_config.batch.verify_limit {
        config.verify_limit = verify_limit;
    }
    if let Some(enable) = file_config.batch.verify_unknowns {
        config.verify_unknowns = enable;
    }
}
