//! Provides the `ConfigBuilder` for fluent configuration construction.

use super::loading::{apply_file_config, load_config_file};
use super::validation::validate_config;
use super::{Config, ConfigFile, KeyList, Result};
use crate::AppError;
use std::path::Path;
use std::time::Duration;

/// Builder pattern for creating `Config` instances fluently.
///
/// Defaults are layered under an optional TOML file, which is layered under
/// the explicit overrides set on the builder. Validation runs last.
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
    config_file_path: Option<String>,
    overrides: ConfigFile,
}

impl ConfigBuilder {
    /// Creates a new builder with default configuration values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Specify an optional configuration file path to load.
    pub fn config_file(mut self, path: impl Into<String>) -> Self {
        self.config_file_path = Some(path.into());
        self
    }

    pub fn max_concurrency(mut self, value: usize) -> Self {
        self.overrides.batch.max_concurrency = Some(value);
        self
    }
    pub fn limit(mut self, value: usize) -> Self {
        self.overrides.batch.limit = Some(value);
        self
    }
    pub fn verify_limit(mut self, value: usize) -> Self {
        self.overrides.batch.verify_limit = Some(value);
        self
    }
    pub fn verify_unknowns(mut self, enable: bool) -> Self {
        self.overrides.batch.verify_unknowns = Some(enable);
        self
    }
    pub fn sleep_between_requests(mut self, min: f32, max: f32) -> Self {
        self.overrides.network.min_sleep = Some(min);
        self.overrides.network.max_sleep = Some(max);
        self
    }
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.overrides.network.request_timeout = Some(duration.as_secs());
        self
    }
    pub fn user_agent(mut self, value: impl Into<String>) -> Self {
        self.overrides.network.user_agent = Some(value.into());
        self
    }
    pub fn dns_timeout(mut self, duration: Duration) -> Self {
        self.overrides.dns.dns_timeout = Some(duration.as_secs());
        self
    }
    pub fn dns_servers(mut self, servers: Vec<String>) -> Self {
        self.overrides.dns.dns_servers = Some(servers);
        self
    }
    pub fn smtp_timeout(mut self, duration: Duration) -> Self {
        self.overrides.smtp.smtp_timeout = Some(duration.as_secs());
        self
    }
    pub fn smtp_port(mut self, port: u16) -> Self {
        self.overrides.smtp.smtp_port = Some(port);
        self
    }
    pub fn smtp_sender_email(mut self, value: impl Into<String>) -> Self {
        self.overrides.smtp.smtp_sender_email = Some(value.into());
        self
    }
    pub fn enable_smtp_checks(mut self, enable: bool) -> Self {
        self.overrides.smtp.enable_smtp_checks = Some(enable);
        self
    }
    pub fn people_search_keys(mut self, keys: Vec<String>) -> Self {
        self.overrides.providers.people_search_keys = Some(KeyList::Many(keys));
        self
    }
    pub fn people_search_url(mut self, url: impl Into<String>) -> Self {
        self.overrides.providers.people_search_url = Some(url.into());
        self
    }
    pub fn email_finder_key(mut self, key: impl Into<String>) -> Self {
        self.overrides.providers.email_finder_key = Some(key.into());
        self
    }
    pub fn email_finder_url(mut self, url: impl Into<String>) -> Self {
        self.overrides.providers.email_finder_url = Some(url.into());
        self
    }
    pub fn verifier_key(mut self, key: impl Into<String>) -> Self {
        self.overrides.providers.verifier_key = Some(key.into());
        self
    }
    pub fn verifier_url(mut self, url: impl Into<String>) -> Self {
        self.overrides.providers.verifier_url = Some(url.into());
        self
    }
    pub fn registry_url(mut self, url: impl Into<String>) -> Self {
        self.overrides.providers.registry_url = Some(url.into());
        self
    }
    pub fn enable_registry_fallback(mut self, enable: bool) -> Self {
        self.overrides.providers.enable_registry_fallback = Some(enable);
        self
    }
    pub fn target_titles(mut self, titles: Vec<String>) -> Self {
        self.overrides.providers.target_titles = Some(titles);
        self
    }
    pub fn email_finder_max_people(mut self, value: usize) -> Self {
        self.overrides.providers.email_finder_max_people = Some(value);
        self
    }
    pub fn generic_email_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.overrides.providers.generic_email_prefixes = Some(prefixes);
        self
    }

    /// Builds the final `Config` object, applying defaults, file settings, overrides, and validation.
    pub fn build(mut self) -> Result<Config> {
        let mut loaded_path: Option<String> = None;

        if let Some(ref path) = self.config_file_path {
            match load_config_file(path) {
                Ok(file_config) => {
                    apply_file_config(&mut self.config, &file_config);
                    loaded_path = Some(path.clone());
                    tracing::info!("Loaded base configuration from specified file: {}", path);
                }
                Err(e) => {
                    tracing::error!("Failed to load specified config file '{}': {}", path, e);
                    return Err(AppError::Config(format!(
                        "Failed to load specified configuration file '{}': {}",
                        path, e
                    )));
                }
            }
        } else {
            tracing::debug!("No config file specified, checking default locations.");
            for path_str in ["./lead-sleuth.toml", "./config.toml"] {
                if Path::new(path_str).exists() {
                    tracing::debug!("Found potential default config file: {}", path_str);
                    match load_config_file(path_str) {
                        Ok(file_config) => {
                            apply_file_config(&mut self.config, &file_config);
                            loaded_path = Some(path_str.to_string());
                            tracing::info!(
                                "Loaded base configuration from default location: {}",
                                path_str
                            );
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(
                                "Failed to load or parse default config '{}': {}",
                                path_str,
                                e
                            );
                        }
                    }
                }
            }
            if loaded_path.is_none() {
                tracing::info!("No configuration file found. Using default values and overrides.");
            }
        }

        apply_file_config(&mut self.config, &self.overrides);
        self.config.loaded_config_path = loaded_path;
        validate_config(&mut self.config)?;

        tracing::debug!("Final configuration built successfully.");
        Ok(self.config)
    }
}
