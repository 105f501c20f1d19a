//! Runtime configuration: defaults, the TOML file shape, and helpers.

mod builder;
mod loading;
mod validation;

pub use builder::ConfigBuilder;

pub use crate::core::error::Result;

use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

/// Upper bound on concurrent cascade workers.
pub const MAX_CONCURRENCY: usize = 6;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+\-']+@[a-zA-Z0-9](?:[a-zA-Z0-9\-]*[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9\-]*[a-zA-Z0-9])?)*\.[a-zA-Z]{2,}$")
        .expect("email regex is valid")
});

const DEFAULT_TARGET_TITLES: &[&str] = &[
    "owner",
    "founder",
    "co-founder",
    "ceo",
    "president",
    "medical director",
    "clinic director",
    "practice manager",
    "clinic manager",
    "office manager",
    "practice administrator",
    "administrator",
    "marketing director",
    "director of marketing",
    "operations manager",
    "director of operations",
];

const DEFAULT_GENERIC_PREFIXES: &[&str] = &[
    "info",
    "contact",
    "office",
    "admin",
    "support",
    "sales",
    "hr",
    "noreply",
    "no-reply",
    "hello",
    "help",
    "team",
    "mail",
    "reception",
    "frontdesk",
    "front.desk",
    "appointments",
    "billing",
    "marketing",
    "careers",
    "jobs",
    "enquiries",
    "inquiries",
    "webmaster",
    "postmaster",
];

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // Network
    pub request_timeout: Duration,
    pub user_agent: String,
    /// Jitter range in seconds applied between outbound provider calls.
    pub sleep_between_requests: (f32, f32),

    // DNS
    pub dns_timeout: Duration,
    pub dns_servers: Vec<String>,

    // SMTP
    pub smtp_timeout: Duration,
    pub smtp_port: u16,
    pub smtp_sender_email: String,
    pub enable_smtp_checks: bool,

    // Providers
    pub people_search_keys: Vec<String>,
    pub people_search_url: String,
    pub email_finder_key: Option<String>,
    pub email_finder_url: String,
    pub verifier_key: Option<String>,
    pub verifier_url: String,
    pub registry_url: String,
    pub enable_registry_fallback: bool,
    pub target_titles: Vec<String>,
    pub email_finder_max_people: usize,
    pub generic_email_prefixes: HashSet<String>,

    // Batch
    pub max_concurrency: usize,
    pub limit: usize,
    pub verify_limit: usize,
    pub verify_unknowns: bool,

    pub email_regex: Regex,
    pub loaded_config_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            user_agent: format!("lead-sleuth/{}", env!("CARGO_PKG_VERSION")),
            sleep_between_requests: (0.1, 0.4),

            dns_timeout: Duration::from_secs(5),
            dns_servers: vec!["8.8.8.8".to_string(), "1.1.1.1".to_string()],

            smtp_timeout: Duration::from_secs(9),
            smtp_port: 25,
            smtp_sender_email: "verify@lead-sleuth.dev".to_string(),
            enable_smtp_checks: true,

            people_search_keys: Vec::new(),
            people_search_url: "https://api.apollo.io".to_string(),
            email_finder_key: None,
            email_finder_url: "https://api.hunter.io".to_string(),
            verifier_key: None,
            verifier_url: "https://api.verifier.example".to_string(),
            registry_url: "https://npiregistry.cms.hhs.gov".to_string(),
            enable_registry_fallback: true,
            target_titles: DEFAULT_TARGET_TITLES.iter().map(|s| s.to_string()).collect(),
            email_finder_max_people: 3,
            generic_email_prefixes: DEFAULT_GENERIC_PREFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),

            max_concurrency: 3,
            limit: 25,
            verify_limit: 50,
            verify_unknowns: true,

            email_regex: EMAIL_REGEX.clone(),
            loaded_config_path: None,
        }
    }
}

impl Config {
    /// True when at least one discovery stage can run: a people-search key,
    /// an email-finder key, or a verifier key with the registry fallback on.
    pub fn has_discovery_credentials(&self) -> bool {
        !self.people_search_keys.is_empty()
            || self.email_finder_key.is_some()
            || (self.verifier_key.is_some() && self.enable_registry_fallback)
    }

    /// Domain used in the SMTP `HELO` greeting.
    pub fn helo_domain(&self) -> &str {
        self.smtp_sender_email
            .split('@')
            .nth(1)
            .filter(|d| !d.is_empty())
            .unwrap_or("localhost")
    }
}

/// Random pause within the configured jitter range.
pub fn get_random_sleep_duration(config: &Config) -> Duration {
    let (min, max) = config.sleep_between_requests;
    if max <= 0.0 {
        return Duration::ZERO;
    }
    let secs = if max > min {
        rand::thread_rng().gen_range(min..max)
    } else {
        min
    };
    Duration::from_secs_f32(secs.max(0.0))
}

/// Credentials may be written as a TOML array or a single comma-separated string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum KeyList {
    Many(Vec<String>),
    Joined(String),
}

impl KeyList {
    pub fn into_keys(self) -> Vec<String> {
        match self {
            KeyList::Many(keys) => keys,
            KeyList::Joined(joined) => joined
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    pub request_timeout: Option<u64>,
    pub user_agent: Option<String>,
    pub min_sleep: Option<f32>,
    pub max_sleep: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DnsSection {
    pub dns_timeout: Option<u64>,
    pub dns_servers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SmtpSection {
    pub smtp_timeout: Option<u64>,
    pub smtp_port: Option<u16>,
    pub smtp_sender_email: Option<String>,
    pub enable_smtp_checks: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersSection {
    pub people_search_keys: Option<KeyList>,
    pub people_search_url: Option<String>,
    pub email_finder_key: Option<String>,
    pub email_finder_url: Option<String>,
    pub verifier_key: Option<String>,
    pub verifier_url: Option<String>,
    pub registry_url: Option<String>,
    pub enable_registry_fallback: Option<bool>,
    pub target_titles: Option<Vec<String>>,
    pub email_finder_max_people: Option<usize>,
    pub generic_email_prefixes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BatchSection {
    pub max_concurrency: Option<usize>,
    pub limit: Option<usize>,
    pub verify_limit: Option<usize>,
    pub verify_unknowns: Option<bool>,
}

/// Shape of the optional TOML configuration file. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub network: NetworkSection,
    pub dns: DnsSection,
    pub smtp: SmtpSection,
    pub providers: ProvidersSection,
    pub batch: BatchSection,
}
