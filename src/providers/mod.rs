//! Discovery provider adapters.
//!
//! Each adapter translates one vendor's wire format into [`CandidateContact`]s
//! so the cascade never touches provider-specific JSON.

pub mod email_finder;
pub mod people_search;
pub mod registry;

pub use email_finder::EmailFinderClient;
pub use people_search::PeopleSearchClient;
pub use registry::RegistryClient;

use crate::core::config::Config;
use crate::core::models::{BusinessRecord, CandidateContact, EmailStatus};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use thiserror::Error;

/// Failure of a single provider call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider rejected the credential")]
    Unauthorized,

    #[error("provider denied access to this endpoint")]
    AccessDenied,

    #[error("provider rate limit reached")]
    RateLimited,

    #[error("provider quota or credits exhausted")]
    QuotaExhausted,

    #[error("provider returned HTTP {0}")]
    Status(u16),

    #[error("provider request failed: {0}")]
    Transport(String),

    #[error("could not decode provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// True when the credential used must not be used again this run.
    pub fn exhausts_credential(&self) -> bool {
        matches!(
            self,
            ProviderError::Unauthorized
                | ProviderError::AccessDenied
                | ProviderError::RateLimited
                | ProviderError::QuotaExhausted
        )
    }

    /// Classifies a non-success response. The body is inspected because some
    /// vendors report spent credits under 403 or 429.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let body = body.to_lowercase();
        let mentions_quota = ["quota", "credit", "usage limit", "usage_limit", "plan limit"]
            .iter()
            .any(|needle| body.contains(needle));
        match status {
            StatusCode::PAYMENT_REQUIRED => ProviderError::QuotaExhausted,
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS if mentions_quota => {
                ProviderError::QuotaExhausted
            }
            StatusCode::UNAUTHORIZED => ProviderError::Unauthorized,
            StatusCode::FORBIDDEN => ProviderError::AccessDenied,
            StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
            other => ProviderError::Status(other.as_u16()),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::Decode(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Search constraints for the people-search provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeopleQuery {
    pub domain: Option<String>,
    pub organization_name: String,
    pub city: String,
    pub state: String,
    pub titles: Vec<String>,
}

impl PeopleQuery {
    pub fn for_business(business: &BusinessRecord, domain: Option<&str>, titles: &[String]) -> Self {
        Self {
            domain: domain.map(str::to_string),
            organization_name: business.name.clone(),
            city: business.city.clone(),
            state: business.state.clone(),
            titles: titles.to_vec(),
        }
    }

    /// "City, ST", or whichever half is present.
    pub fn location(&self) -> Option<String> {
        match (self.city.trim(), self.state.trim()) {
            ("", "") => None,
            (city, "") => Some(city.to_string()),
            ("", state) => Some(state.to_string()),
            (city, state) => Some(format!("{}, {}", city, state)),
        }
    }
}

/// An address the email finder produced for a specific person.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundEmail {
    pub email: String,
    pub confidence: u8,
    pub status: EmailStatus,
}

/// A named official pulled from a public registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfficialName {
    pub first_name: String,
    pub last_name: String,
    pub title: Option<String>,
}

/// Rich people search, called with an explicit credential from the pool.
#[async_trait]
pub trait PeopleSearchProvider: Send + Sync {
    async fn search_people(
        &self,
        credential: &str,
        query: &PeopleQuery,
    ) -> ProviderResult<Vec<CandidateContact>>;
}

/// Domain employee listing plus per-person email lookup.
#[async_trait]
pub trait EmailFinderProvider: Send + Sync {
    /// Named people at `domain`. Emails may be absent.
    async fn find_employees(&self, domain: &str) -> ProviderResult<Vec<CandidateContact>>;

    async fn find_email(
        &self,
        first_name: &str,
        last_name: &str,
        domain: &str,
    ) -> ProviderResult<Option<FoundEmail>>;
}

/// Organization to authorized-official lookup in a public registry.
#[async_trait]
pub trait RegistryProvider: Send + Sync {
    async fn authorized_official(
        &self,
        business: &BusinessRecord,
    ) -> ProviderResult<Option<OfficialName>>;
}

/// The configured set of providers. Absent entries are skipped by the cascade.
#[derive(Clone, Default)]
pub struct Providers {
    pub people_search: Option<Arc<dyn PeopleSearchProvider>>,
    pub email_finder: Option<Arc<dyn EmailFinderProvider>>,
    pub registry: Option<Arc<dyn RegistryProvider>>,
}

impl Providers {
    /// Builds the HTTP-backed adapters that have the configuration they need.
    pub fn from_config(config: Arc<Config>, http_client: Client) -> Self {
        let people_search: Option<Arc<dyn PeopleSearchProvider>> =
            if config.people_search_keys.is_empty() {
                None
            } else {
                Some(Arc::new(PeopleSearchClient::new(
                    config.clone(),
                    http_client.clone(),
                )))
            };
        let email_finder: Option<Arc<dyn EmailFinderProvider>> = config
            .email_finder_key
            .clone()
            .map(|key| {
                Arc::new(EmailFinderClient::new(config.clone(), http_client.clone(), key))
                    as Arc<dyn EmailFinderProvider>
            });
        let registry: Option<Arc<dyn RegistryProvider>> = if config.enable_registry_fallback {
            Some(Arc::new(RegistryClient::new(config.clone(), http_client)))
        } else {
            None
        };

        tracing::debug!(target: "provider_task",
            "Providers configured: people_search={} email_finder={} registry={}",
            people_search.is_some(),
            email_finder.is_some(),
            registry.is_some()
        );
        Self {
            people_search,
            email_finder,
            registry,
        }
    }
}

/// Title-cases a registry-style name ("JOHN" -> "John", "MARY-KATE" -> "Mary-Kate").
pub(crate) fn title_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut start_of_word = true;
    for c in raw.trim().chars() {
        if c.is_alphabetic() {
            if start_of_word {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            start_of_word = false;
        } else {
            out.push(c);
            start_of_word = true;
        }
    }
    out
}
