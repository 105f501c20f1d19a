//! Email-finder adapter (Hunter-style domain search and email finder).

use super::{EmailFinderProvider, FoundEmail, ProviderError, ProviderResult};
use crate::core::config::Config;
use crate::core::models::{CandidateContact, DiscoverySource, EmailStatus};
use crate::utils::roles::role_for_title;
use crate::verification::map_api_status;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Default, Deserialize)]
struct Verification {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DomainSearchData {
    #[serde(default)]
    emails: Vec<DomainEmail>,
}

#[derive(Debug, Deserialize)]
struct DomainEmail {
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    position: Option<String>,
    #[serde(default)]
    confidence: Option<u8>,
    #[serde(default)]
    linkedin: Option<String>,
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    verification: Verification,
}

#[derive(Debug, Deserialize)]
struct FinderData {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    score: Option<u8>,
    #[serde(default)]
    verification: Verification,
}

/// HTTP client for the email-finder API.
pub struct EmailFinderClient {
    config: Arc<Config>,
    http_client: Client,
    api_key: String,
}

impl EmailFinderClient {
    pub fn new(config: Arc<Config>, http_client: Client, api_key: String) -> Self {
        Self {
            config,
            http_client,
            api_key,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.email_finder_url.trim_end_matches('/'), path)
    }

    async fn get_data<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> ProviderResult<T> {
        let response = self
            .http_client
            .get(self.endpoint(path))
            .query(params)
            .query(&[("api_key", self.api_key.as_str())])
            .timeout(self.config.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = ProviderError::from_response(status, &text);
            tracing::warn!(target: "provider_task", "Email finder {} returned {}: {}", path, status, err);
            return Err(err);
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl EmailFinderProvider for EmailFinderClient {
    async fn find_employees(&self, domain: &str) -> ProviderResult<Vec<CandidateContact>> {
        tracing::debug!(target: "provider_task", "Email finder domain search for {}", domain);
        let data: DomainSearchData = self
            .get_data(
                "/v2/domain-search",
                &[("domain", domain), ("type", "personal"), ("limit", "25")],
            )
            .await?;

        let people = data
            .emails
            .into_iter()
            .filter_map(|entry| {
                let first_name = entry.first_name?.trim().to_string();
                let last_name = entry.last_name?.trim().to_string();
                if first_name.is_empty() || last_name.is_empty() {
                    return None;
                }
                let title = entry.position.unwrap_or_default();
                let email_status = entry
                    .verification
                    .status
                    .as_deref()
                    .map(map_api_status)
                    .unwrap_or_default();
                Some(CandidateContact {
                    role: role_for_title(&title),
                    email: entry.value.map(|e| e.trim().to_lowercase()),
                    confidence: entry.confidence.unwrap_or(0).min(100),
                    email_status,
                    first_name,
                    last_name,
                    title,
                    phone: entry.phone_number,
                    profile_url: entry.linkedin,
                    provider_id: None,
                    source: DiscoverySource::EmailFinder,
                })
            })
            .collect::<Vec<_>>();
        tracing::debug!(target: "provider_task", "Domain search for {} found {} named people", domain, people.len());
        Ok(people)
    }

    async fn find_email(
        &self,
        first_name: &str,
        last_name: &str,
        domain: &str,
    ) -> ProviderResult<Option<FoundEmail>> {
        tracing::debug!(target: "provider_task",
            "Email finder lookup for {} {} @ {}", first_name, last_name, domain);
        let data: FinderData = self
            .get_data(
                "/v2/email-finder",
                &[
                    ("domain", domain),
                    ("first_name", first_name),
                    ("last_name", last_name),
                ],
            )
            .await?;

        Ok(data
            .email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .map(|email| FoundEmail {
                email,
                confidence: data.score.unwrap_or(0).min(100),
                status: data
                    .verification
                    .status
                    .as_deref()
                    .map(map_api_status)
                    .unwrap_or(EmailStatus::Unknown),
            }))
    }
}
