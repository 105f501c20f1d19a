//! People-search adapter (Apollo-style mixed people search).

use super::{PeopleQuery, PeopleSearchProvider, ProviderError, ProviderResult};
use crate::core::config::Config;
use crate::core::models::{CandidateContact, DiscoverySource, EmailStatus};
use crate::utils::roles::role_for_title;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Placeholder the provider returns when an address exists but is locked.
const LOCKED_EMAIL_MARKER: &str = "email_not_unlocked";

/// Confidence derived from the provider's own email status tag.
pub fn confidence_for_email_status(tag: Option<&str>) -> u8 {
    match tag.map(|t| t.trim().to_lowercase()).as_deref() {
        Some("verified") => 95,
        Some("guessed") | Some("likely") | Some("likely to engage") | Some("extrapolated") => 70,
        _ => 65,
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    person_titles: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    q_organization_domains: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    q_organization_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    person_locations: Vec<String>,
    page: u32,
    per_page: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    people: Vec<Person>,
    #[serde(default)]
    contacts: Vec<Person>,
}

#[derive(Debug, Deserialize)]
struct PhoneNumber {
    #[serde(default)]
    sanitized_number: Option<String>,
    #[serde(default)]
    raw_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Person {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_status: Option<String>,
    #[serde(default)]
    linkedin_url: Option<String>,
    #[serde(default)]
    phone_numbers: Vec<PhoneNumber>,
}

impl Person {
    fn into_candidate(self) -> Option<CandidateContact> {
        let first_name = self.first_name?.trim().to_string();
        let last_name = self.last_name?.trim().to_string();
        if first_name.is_empty() || last_name.is_empty() {
            return None;
        }
        let email = self
            .email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty() && !e.contains(LOCKED_EMAIL_MARKER));
        let verified = self
            .email_status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("verified"));
        let title = self.title.unwrap_or_default();
        let phone = self
            .phone_numbers
            .into_iter()
            .find_map(|p| p.sanitized_number.or(p.raw_number));

        Some(CandidateContact {
            role: role_for_title(&title),
            confidence: confidence_for_email_status(self.email_status.as_deref()),
            email_status: if verified && email.is_some() {
                EmailStatus::Valid
            } else {
                EmailStatus::Unknown
            },
            first_name,
            last_name,
            title,
            email,
            phone,
            profile_url: self.linkedin_url,
            provider_id: self.id,
            source: DiscoverySource::PeopleSearch,
        })
    }
}

/// HTTP client for the people-search API. The credential is supplied per call
/// so the caller controls rotation.
pub struct PeopleSearchClient {
    config: Arc<Config>,
    http_client: Client,
}

impl PeopleSearchClient {
    pub fn new(config: Arc<Config>, http_client: Client) -> Self {
        Self {
            config,
            http_client,
        }
    }
}

#[async_trait]
impl PeopleSearchProvider for PeopleSearchClient {
    async fn search_people(
        &self,
        credential: &str,
        query: &PeopleQuery,
    ) -> ProviderResult<Vec<CandidateContact>> {
        let url = format!(
            "{}/v1/mixed_people/search",
            self.config.people_search_url.trim_end_matches('/')
        );
        let body = SearchRequest {
            person_titles: &query.titles,
            q_organization_domains: query.domain.as_deref(),
            q_organization_name: query
                .domain
                .is_none()
                .then_some(query.organization_name.as_str()),
            person_locations: query.location().into_iter().collect(),
            page: 1,
            per_page: 10,
        };

        tracing::debug!(target: "provider_task",
            "People search for '{}' (domain: {:?})", query.organization_name, query.domain);

        let response = self
            .http_client
            .post(&url)
            .header("X-Api-Key", credential)
            .header("Cache-Control", "no-cache")
            .json(&body)
            .timeout(self.config.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = ProviderError::from_response(status, &text);
            tracing::warn!(target: "provider_task", "People search returned {}: {}", status, err);
            return Err(err);
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let candidates: Vec<CandidateContact> = parsed
            .people
            .into_iter()
            .chain(parsed.contacts)
            .filter_map(Person::into_candidate)
            .collect();
        tracing::debug!(target: "provider_task",
            "People search for '{}' returned {} named people", query.organization_name, candidates.len());
        Ok(candidates)
    }
}
