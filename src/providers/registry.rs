//! Public registry lookup (NPPES NPI registry, organization records).

use super::{title_case, OfficialName, ProviderError, ProviderResult, RegistryProvider};
use crate::core::config::Config;
use crate::core::models::BusinessRecord;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct RegistryResponse {
    #[serde(default)]
    results: Vec<RegistryEntry>,
}

#[derive(Debug, Deserialize)]
struct RegistryEntry {
    #[serde(default)]
    basic: Basic,
}

#[derive(Debug, Default, Deserialize)]
struct Basic {
    #[serde(default)]
    authorized_official_first_name: Option<String>,
    #[serde(default)]
    authorized_official_last_name: Option<String>,
    #[serde(default)]
    authorized_official_title_or_position: Option<String>,
}

pub struct RegistryClient {
    config: Arc<Config>,
    http_client: Client,
}

impl RegistryClient {
    pub fn new(config: Arc<Config>, http_client: Client) -> Self {
        Self {
            config,
            http_client,
        }
    }
}

#[async_trait]
impl RegistryProvider for RegistryClient {
    async fn authorized_official(
        &self,
        business: &BusinessRecord,
    ) -> ProviderResult<Option<OfficialName>> {
        let url = format!("{}/api/", self.config.registry_url.trim_end_matches('/'));
        let mut params = vec![
            ("version", "2.1"),
            ("enumeration_type", "NPI-2"),
            ("organization_name", business.name.as_str()),
            ("limit", "5"),
        ];
        if !business.state.trim().is_empty() {
            params.push(("state", business.state.trim()));
        }
        if !business.city.trim().is_empty() {
            params.push(("city", business.city.trim()));
        }

        tracing::debug!(target: "provider_task", "Registry lookup for '{}'", business.name);
        let response = self
            .http_client
            .get(&url)
            .query(&params)
            .timeout(self.config.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_response(status, &text));
        }

        let parsed: RegistryResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let official = parsed.results.into_iter().find_map(|entry| {
            let first = title_case(entry.basic.authorized_official_first_name.as_deref()?);
            let last = title_case(entry.basic.authorized_official_last_name.as_deref()?);
            if first.is_empty() || last.is_empty() {
                return None;
            }
            Some(OfficialName {
                first_name: first,
                last_name: last,
                title: entry
                    .basic
                    .authorized_official_title_or_position
                    .map(|t| title_case(&t))
                    .filter(|t| !t.is_empty()),
            })
        });

        match &official {
            Some(o) => tracing::debug!(target: "provider_task",
                "Registry lists {} {} for '{}'", o.first_name, o.last_name, business.name),
            None => tracing::debug!(target: "provider_task",
                "Registry has no authorized official for '{}'", business.name),
        }
        Ok(official)
    }
}
