//! Client for the third-party email verification API.

use crate::core::config::Config;
use crate::core::models::{EmailStatus, VerificationResult};
use crate::utils::patterns::is_valid_syntax;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;

/// Maps the provider's status vocabulary onto the four-way status.
pub fn map_api_status(raw: &str) -> EmailStatus {
    match raw.trim().to_lowercase().as_str() {
        "deliverable" | "safe" | "verified" | "valid" | "ok" => EmailStatus::Valid,
        "undeliverable" | "bounce" | "bounced" | "invalid" | "rejected" => EmailStatus::Invalid,
        "catch-all" | "catch_all" | "catchall" | "accept-all" | "accept_all" | "risky" => {
            EmailStatus::Risky
        }
        _ => EmailStatus::Unknown,
    }
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    result: Option<String>,
}

/// Verification API client. One request per address, no retries.
#[derive(Clone)]
pub struct ApiVerifier {
    config: Arc<Config>,
    http_client: Client,
    api_key: String,
}

impl ApiVerifier {
    /// Returns `None` when no verifier key is configured.
    pub fn from_config(config: Arc<Config>, http_client: Client) -> Option<Self> {
        let api_key = config.verifier_key.clone()?;
        Some(Self {
            config,
            http_client,
            api_key,
        })
    }

    /// Classifies `email`. Network trouble and unexpected replies come back as
    /// unknown; only the provider's own verdict or a 400/422 makes it invalid.
    pub async fn verify(&self, email: &str) -> VerificationResult {
        let email = email.trim();
        let task_label = format!("[Verifier API: {}]", email);

        if !is_valid_syntax(&self.config, email) {
            tracing::debug!(target: "verification_api", "{} Malformed address, not sent.", task_label);
            return VerificationResult::invalid_syntax();
        }

        let url = format!("{}/v1/verify", self.config.verifier_url.trim_end_matches('/'));
        tracing::debug!(target: "verification_api", "{} Sending GET {}", task_label, url);

        let response = match self
            .http_client
            .get(&url)
            .query(&[("email", email)])
            .bearer_auth(&self.api_key)
            .timeout(self.config.request_timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                if e.is_timeout() {
                    tracing::warn!(target: "verification_api", "{} Request timed out: {}", task_label, e);
                    return VerificationResult::unknown("api_timeout");
                }
                tracing::error!(target: "verification_api", "{} Request failed: {}", task_label, e);
                return VerificationResult::unknown("api_unreachable");
            }
        };

        let status = response.status();
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                tracing::info!(target: "verification_api", "{} Provider rejected the address ({}).", task_label, status);
                return VerificationResult::new(EmailStatus::Invalid, "api_rejected_input");
            }
            s if !s.is_success() => {
                tracing::warn!(target: "verification_api", "{} Unexpected status {}.", task_label, s);
                return VerificationResult::unknown(format!("api_http_{}", s.as_u16()));
            }
            _ => {}
        }

        let body: VerifyResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(target: "verification_api", "{} Could not decode response: {}", task_label, e);
                return VerificationResult::unknown("api_bad_response");
            }
        };

        let Some(raw) = body.status.or(body.result) else {
            tracing::warn!(target: "verification_api", "{} Response carried no status field.", task_label);
            return VerificationResult::unknown("api_bad_response");
        };
        let mapped = map_api_status(&raw);
        let reason = format!("api_{}", raw.trim().to_lowercase().replace(['-', ' '], "_"));
        tracing::info!(target: "verification_api", "{} Provider said '{}' -> {}", task_label, raw, mapped);
        VerificationResult::new(mapped, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn verifier(server: &MockServer) -> ApiVerifier {
        let mut config = Config::default();
        config.verifier_key = Some("vk-test".into());
        config.verifier_url = server.uri();
        config.request_timeout = Duration::from_secs(2);
        ApiVerifier::from_config(Arc::new(config), Client::new()).unwrap()
    }

    #[test]
    fn vocabulary_mapping() {
        assert_eq!(map_api_status("deliverable"), EmailStatus::Valid);
        assert_eq!(map_api_status("SAFE"), EmailStatus::Valid);
        assert_eq!(map_api_status("verified"), EmailStatus::Valid);
        assert_eq!(map_api_status("undeliverable"), EmailStatus::Invalid);
        assert_eq!(map_api_status("bounce"), EmailStatus::Invalid);
        assert_eq!(map_api_status("catch-all"), EmailStatus::Risky);
        assert_eq!(map_api_status("accept_all"), EmailStatus::Risky);
        assert_eq!(map_api_status("unknown"), EmailStatus::Unknown);
        assert_eq!(map_api_status("something new"), EmailStatus::Unknown);
    }

    #[test]
    fn no_key_means_no_client() {
        assert!(ApiVerifier::from_config(Arc::new(Config::default()), Client::new()).is_none());
    }

    #[tokio::test]
    async fn sends_key_and_maps_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/verify"))
            .and(query_param("email", "jane.doe@oakstreetclinic.com"))
            .and(header("authorization", "Bearer vk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "deliverable"})))
            .expect(1)
            .mount(&server)
            .await;

        let result = verifier(&server).verify("jane.doe@oakstreetclinic.com").await;
        assert_eq!(result.status, EmailStatus::Valid);
        assert_eq!(result.reason, "api_deliverable");
    }

    #[tokio::test]
    async fn result_field_is_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "catch-all"})))
            .mount(&server)
            .await;

        let result = verifier(&server).verify("jane@oakstreetclinic.com").await;
        assert_eq!(result.status, EmailStatus::Risky);
        assert_eq!(result.reason, "api_catch_all");
    }

    #[tokio::test]
    async fn unprocessable_input_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(422))
            .mount(&server)
            .await;

        let result = verifier(&server).verify("jane@oakstreetclinic.com").await;
        assert_eq!(result.status, EmailStatus::Invalid);
    }

    #[tokio::test]
    async fn server_errors_are_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = verifier(&server).verify("jane@oakstreetclinic.com").await;
        assert_eq!(result.status, EmailStatus::Unknown);
        assert_eq!(result.reason, "api_http_503");
    }

    #[tokio::test]
    async fn slow_provider_is_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "deliverable"}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let result = verifier(&server).verify("jane@oakstreetclinic.com").await;
        assert_eq!(result.status, EmailStatus::Unknown);
        assert_eq!(result.reason, "api_timeout");
    }

    #[tokio::test]
    async fn malformed_address_is_never_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "valid"})))
            .expect(0)
            .mount(&server)
            .await;

        let result = verifier(&server).verify("not-an-address").await;
        assert_eq!(result, VerificationResult::invalid_syntax());
    }

    #[tokio::test]
    async fn garbage_body_is_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let result = verifier(&server).verify("jane@oakstreetclinic.com").await;
        assert_eq!(result.status, EmailStatus::Unknown);
        assert_eq!(result.reason, "api_bad_response");
    }
}
