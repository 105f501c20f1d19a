//! Scripted providers, verifier and config shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use lead_sleuth_core::providers::{
    EmailFinderProvider, FoundEmail, OfficialName, PeopleQuery, PeopleSearchProvider,
    ProviderError, ProviderResult, Providers, RegistryProvider,
};
use lead_sleuth_core::verification::EmailVerifier;
use lead_sleuth_core::{
    role_for_title, BusinessRecord, CandidateContact, Config, DiscoverySource, EmailStatus,
    ProviderCascade, VerificationResult,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub fn test_config(people_search_keys: &[&str]) -> Config {
    let mut config = Config::default();
    config.sleep_between_requests = (0.0, 0.0);
    config.people_search_keys = people_search_keys.iter().map(|k| k.to_string()).collect();
    config.max_concurrency = 2;
    config
}

pub fn business(id: &str, name: &str, website: Option<&str>) -> BusinessRecord {
    BusinessRecord {
        id: id.into(),
        name: name.into(),
        website: website.map(str::to_string),
        city: "Austin".into(),
        state: "TX".into(),
        phone: Some("+1 512 555 0100".into()),
        updated_at: None,
    }
}

pub fn person(
    first: &str,
    last: &str,
    title: &str,
    email: Option<&str>,
    confidence: u8,
    status: EmailStatus,
) -> CandidateContact {
    CandidateContact {
        first_name: first.into(),
        last_name: last.into(),
        title: title.into(),
        role: role_for_title(title),
        email: email.map(str::to_string),
        phone: None,
        profile_url: None,
        confidence,
        email_status: status,
        provider_id: Some(format!("{}-{}", first.to_lowercase(), last.to_lowercase())),
        source: DiscoverySource::PeopleSearch,
    }
}

/// Answers per credential. Unlisted credentials return an empty result.
#[derive(Default)]
pub struct ScriptedPeopleSearch {
    pub responses: HashMap<String, ProviderResult<Vec<CandidateContact>>>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedPeopleSearch {
    pub fn returning(people: Vec<CandidateContact>, keys: &[&str]) -> Self {
        let mut scripted = Self::default();
        for key in keys {
            scripted.responses.insert(key.to_string(), Ok(people.clone()));
        }
        scripted
    }

    pub fn with(mut self, key: &str, response: ProviderResult<Vec<CandidateContact>>) -> Self {
        self.responses.insert(key.to_string(), response);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl PeopleSearchProvider for ScriptedPeopleSearch {
    async fn search_people(
        &self,
        credential: &str,
        _query: &PeopleQuery,
    ) -> ProviderResult<Vec<CandidateContact>> {
        self.calls.lock().push(credential.to_string());
        self.responses
            .get(credential)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub struct ScriptedFinder {
    pub employees: ProviderResult<Vec<CandidateContact>>,
    pub emails: HashMap<(String, String), ProviderResult<Option<FoundEmail>>>,
    pub employee_calls: AtomicUsize,
    pub email_calls: AtomicUsize,
}

impl ScriptedFinder {
    pub fn new(employees: ProviderResult<Vec<CandidateContact>>) -> Self {
        Self {
            employees,
            emails: HashMap::new(),
            employee_calls: AtomicUsize::new(0),
            email_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_email(
        mut self,
        first: &str,
        last: &str,
        response: ProviderResult<Option<FoundEmail>>,
    ) -> Self {
        self.emails.insert((first.into(), last.into()), response);
        self
    }
}

#[async_trait]
impl EmailFinderProvider for ScriptedFinder {
    async fn find_employees(&self, _domain: &str) -> ProviderResult<Vec<CandidateContact>> {
        self.employee_calls.fetch_add(1, Ordering::SeqCst);
        self.employees.clone()
    }

    async fn find_email(
        &self,
        first_name: &str,
        last_name: &str,
        _domain: &str,
    ) -> ProviderResult<Option<FoundEmail>> {
        self.email_calls.fetch_add(1, Ordering::SeqCst);
        self.emails
            .get(&(first_name.to_string(), last_name.to_string()))
            .cloned()
            .unwrap_or(Ok(None))
    }
}

pub struct FixedRegistry(pub Option<OfficialName>);

#[async_trait]
impl RegistryProvider for FixedRegistry {
    async fn authorized_official(
        &self,
        _business: &BusinessRecord,
    ) -> ProviderResult<Option<OfficialName>> {
        Ok(self.0.clone())
    }
}

pub struct FailingRegistry;

#[async_trait]
impl RegistryProvider for FailingRegistry {
    async fn authorized_official(
        &self,
        _business: &BusinessRecord,
    ) -> ProviderResult<Option<OfficialName>> {
        Err(ProviderError::Status(500))
    }
}

/// Verdicts per address. Unlisted addresses come back unknown.
pub struct ScriptedVerifier {
    pub api: bool,
    pub verdicts: HashMap<String, EmailStatus>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedVerifier {
    pub fn new(api: bool) -> Self {
        Self {
            api,
            verdicts: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, email: &str, status: EmailStatus) -> Self {
        self.verdicts.insert(email.to_string(), status);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn verdict(&self, email: &str) -> VerificationResult {
        self.calls.lock().push(email.to_string());
        match self.verdicts.get(email) {
            Some(status) => VerificationResult::new(*status, format!("api_{}", status)),
            None => VerificationResult::unknown("api_unknown"),
        }
    }
}

#[async_trait]
impl EmailVerifier for ScriptedVerifier {
    fn has_api(&self) -> bool {
        self.api
    }

    async fn verify_via_api(&self, email: &str) -> Option<VerificationResult> {
        if !self.api {
            return None;
        }
        Some(self.verdict(email))
    }

    async fn verify(&self, email: &str) -> VerificationResult {
        self.verdict(email)
    }
}

pub fn cascade(config: Config, providers: Providers, verifier: Arc<ScriptedVerifier>) -> ProviderCascade {
    ProviderCascade::new(Arc::new(config), providers, verifier)
}
