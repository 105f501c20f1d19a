//! The provider cascade: people search, then the email finder, then a
//! registry-name guess, with a final verification of whatever was accepted.

use crate::core::config::{get_random_sleep_duration, Config};
use crate::core::credentials::CredentialPool;
use crate::core::models::{
    BusinessRecord, CandidateContact, DiscoverySource, EmailStatus, VerificationResult,
};
use crate::providers::{PeopleQuery, ProviderError, Providers};
use crate::utils::domain::extract_mail_domain;
use crate::utils::patterns::{generate_email_patterns, is_generic_email, is_valid_syntax};
use crate::utils::roles::{decision_maker_score, role_for_title, title_priority};
use crate::verification::EmailVerifier;

use std::cmp::Reverse;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Confidence assigned to registry guesses by final status.
const REGISTRY_CONFIDENCE_VALID: u8 = 75;
const REGISTRY_CONFIDENCE_RISKY: u8 = 50;
const REGISTRY_CONFIDENCE_UNKNOWN: u8 = 40;

/// Title given to registry officials that carry no position.
const REGISTRY_DEFAULT_TITLE: &str = "Authorized Official";

/// State shared by every worker of one batch run.
#[derive(Debug)]
pub struct RunState {
    pub credentials: CredentialPool,
    email_finder_disabled: AtomicBool,
    email_finder_quota_exhausted: AtomicBool,
    email_finder_restricted: AtomicBool,
    people_search_restricted: AtomicBool,
}

impl RunState {
    pub fn new(credentials: CredentialPool) -> Self {
        Self {
            credentials,
            email_finder_disabled: AtomicBool::new(false),
            email_finder_quota_exhausted: AtomicBool::new(false),
            email_finder_restricted: AtomicBool::new(false),
            people_search_restricted: AtomicBool::new(false),
        }
    }

    pub fn email_finder_disabled(&self) -> bool {
        self.email_finder_disabled.load(Ordering::SeqCst)
    }

    pub fn email_finder_quota_exhausted(&self) -> bool {
        self.email_finder_quota_exhausted.load(Ordering::SeqCst)
    }

    pub fn email_finder_restricted(&self) -> bool {
        self.email_finder_restricted.load(Ordering::SeqCst)
    }

    pub fn people_search_restricted(&self) -> bool {
        self.people_search_restricted.load(Ordering::SeqCst)
    }
}

/// A candidate the cascade settled on, with its final verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedContact {
    pub candidate: CandidateContact,
    pub verification: VerificationResult,
}

/// Orders candidates best first: provider-verified email, then title
/// priority, then confidence. The sort is stable so provider order breaks
/// remaining ties.
pub fn rank_candidates(candidates: &mut [CandidateContact]) {
    candidates.sort_by_key(|c| {
        (
            Reverse(c.email_status == EmailStatus::Valid),
            title_priority(&c.title),
            Reverse(c.confidence),
        )
    });
}

/// Runs the discovery cascade for single business records.
#[derive(Clone)]
pub struct ProviderCascade {
    config: Arc<Config>,
    providers: Providers,
    verifier: Arc<dyn EmailVerifier>,
}

impl ProviderCascade {
    pub fn new(config: Arc<Config>, providers: Providers, verifier: Arc<dyn EmailVerifier>) -> Self {
        Self {
            config,
            providers,
            verifier,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn verifier(&self) -> &Arc<dyn EmailVerifier> {
        &self.verifier
    }

    /// Fresh run state with an unexhausted credential pool.
    pub fn new_run(&self) -> RunState {
        RunState::new(CredentialPool::new(self.config.people_search_keys.clone()))
    }

    /// Finds and verifies one decision-maker contact for `business`.
    ///
    /// Stages run strictly in order and a later stage only runs when every
    /// earlier one came back empty. Returns `None` when nothing usable exists.
    pub async fn discover(&self, business: &BusinessRecord, run: &RunState) -> Option<AcceptedContact> {
        let label = format!("{} ({})", business.name, business.id);
        let Some(domain) = business.website.as_deref().and_then(extract_mail_domain) else {
            tracing::debug!(target: "cascade_task", "[{}] No usable mail domain.", label);
            return None;
        };
        tracing::info!(target: "cascade_task", "[{}] Starting cascade for domain {}", label, domain);

        if let Some(candidate) = self.try_people_search(business, &domain, run, &label).await {
            return Some(self.finalize(candidate, &label).await);
        }
        if let Some(candidate) = self.try_email_finder(&domain, run, &label).await {
            return Some(self.finalize(candidate, &label).await);
        }
        if let Some(accepted) = self.try_registry_guess(business, &domain, &label).await {
            tracing::info!(target: "cascade_task",
                "[{}] Registry guess accepted: <{}> ({})",
                label,
                accepted.candidate.email.as_deref().unwrap_or_default(),
                accepted.verification.status
            );
            return Some(accepted);
        }

        tracing::info!(target: "cascade_task", "[{}] No decision-maker contact found.", label);
        None
    }

    async fn pace(&self) {
        let pause = get_random_sleep_duration(&self.config);
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }

    fn is_usable_email(&self, email: &str) -> bool {
        is_valid_syntax(&self.config, email) && !is_generic_email(&self.config, email)
    }

    async fn try_people_search(
        &self,
        business: &BusinessRecord,
        domain: &str,
        run: &RunState,
        label: &str,
    ) -> Option<CandidateContact> {
        let provider = self.providers.people_search.as_ref()?;
        let query = PeopleQuery::for_business(business, Some(domain), &self.config.target_titles);

        loop {
            let Some(lease) = run.credentials.next() else {
                tracing::info!(target: "cascade_task",
                    "[{}] All people-search credentials exhausted; skipping stage.", label);
                return None;
            };

            self.pace().await;
            match provider.search_people(&lease.key, &query).await {
                Ok(people) => {
                    let found = people.len();
                    let mut usable: Vec<CandidateContact> = people
                        .into_iter()
                        .filter(|c| c.email.as_deref().is_some_and(|e| self.is_usable_email(e)))
                        .collect();
                    rank_candidates(&mut usable);
                    tracing::debug!(target: "cascade_task",
                        "[{}] People search (credential #{}) returned {} people, {} usable.",
                        label, lease.index, found, usable.len());
                    return usable.into_iter().next();
                }
                Err(e) if e.exhausts_credential() => {
                    if matches!(e, ProviderError::Unauthorized | ProviderError::AccessDenied) {
                        run.people_search_restricted.store(true, Ordering::SeqCst);
                    }
                    tracing::warn!(target: "cascade_task",
                        "[{}] People-search credential #{} failed: {}. Rotating.", label, lease.index, e);
                    run.credentials.mark_exhausted(&lease);
                }
                Err(e) => {
                    tracing::warn!(target: "cascade_task", "[{}] People search failed: {}", label, e);
                    return None;
                }
            }
        }
    }

    /// Returns true when the email finder should not be called again for this record.
    fn handle_finder_error(&self, error: ProviderError, run: &RunState, label: &str) -> bool {
        match error {
            ProviderError::QuotaExhausted => {
                if !run.email_finder_quota_exhausted.swap(true, Ordering::SeqCst) {
                    tracing::warn!(target: "cascade_task",
                        "[{}] Email finder out of quota; disabled for the rest of the run.", label);
                }
                run.email_finder_disabled.store(true, Ordering::SeqCst);
                true
            }
            ProviderError::Unauthorized | ProviderError::AccessDenied => {
                if !run.email_finder_restricted.swap(true, Ordering::SeqCst) {
                    tracing::warn!(target: "cascade_task",
                        "[{}] Email finder rejected the key ({}); disabled for the rest of the run.", label, error);
                }
                run.email_finder_disabled.store(true, Ordering::SeqCst);
                true
            }
            ProviderError::RateLimited => {
                tracing::warn!(target: "cascade_task", "[{}] Email finder rate limited; skipping stage for this record.", label);
                true
            }
            other => {
                tracing::warn!(target: "cascade_task", "[{}] Email finder call failed: {}", label, other);
                false
            }
        }
    }

    async fn try_email_finder(&self, domain: &str, run: &RunState, label: &str) -> Option<CandidateContact> {
        let provider = self.providers.email_finder.as_ref()?;
        if run.email_finder_disabled() {
            tracing::debug!(target: "cascade_task", "[{}] Email finder disabled for this run.", label);
            return None;
        }

        self.pace().await;
        let employees = match provider.find_employees(domain).await {
            Ok(e) => e,
            Err(e) => {
                self.handle_finder_error(e, run, label);
                return None;
            }
        };

        let mut ranked: Vec<CandidateContact> = employees
            .into_iter()
            .filter(|c| decision_maker_score(&c.title) > 0)
            .collect();
        ranked.sort_by_key(|c| {
            (
                Reverse(decision_maker_score(&c.title)),
                title_priority(&c.title),
                Reverse(c.confidence),
            )
        });
        tracing::debug!(target: "cascade_task",
            "[{}] Email finder: {} decision-maker employees at {}", label, ranked.len(), domain);

        for person in ranked.into_iter().take(self.config.email_finder_max_people) {
            if run.email_finder_disabled() {
                break;
            }
            self.pace().await;
            match provider
                .find_email(&person.first_name, &person.last_name, domain)
                .await
            {
                Ok(Some(found)) => {
                    if found.status == EmailStatus::Invalid {
                        tracing::debug!(target: "cascade_task",
                            "[{}] Finder marked <{}> invalid; trying next person.", label, found.email);
                        continue;
                    }
                    if !self.is_usable_email(&found.email) {
                        tracing::debug!(target: "cascade_task",
                            "[{}] Finder returned unusable address <{}>.", label, found.email);
                        continue;
                    }
                    tracing::info!(target: "cascade_task",
                        "[{}] Email finder hit: {} {} <{}> ({})",
                        label, person.first_name, person.last_name, found.email, found.status);
                    return Some(CandidateContact {
                        email: Some(found.email),
                        confidence: found.confidence,
                        email_status: found.status,
                        source: DiscoverySource::EmailFinder,
                        ..person
                    });
                }
                Ok(None) => continue,
                Err(e) => {
                    if self.handle_finder_error(e, run, label) {
                        break;
                    }
                }
            }
        }
        None
    }

    async fn try_registry_guess(
        &self,
        business: &BusinessRecord,
        domain: &str,
        label: &str,
    ) -> Option<AcceptedContact> {
        let registry = self.providers.registry.as_ref()?;
        if !self.verifier.has_api() {
            tracing::debug!(target: "cascade_task",
                "[{}] Registry fallback skipped: no verification API configured.", label);
            return None;
        }

        self.pace().await;
        let official = match registry.authorized_official(business).await {
            Ok(Some(o)) => o,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(target: "cascade_task", "[{}] Registry lookup failed: {}", label, e);
                return None;
            }
        };

        let patterns = generate_email_patterns(&official.first_name, &official.last_name, domain);
        tracing::debug!(target: "cascade_task",
            "[{}] Registry official {} {}; testing {} patterns.",
            label, official.first_name, official.last_name, patterns.len());

        let mut fallback: Option<(String, VerificationResult)> = None;
        let mut chosen: Option<(String, VerificationResult)> = None;
        for email in patterns {
            if is_generic_email(&self.config, &email) {
                continue;
            }
            let result = self.verifier.verify_via_api(&email).await?;
            match result.status {
                EmailStatus::Valid => {
                    chosen = Some((email, result));
                    break;
                }
                EmailStatus::Invalid => continue,
                _ => {
                    if fallback.is_none() {
                        fallback = Some((email, result));
                    }
                }
            }
        }
        let (email, verification) = chosen.or(fallback)?;

        let title = official
            .title
            .unwrap_or_else(|| REGISTRY_DEFAULT_TITLE.to_string());
        let confidence = match verification.status {
            EmailStatus::Valid => REGISTRY_CONFIDENCE_VALID,
            EmailStatus::Risky => REGISTRY_CONFIDENCE_RISKY,
            _ => REGISTRY_CONFIDENCE_UNKNOWN,
        };
        Some(AcceptedContact {
            candidate: CandidateContact {
                first_name: official.first_name,
                last_name: official.last_name,
                role: role_for_title(&title),
                title,
                email: Some(email),
                phone: business.phone.clone(),
                profile_url: None,
                confidence,
                email_status: verification.status,
                provider_id: None,
                source: DiscoverySource::RegistryGuess,
            },
            verification,
        })
    }

    /// Final status for an accepted provider candidate.
    async fn finalize(&self, candidate: CandidateContact, label: &str) -> AcceptedContact {
        let email = candidate.email.clone().unwrap_or_default();
        let verification = if candidate.email_status == EmailStatus::Valid {
            VerificationResult::new(
                EmailStatus::Valid,
                format!("{}_verified", candidate.source.as_str()),
            )
        } else {
            self.verifier.verify(&email).await
        };
        tracing::info!(target: "cascade_task",
            "[{}] Accepted {} {} <{}> from {}: {} ({})",
            label,
            candidate.first_name,
            candidate.last_name,
            email,
            candidate.source,
            verification.status,
            verification.reason
        );
        AcceptedContact {
            candidate,
            verification,
        }
    }
}
