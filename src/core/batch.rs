//! Batch runs: the discovery pass over eligible businesses and the sweep that
//! re-verifies stored contacts still marked unknown.

use crate::core::cascade::{AcceptedContact, ProviderCascade, RunState};
use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::{
    BusinessRecord, DiscoverySource, EmailStatus, PersistedContact, VerificationResult,
};
use crate::store::{BusinessSource, ContactStore};
use crate::utils::domain::extract_mail_domain;

use chrono::Utc;
use futures::stream::{self, FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Counters reported after a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Records that went through the cascade.
    pub processed: usize,
    pub skipped_no_domain: usize,
    pub skipped_already_valid: usize,

    pub people_search_hits: usize,
    pub email_finder_hits: usize,
    pub registry_hits: usize,

    pub emails_found: usize,
    pub valid_found: usize,
    pub risky_found: usize,
    pub invalid_found: usize,
    pub unknown_found: usize,

    pub exhausted_credentials: usize,
    pub people_search_restricted: bool,
    pub email_finder_restricted: bool,
    pub email_finder_quota_exhausted: bool,

    pub contacts_persisted: usize,
    pub contacts_kept_existing: usize,
    pub persist_failures: usize,

    /// Stored unknown contacts re-checked by the sweep.
    pub verified_unknown_emails: usize,
    /// Of those, how many left the unknown status.
    pub unknown_emails_resolved: usize,
}

impl BatchSummary {
    fn record_status(&mut self, status: EmailStatus) {
        match status {
            EmailStatus::Valid => self.valid_found += 1,
            EmailStatus::Risky => self.risky_found += 1,
            EmailStatus::Invalid => self.invalid_found += 1,
            EmailStatus::Unknown => self.unknown_found += 1,
        }
    }

    fn record_source(&mut self, source: DiscoverySource) {
        match source {
            DiscoverySource::PeopleSearch => self.people_search_hits += 1,
            DiscoverySource::EmailFinder => self.email_finder_hits += 1,
            DiscoverySource::RegistryGuess => self.registry_hits += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PersistOutcome {
    Written,
    KeptExisting,
    Failed,
}

#[derive(Debug)]
struct RecordOutcome {
    found: Option<(DiscoverySource, EmailStatus)>,
    persist: Option<PersistOutcome>,
}

/// Drives the cascade over a business source and writes results to a contact store.
pub struct BatchOrchestrator {
    config: Arc<Config>,
    cascade: ProviderCascade,
    businesses: Arc<dyn BusinessSource>,
    contacts: Arc<dyn ContactStore>,
}

impl BatchOrchestrator {
    pub fn new(
        config: Arc<Config>,
        cascade: ProviderCascade,
        businesses: Arc<dyn BusinessSource>,
        contacts: Arc<dyn ContactStore>,
    ) -> Self {
        Self {
            config,
            cascade,
            businesses,
            contacts,
        }
    }

    /// Runs the discovery pass and then, when enabled, the unknown sweep.
    ///
    /// Fails only when no discovery provider is configured or the inputs
    /// cannot be read. Per-record trouble is counted, never fatal.
    pub async fn run(&self) -> Result<BatchSummary> {
        if !self.config.has_discovery_credentials() {
            tracing::error!(target: "batch_task",
                "No people-search, email-finder or verifier credentials configured; nothing attempted.");
            return Err(AppError::Config(
                "no discovery provider credentials configured (people-search keys, email-finder key, or verifier key with registry fallback)"
                    .to_string(),
            ));
        }

        let mut summary = BatchSummary::default();
        let eligible = self.eligible_businesses(&mut summary).await?;
        tracing::info!(target: "batch_task",
            "Discovery pass: {} eligible businesses (limit {}, {} without domain, {} already valid).",
            eligible.len(),
            self.config.limit,
            summary.skipped_no_domain,
            summary.skipped_already_valid
        );

        let run = Arc::new(self.cascade.new_run());
        self.discovery_pass(eligible, run.clone(), &mut summary).await;

        summary.exhausted_credentials = run.credentials.exhausted_count();
        summary.people_search_restricted = run.people_search_restricted();
        summary.email_finder_restricted = run.email_finder_restricted();
        summary.email_finder_quota_exhausted = run.email_finder_quota_exhausted();

        if self.config.verify_unknowns {
            self.unknown_sweep(&mut summary).await?;
        } else {
            tracing::debug!(target: "batch_task", "Unknown sweep disabled.");
        }

        tracing::info!(target: "batch_task",
            "Batch complete: processed={} found={} valid={} persisted={}",
            summary.processed, summary.emails_found, summary.valid_found, summary.contacts_persisted);
        Ok(summary)
    }

    /// Businesses with a usable domain and no valid contact yet, deduplicated
    /// by id and capped at `limit`.
    async fn eligible_businesses(&self, summary: &mut BatchSummary) -> Result<Vec<BusinessRecord>> {
        let records = self.businesses.load_businesses().await?;
        let already_valid = self.contacts.businesses_with_valid_contact().await?;

        let mut seen = HashSet::new();
        let mut eligible = Vec::new();
        for record in records {
            if eligible.len() >= self.config.limit {
                break;
            }
            if !seen.insert(record.id.clone()) {
                continue;
            }
            if record.website.as_deref().and_then(extract_mail_domain).is_none() {
                summary.skipped_no_domain += 1;
                continue;
            }
            if already_valid.contains(&record.id) {
                tracing::debug!(target: "batch_task",
                    "[{}] Already has a valid contact; skipping.", record.id);
                summary.skipped_already_valid += 1;
                continue;
            }
            eligible.push(record);
        }
        Ok(eligible)
    }

    async fn discovery_pass(
        &self,
        eligible: Vec<BusinessRecord>,
        run: Arc<RunState>,
        summary: &mut BatchSummary,
    ) {
        let mut tasks = FuturesUnordered::new();

        for business in eligible {
            while tasks.len() >= self.config.max_concurrency.max(1) {
                match tasks.next().await {
                    Some(joined) => Self::absorb(joined, summary),
                    None => {
                        tracing::warn!(target: "batch_task", "Task queue unexpectedly empty while limiting concurrency.");
                        break;
                    }
                }
            }

            let cascade = self.cascade.clone();
            let contacts = Arc::clone(&self.contacts);
            let run = Arc::clone(&run);
            tasks.push(tokio::spawn(async move {
                process_record(&cascade, contacts.as_ref(), &run, business).await
            }));
        }

        while let Some(joined) = tasks.next().await {
            Self::absorb(joined, summary);
        }
    }

    fn absorb(
        joined: std::result::Result<RecordOutcome, tokio::task::JoinError>,
        summary: &mut BatchSummary,
    ) {
        let outcome = match joined {
            Ok(o) => o,
            Err(e) => {
                tracing::error!(target: "batch_task", "A cascade task failed to join: {}", e);
                return;
            }
        };
        summary.processed += 1;
        if let Some((source, status)) = outcome.found {
            summary.emails_found += 1;
            summary.record_source(source);
            summary.record_status(status);
        }
        match outcome.persist {
            Some(PersistOutcome::Written) => summary.contacts_persisted += 1,
            Some(PersistOutcome::KeptExisting) => summary.contacts_kept_existing += 1,
            Some(PersistOutcome::Failed) => summary.persist_failures += 1,
            None => {}
        }
    }

    /// Re-verifies stored contacts still marked unknown through the API and
    /// updates them in place.
    async fn unknown_sweep(&self, summary: &mut BatchSummary) -> Result<()> {
        let verifier = self.cascade.verifier().clone();
        if !verifier.has_api() {
            tracing::warn!(target: "batch_task", "Unknown sweep skipped: no verification API configured.");
            return Ok(());
        }

        let pending = self
            .contacts
            .contacts_with_status(EmailStatus::Unknown, self.config.verify_limit)
            .await?;
        tracing::info!(target: "batch_task", "Unknown sweep: re-verifying {} contacts.", pending.len());

        let results: Vec<(PersistedContact, Option<VerificationResult>)> =
            stream::iter(pending)
                .map(|contact| {
                    let verifier = verifier.clone();
                    async move {
                        let result = verifier.verify_via_api(&contact.email).await;
                        (contact, result)
                    }
                })
                .buffer_unordered(self.config.max_concurrency.max(1))
                .collect()
                .await;

        for (mut contact, result) in results {
            let Some(result) = result else { continue };
            summary.verified_unknown_emails += 1;
            if result.status == EmailStatus::Unknown {
                continue;
            }
            contact.apply_verification(&result);
            match self.contacts.upsert_contact(&contact).await {
                Ok(()) => {
                    summary.unknown_emails_resolved += 1;
                    tracing::info!(target: "batch_task",
                        "Sweep: <{}> is now {} ({})", contact.email, result.status, result.reason);
                }
                Err(e) => {
                    summary.persist_failures += 1;
                    tracing::error!(target: "batch_task",
                        "Sweep: failed to update contact {}: {}", contact.id, e);
                }
            }
        }
        Ok(())
    }
}

async fn process_record(
    cascade: &ProviderCascade,
    contacts: &dyn ContactStore,
    run: &RunState,
    business: BusinessRecord,
) -> RecordOutcome {
    let Some(AcceptedContact {
        candidate,
        verification,
    }) = cascade.discover(&business, run).await
    else {
        return RecordOutcome {
            found: None,
            persist: None,
        };
    };

    let found = Some((candidate.source, verification.status));
    let Some(contact) =
        PersistedContact::from_candidate(&business.id, &candidate, &verification, Utc::now())
    else {
        return RecordOutcome { found, persist: None };
    };

    let persist = persist_contact(contacts, &business, contact).await;
    RecordOutcome {
        found,
        persist: Some(persist),
    }
}

/// Makes `contact` the business's stored contact unless a stored contact
/// strictly outranks it. Outranked rows for the business are replaced, not
/// kept alongside.
async fn persist_contact(
    contacts: &dyn ContactStore,
    business: &BusinessRecord,
    contact: PersistedContact,
) -> PersistOutcome {
    let existing = match contacts.contacts_for_business(&business.id).await {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(target: "batch_task",
                "[{}] Could not read existing contacts: {}", business.id, e);
            return PersistOutcome::Failed;
        }
    };

    if let Some(better) = existing
        .iter()
        .filter(|c| c.id != contact.id)
        .find(|c| c.rank_key() < contact.rank_key())
    {
        tracing::info!(target: "batch_task",
            "[{}] Keeping stored contact {} ({}), which outranks <{}> from {}.",
            business.id, better.id, better.source, contact.email, contact.source);
        return PersistOutcome::KeptExisting;
    }

    let replaced = existing.iter().filter(|c| c.id != contact.id).count();
    match contacts.replace_business_contact(&business.id, &contact).await {
        Ok(()) => {
            tracing::debug!(target: "batch_task",
                "[{}] Stored contact {} (replaced {} outranked row(s))", business.id, contact.id, replaced);
            PersistOutcome::Written
        }
        Err(e) => {
            tracing::error!(target: "batch_task",
                "[{}] Failed to upsert contact {}: {}", business.id, contact.id, e);
            PersistOutcome::Failed
        }
    }
}
