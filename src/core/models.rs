//! Data model: business input, discovered candidates, verification outcomes
//! and the persisted contact handed back to the CRM.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A business row read from the CRM. Read-only to this crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusinessRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Organizational role inferred from a free-text title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    MedicalDirector,
    ClinicManager,
    PracticeAdministrator,
    MarketingDirector,
    OperationsManager,
}

impl Role {
    /// Tie-break rank, lower wins.
    pub fn priority(self) -> u8 {
        match self {
            Role::Owner => 0,
            Role::MedicalDirector => 1,
            Role::ClinicManager => 2,
            Role::PracticeAdministrator => 3,
            Role::MarketingDirector => 4,
            Role::OperationsManager => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::MedicalDirector => "medical_director",
            Role::ClinicManager => "clinic_manager",
            Role::PracticeAdministrator => "practice_administrator",
            Role::MarketingDirector => "marketing_director",
            Role::OperationsManager => "operations_manager",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Four-way deliverability status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    Valid,
    Invalid,
    Risky,
    #[default]
    Unknown,
}

impl EmailStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EmailStatus::Valid => "valid",
            EmailStatus::Invalid => "invalid",
            EmailStatus::Risky => "risky",
            EmailStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which cascade stage produced a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoverySource {
    PeopleSearch,
    EmailFinder,
    RegistryGuess,
}

impl DiscoverySource {
    /// Cascade order; earlier stages outrank later ones when comparing contacts.
    pub fn rank(self) -> u8 {
        match self {
            DiscoverySource::PeopleSearch => 0,
            DiscoverySource::EmailFinder => 1,
            DiscoverySource::RegistryGuess => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DiscoverySource::PeopleSearch => "people_search",
            DiscoverySource::EmailFinder => "email_finder",
            DiscoverySource::RegistryGuess => "registry_guess",
        }
    }
}

impl fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A person surfaced by a discovery provider, normalized by its adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateContact {
    pub first_name: String,
    pub last_name: String,
    pub title: String,
    pub role: Role,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub profile_url: Option<String>,
    /// Provider-reported confidence on a 0-100 scale.
    pub confidence: u8,
    /// Provider-reported status of `email`.
    pub email_status: EmailStatus,
    /// The provider's own identifier for this person, when it has one.
    pub provider_id: Option<String>,
    pub source: DiscoverySource,
}

impl CandidateContact {
    pub fn email_domain(&self) -> Option<&str> {
        self.email.as_deref().and_then(|e| e.split('@').nth(1))
    }
}

/// Outcome of a deliverability check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub status: EmailStatus,
    /// SMTP reply code observed at the deciding stage, if any.
    pub code: Option<u16>,
    /// Mail exchanger that answered, if a dialogue took place.
    pub mx_host: Option<String>,
    pub reason: String,
}

impl VerificationResult {
    pub fn new(status: EmailStatus, reason: impl Into<String>) -> Self {
        Self {
            status,
            code: None,
            mx_host: None,
            reason: reason.into(),
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_mx_host(mut self, host: impl Into<String>) -> Self {
        self.mx_host = Some(host.into());
        self
    }

    pub fn invalid_syntax() -> Self {
        Self::new(EmailStatus::Invalid, "invalid_syntax")
    }

    pub fn no_mx() -> Self {
        Self::new(EmailStatus::Invalid, "no_mx")
    }

    pub fn unknown(reason: impl Into<String>) -> Self {
        Self::new(EmailStatus::Unknown, reason)
    }

    pub fn is_valid(&self) -> bool {
        self.status == EmailStatus::Valid
    }
}

/// Final contact row upserted into the CRM, one per business per source identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedContact {
    pub id: String,
    pub business_id: String,
    pub first_name: String,
    pub last_name: String,
    pub title: String,
    pub role: Role,
    pub email: String,
    pub phone: Option<String>,
    pub profile_url: Option<String>,
    pub confidence: u8,
    pub source: DiscoverySource,
    pub email_verified: bool,
    pub email_verification_status: EmailStatus,
    pub enriched_at: DateTime<Utc>,
}

/// Fixed namespace for contact identifiers so ids are stable across runs and hosts.
const CONTACT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6c65_6164_2d73_6c65_7574_682d_636f_6e74);

impl PersistedContact {
    /// Derives the upsert key from (source, business id, provider id or normalized email).
    pub fn derive_id(source: DiscoverySource, business_id: &str, native_key: &str) -> String {
        let name = format!(
            "{}:{}:{}",
            source.as_str(),
            business_id,
            native_key.trim().to_lowercase()
        );
        Uuid::new_v5(&CONTACT_ID_NAMESPACE, name.as_bytes()).to_string()
    }

    /// Builds the persisted row from an accepted candidate and its final verification.
    /// Returns `None` when the candidate carries no email.
    pub fn from_candidate(
        business_id: &str,
        candidate: &CandidateContact,
        verification: &VerificationResult,
        enriched_at: DateTime<Utc>,
    ) -> Option<Self> {
        let email = candidate.email.as_ref()?.trim().to_lowercase();
        let native_key = candidate.provider_id.as_deref().unwrap_or(&email);
        Some(Self {
            id: Self::derive_id(candidate.source, business_id, native_key),
            business_id: business_id.to_string(),
            first_name: candidate.first_name.clone(),
            last_name: candidate.last_name.clone(),
            title: candidate.title.clone(),
            role: candidate.role,
            email,
            phone: candidate.phone.clone(),
            profile_url: candidate.profile_url.clone(),
            confidence: candidate.confidence.min(100),
            source: candidate.source,
            email_verified: verification.status == EmailStatus::Valid,
            email_verification_status: verification.status,
            enriched_at,
        })
    }

    /// Ranking key used when deciding whether a new contact may replace what is stored.
    /// Lower compares better.
    pub fn rank_key(&self) -> (u8, u8, std::cmp::Reverse<u8>) {
        (
            self.source.rank(),
            self.role.priority(),
            std::cmp::Reverse(self.confidence),
        )
    }

    pub fn apply_verification(&mut self, verification: &VerificationResult) {
        self.email_verification_status = verification.status;
        self.email_verified = verification.status == EmailStatus::Valid;
    }
}
