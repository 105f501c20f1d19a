//! Generates candidate corporate addresses from a person's name and a domain,
//! and recognizes role mailboxes that never count as a decision-maker contact.

use crate::core::config::Config;
use std::collections::HashSet;

/// Keeps ASCII letters only and lowercases them. Nothing is transliterated,
/// so "O'Brien" becomes "obrien" and "José" becomes "jos".
fn sanitize_name_part(part: &str) -> String {
    part.chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Generates the standard corporate local-part patterns for `first last @ domain`.
///
/// Order is fixed: `first.last`, `firstlast`, `flast`, `firstl`, `first_last`,
/// `first-last`, `last.first`, `lastf`. Duplicates keep their first position.
/// Returns an empty list if either name reduces to nothing or the domain is empty.
pub fn generate_email_patterns(first_name: &str, last_name: &str, domain: &str) -> Vec<String> {
    let first = sanitize_name_part(first_name);
    let last = sanitize_name_part(last_name);
    let domain = domain.trim().to_lowercase();

    if first.is_empty() || last.is_empty() {
        tracing::debug!(
            "Cannot generate patterns: sanitized name parts are empty (original: '{} {}')",
            first_name,
            last_name
        );
        return Vec::new();
    }
    if domain.is_empty() {
        tracing::debug!("Cannot generate patterns: empty domain");
        return Vec::new();
    }

    // Both are non-empty ASCII at this point.
    let f = &first[..1];
    let l = &last[..1];

    let local_parts = [
        format!("{first}.{last}"),
        format!("{first}{last}"),
        format!("{f}{last}"),
        format!("{first}{l}"),
        format!("{first}_{last}"),
        format!("{first}-{last}"),
        format!("{last}.{first}"),
        format!("{last}{f}"),
    ];

    let mut seen = HashSet::new();
    let patterns: Vec<String> = local_parts
        .into_iter()
        .filter(|local| seen.insert(local.clone()))
        .map(|local| format!("{}@{}", local, domain))
        .collect();

    tracing::trace!(
        "Generated {} patterns for '{} {}' @ '{}'",
        patterns.len(),
        first_name,
        last_name,
        domain
    );
    patterns
}

/// Local part of an address, without any `+tag`, lowercased.
fn mailbox_name(email: &str) -> Option<String> {
    let local = email.trim().split('@').next()?;
    let base = local.split('+').next().unwrap_or(local);
    (!base.is_empty()).then(|| base.to_lowercase())
}

/// True when the address is a role mailbox (info@, support@, ...).
pub fn is_generic_email(config: &Config, email: &str) -> bool {
    mailbox_name(email).is_some_and(|local| config.generic_email_prefixes.contains(&local))
}

/// Cheap structural check used before any network verification.
pub fn is_valid_syntax(config: &Config, email: &str) -> bool {
    let email = email.trim();
    email.len() <= 254 && config.email_regex.is_match(email)
}
