//! Utility functions for turning business websites into mail domains.

use crate::core::error::{AppError, Result};
use url::Url;

/// Hosts that can never be an organization's own mail domain: social networks,
/// listing directories, review aggregators and site builders' shared hosts.
/// Matched as substrings of the extracted host.
const NON_ORGANIZATIONAL_HOSTS: &[&str] = &[
    "facebook.com",
    "fb.com",
    "instagram.com",
    "linkedin.com",
    "twitter.com",
    "tiktok.com",
    "youtube.com",
    "pinterest.com",
    "yelp.com",
    "google.com",
    "goo.gl",
    "g.page",
    "yellowpages.com",
    "healthgrades.com",
    "zocdoc.com",
    "vitals.com",
    "webmd.com",
    "ratemds.com",
    "bbb.org",
    "mapquest.com",
    "groupon.com",
    "linktr.ee",
    "wixsite.com",
    "business.site",
];

/// Extracts the base domain name (e.g., "example.com") from a given URL or domain string.
///
/// Adds an `https://` scheme if missing, strips a leading `www.` and lowercases.
/// Returns `Err(AppError::DomainExtraction)` if the input is empty or a host cannot be parsed.
pub(crate) fn get_domain_from_url(website_url_or_domain: &str) -> Result<String> {
    let trimmed_input = website_url_or_domain.trim();
    if trimmed_input.is_empty() {
        return Err(AppError::DomainExtraction(
            "Input string is empty".to_string(),
        ));
    }

    let url_str_with_scheme = if !trimmed_input.contains("://") {
        format!("https://{}", trimmed_input)
    } else {
        trimmed_input.to_string()
    };

    let url = match Url::parse(&url_str_with_scheme) {
        Ok(parsed_url) => parsed_url,
        Err(e) => {
            tracing::debug!(
                "Failed to parse '{}' as URL (original: '{}'): {}",
                url_str_with_scheme,
                trimmed_input,
                e
            );
            return Err(AppError::UrlParse(e));
        }
    };

    let host = url.host_str().ok_or_else(|| {
        AppError::DomainExtraction(format!("Could not extract host from parsed URL: {}", url))
    })?;

    let final_domain = host.strip_prefix("www.").unwrap_or(host).to_lowercase();

    if !final_domain.contains('.') || final_domain.starts_with('.') || final_domain.ends_with('.') {
        return Err(AppError::DomainExtraction(format!(
            "Extracted domain appears invalid: {}",
            final_domain
        )));
    }

    Ok(final_domain)
}

/// True when the host belongs to a social, directory or review site.
pub fn is_non_organizational_host(host: &str) -> bool {
    let host = host.to_lowercase();
    NON_ORGANIZATIONAL_HOSTS
        .iter()
        .any(|blocked| host.contains(blocked))
}

/// Normalizes a business website into the domain its staff would receive mail on.
///
/// Returns `None` when the website cannot be parsed, has no host, or points at a
/// non-organizational host such as a social profile or a review listing.
pub fn extract_mail_domain(website: &str) -> Option<String> {
    let domain = match get_domain_from_url(website) {
        Ok(d) => d,
        Err(e) => {
            tracing::debug!("No mail domain for website '{}': {}", website, e);
            return None;
        }
    };

    if is_non_organizational_host(&domain) {
        tracing::debug!(
            "Website '{}' resolves to non-organizational host '{}'.",
            website,
            domain
        );
        return None;
    }

    Some(domain)
}
