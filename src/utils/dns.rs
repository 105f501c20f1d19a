//! Mail-exchanger resolution.

use crate::core::config::Config;
use crate::core::error::{AppError, Result};

use async_trait::async_trait;
use std::net::IpAddr;
use trust_dns_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::TokioAsyncResolver;

/// One MX record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailServer {
    pub exchange: String,
    pub preference: u16,
}

/// Looks up the mail exchangers for a domain.
///
/// Implementations return the records sorted ascending by preference, an empty
/// list when the domain definitively has none (including NXDOMAIN), and an
/// error only for transient failures such as timeouts.
#[async_trait]
pub trait MxLookup: Send + Sync {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<MailServer>>;
}

/// [`MxLookup`] backed by trust-dns.
pub struct DnsMxResolver {
    resolver: TokioAsyncResolver,
    timeout: std::time::Duration,
}

impl DnsMxResolver {
    /// Builds a resolver from the configured name servers, or from the system
    /// configuration when none are set.
    pub fn new(config: &Config) -> Result<Self> {
        let mut opts = ResolverOpts::default();
        opts.timeout = config.dns_timeout;
        opts.attempts = 2;

        let resolver = if config.dns_servers.is_empty() {
            let (system_config, mut system_opts) =
                trust_dns_resolver::system_conf::read_system_conf().map_err(|e| {
                    AppError::Initialization(format!("Failed to read system DNS config: {}", e))
                })?;
            system_opts.timeout = config.dns_timeout;
            TokioAsyncResolver::tokio(system_config, system_opts)
        } else {
            let ips = config
                .dns_servers
                .iter()
                .map(|s| {
                    s.parse::<IpAddr>().map_err(|e| {
                        AppError::Config(format!("Invalid DNS server address '{}': {}", s, e))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let group = NameServerConfigGroup::from_ips_clear(&ips, 53, true);
            TokioAsyncResolver::tokio(ResolverConfig::from_parts(None, vec![], group), opts)
        };

        tracing::debug!("DNS resolver initialized ({} configured servers).", config.dns_servers.len());
        Ok(Self {
            resolver,
            timeout: config.dns_timeout,
        })
    }
}

#[async_trait]
impl MxLookup for DnsMxResolver {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<MailServer>> {
        // Resolver attempts can stack, so the whole lookup gets its own bound.
        let bound = self.timeout * 2;
        let lookup = match tokio::time::timeout(bound, self.resolver.mx_lookup(domain)).await {
            Ok(Ok(lookup)) => lookup,
            Ok(Err(e)) => {
                return match e.kind() {
                    ResolveErrorKind::NoRecordsFound { .. } => {
                        tracing::debug!("No MX records for {} ({})", domain, e);
                        Ok(Vec::new())
                    }
                    _ => Err(AppError::Dns(format!("MX lookup for {} failed: {}", domain, e))),
                };
            }
            Err(_) => {
                return Err(AppError::Dns(format!(
                    "MX lookup for {} timed out after {:?}",
                    domain, bound
                )));
            }
        };

        let mut servers: Vec<MailServer> = lookup
            .iter()
            .map(|mx| MailServer {
                exchange: mx.exchange().to_utf8().trim_end_matches('.').to_string(),
                preference: mx.preference(),
            })
            .filter(|ms| !ms.exchange.is_empty())
            .collect();
        sort_by_preference(&mut servers);
        Ok(servers)
    }
}

/// Ascending preference; ties broken by host name so the order is stable.
pub fn sort_by_preference(servers: &mut [MailServer]) {
    servers.sort_by(|a, b| {
        a.preference
            .cmp(&b.preference)
            .then_with(|| a.exchange.cmp(&b.exchange))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_lowest_preference_first() {
        let mut servers = vec![
            MailServer {
                exchange: "alt2.mx.example.com".into(),
                preference: 20,
            },
            MailServer {
                exchange: "mx.example.com".into(),
                preference: 5,
            },
            MailServer {
                exchange: "alt1.mx.example.com".into(),
                preference: 10,
            },
        ];
        sort_by_preference(&mut servers);
        let hosts: Vec<_> = servers.iter().map(|s| s.exchange.as_str()).collect();
        assert_eq!(
            hosts,
            vec!["mx.example.com", "alt1.mx.example.com", "alt2.mx.example.com"]
        );
    }

    #[test]
    fn rejects_unparseable_dns_server() {
        let mut config = Config::default();
        config.dns_servers = vec!["not-an-ip".into()];
        assert!(matches!(DnsMxResolver::new(&config), Err(AppError::Config(_))));
    }
}
