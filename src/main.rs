//! # Lead Sleuth CLI
//!
//! Command-line interface for the Lead Sleuth library (`lead_sleuth_core`).
//! This binary parses arguments, sets up configuration, and either runs a
//! discovery batch over a business file, verifies a single address, or checks
//! outbound SMTP connectivity.

use lead_sleuth_core::store::JsonFileStore;
use lead_sleuth_core::{
    check_smtp_connectivity, run_batch, verify_single_email, BatchSummary, ConfigBuilder,
    VerificationResult,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Finds decision-maker contacts for business leads and verifies their email addresses.",
    long_about = "Lead Sleuth queries people-search, email-finder and public registry providers for the owner or manager of each business, then classifies the address via a verification API and a direct SMTP probe."
)]
struct AppArgs {
    #[command(subcommand)]
    command: Command,

    /// Path to a configuration file (TOML format) to load settings from. CLI args override file settings.
    #[arg(long, global = true, env = "LEAD_SLEUTH_CONFIG")]
    config_file: Option<String>,

    /// Maximum number of businesses processed concurrently.
    #[arg(short, long, global = true, env = "LEAD_SLEUTH_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Comma-separated list of people-search API keys, tried in order.
    #[arg(long, global = true, value_delimiter = ',', env = "LEAD_SLEUTH_PEOPLE_SEARCH_KEYS", hide_env_values = true)]
    people_search_keys: Option<Vec<String>>,

    /// Email-finder API key.
    #[arg(long, global = true, env = "LEAD_SLEUTH_EMAIL_FINDER_KEY", hide_env_values = true)]
    email_finder_key: Option<String>,

    /// Email verification API key.
    #[arg(long, global = true, env = "LEAD_SLEUTH_VERIFIER_KEY", hide_env_values = true)]
    verifier_key: Option<String>,

    /// Sender address used in the SMTP MAIL FROM command.
    #[arg(long, global = true, env = "LEAD_SLEUTH_SMTP_SENDER")]
    smtp_sender: Option<String>,

    /// Disable the direct SMTP probe.
    #[arg(long, global = true, action = clap::ArgAction::SetTrue, env = "LEAD_SLEUTH_NO_SMTP")]
    no_smtp: bool,

    /// SMTP dialogue timeout in seconds.
    #[arg(long, global = true, env = "LEAD_SLEUTH_SMTP_TIMEOUT")]
    smtp_timeout: Option<u64>,

    /// HTTP request timeout in seconds.
    #[arg(long, global = true, env = "LEAD_SLEUTH_REQUEST_TIMEOUT")]
    request_timeout: Option<u64>,

    /// DNS resolution timeout in seconds.
    #[arg(long, global = true, env = "LEAD_SLEUTH_DNS_TIMEOUT")]
    dns_timeout: Option<u64>,

    /// Comma-separated list of DNS servers to use for MX lookups.
    #[arg(long, global = true, value_delimiter = ',', env = "LEAD_SLEUTH_DNS_SERVERS")]
    dns_servers: Option<Vec<String>>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a discovery batch over a business file and upsert contacts.
    Run {
        /// JSON array of business records.
        #[arg(short, long, env = "LEAD_SLEUTH_BUSINESSES")]
        businesses: String,

        /// JSON array of stored contacts. Created if missing.
        #[arg(long, default_value = "contacts.json", env = "LEAD_SLEUTH_CONTACTS")]
        contacts: String,

        /// Maximum number of businesses to process.
        #[arg(short, long, env = "LEAD_SLEUTH_LIMIT")]
        limit: Option<usize>,

        /// Maximum number of stored unknown contacts to re-verify.
        #[arg(long, env = "LEAD_SLEUTH_VERIFY_LIMIT")]
        verify_limit: Option<usize>,

        /// Skip the re-verification sweep over stored unknown contacts.
        #[arg(long, action = clap::ArgAction::SetTrue)]
        no_verify_unknowns: bool,

        /// Write the run summary as JSON to this path instead of stdout.
        #[arg(long)]
        summary: Option<String>,
    },

    /// Classify a single email address.
    Verify {
        email: String,

        /// Skip the verification API and report the SMTP probe's answer.
        #[arg(long, action = clap::ArgAction::SetTrue)]
        smtp_only: bool,
    },

    /// Check whether outbound SMTP connections are possible from this host.
    CheckSmtp,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_thread_names(true)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Setting up tracing subscriber failed")?;

    tracing::info!("Lead Sleuth CLI v{} starting...", env!("CARGO_PKG_VERSION"));

    let args = AppArgs::parse();
    tracing::debug!("Parsed CLI command: {:?}", args.command);

    let mut config_builder = ConfigBuilder::new();

    if let Some(ref path) = args.config_file {
        config_builder = config_builder.config_file(path);
    }
    if let Some(c) = args.concurrency {
        config_builder = config_builder.max_concurrency(c);
    }
    if let Some(ref keys) = args.people_search_keys {
        config_builder = config_builder.people_search_keys(keys.clone());
    }
    if let Some(ref key) = args.email_finder_key {
        config_builder = config_builder.email_finder_key(key);
    }
    if let Some(ref key) = args.verifier_key {
        config_builder = config_builder.verifier_key(key);
    }
    if let Some(ref s) = args.smtp_sender {
        config_builder = config_builder.smtp_sender_email(s);
    }
    if args.no_smtp {
        config_builder = config_builder.enable_smtp_checks(false);
    }
    if let Some(t) = args.smtp_timeout {
        config_builder = config_builder.smtp_timeout(Duration::from_secs(t));
    }
    if let Some(t) = args.request_timeout {
        config_builder = config_builder.request_timeout(Duration::from_secs(t));
    }
    if let Some(t) = args.dns_timeout {
        config_builder = config_builder.dns_timeout(Duration::from_secs(t));
    }
    if let Some(ref servers) = args.dns_servers {
        if !servers.is_empty() {
            config_builder = config_builder.dns_servers(servers.clone());
        }
    }

    if let Command::Run {
        limit,
        verify_limit,
        no_verify_unknowns,
        ..
    } = &args.command
    {
        if let Some(l) = limit {
            config_builder = config_builder.limit(*l);
        }
        if let Some(l) = verify_limit {
            config_builder = config_builder.verify_limit(*l);
        }
        if *no_verify_unknowns {
            config_builder = config_builder.verify_unknowns(false);
        }
    }

    let config = match config_builder.build() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            return Err(anyhow::anyhow!("Failed to build configuration: {}", e));
        }
    };
    tracing::debug!(
        "Effective configuration: concurrency={}, limit={}, verify_limit={}, smtp_checks={}, people_search_keys={}, email_finder={}, verifier={}",
        config.max_concurrency,
        config.limit,
        config.verify_limit,
        config.enable_smtp_checks,
        config.people_search_keys.len(),
        config.email_finder_key.is_some(),
        config.verifier_key.is_some()
    );

    match args.command {
        Command::Run {
            businesses,
            contacts,
            summary,
            ..
        } => process_batch_mode(config, &businesses, &contacts, summary.as_deref()).await,
        Command::Verify { email, smtp_only } => {
            let result = verify_single_email(config, &email, smtp_only)
                .await
                .map_err(|e| anyhow::anyhow!("Verification failed: {}", e))?;
            print_verification(&result)
        }
        Command::CheckSmtp => match check_smtp_connectivity(&config).await {
            Ok(()) => {
                tracing::info!("SMTP connectivity test passed (outbound port {} likely open).", config.smtp_port);
                Ok(())
            }
            Err(e) => {
                tracing::error!("SMTP connectivity test failed: {}", e);
                tracing::warn!("SMTP verification may fail or be unreliable.");
                tracing::warn!("Check firewall rules or ISP restrictions if SMTP checks are needed.");
                Err(anyhow::anyhow!(e))
            }
        },
    }
}

async fn process_batch_mode(
    config: Arc<lead_sleuth_core::Config>,
    businesses_path: &str,
    contacts_path: &str,
    summary_path: Option<&str>,
) -> Result<()> {
    let start_time = Instant::now();
    tracing::info!(
        "Running batch. Businesses: '{}', Contacts: '{}' (Concurrency: {})",
        businesses_path,
        contacts_path,
        config.max_concurrency
    );

    if !Path::new(businesses_path).is_file() {
        return Err(anyhow::anyhow!(
            "Business file not found or is not a file: {}",
            businesses_path
        ));
    }

    let store = Arc::new(
        JsonFileStore::open(businesses_path, contacts_path)
            .with_context(|| format!("Failed to open contact store '{}'", contacts_path))?,
    );

    if config.enable_smtp_checks {
        if let Err(e) = check_smtp_connectivity(&config).await {
            tracing::warn!("SMTP connectivity test failed: {}", e);
            tracing::warn!("SMTP probes will likely come back unknown for this run.");
        }
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .context("Failed to set progress bar template")?,
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("Discovering contacts...");

    let outcome = run_batch(config, store.clone(), store).await;
    pb.finish_and_clear();

    let summary = match outcome {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("Batch failed: {}", e);
            return Err(anyhow::anyhow!("Batch run failed: {}", e));
        }
    };

    log_summary(&summary, start_time.elapsed());

    match summary_path {
        Some(path) => {
            save_summary(&summary, path)?;
            tracing::info!("Summary saved to '{}'.", path);
        }
        None => {
            let json = serde_json::to_string_pretty(&summary)
                .context("Failed to serialize run summary")?;
            println!("{}", json);
        }
    }
    Ok(())
}

fn save_summary(summary: &BatchSummary, file_path: &str) -> Result<()> {
    if let Some(parent_dir) = Path::new(file_path).parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            std::fs::create_dir_all(parent_dir).with_context(|| {
                format!("Failed to create output directory '{}'", parent_dir.display())
            })?;
        }
    }
    let file = File::create(file_path)
        .with_context(|| format!("Failed to create/truncate summary file '{}'", file_path))?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)
        .with_context(|| format!("Failed to serialize summary to JSON for '{}'", file_path))?;
    Ok(())
}

/// Logs the run counters using `tracing::info`.
fn log_summary(summary: &BatchSummary, duration: Duration) {
    tracing::info!("---------------------- Run Summary -----------------------");
    tracing::info!("Businesses Processed        : {}", summary.processed);
    tracing::info!("  - Skipped (No Domain)     : {}", summary.skipped_no_domain);
    tracing::info!("  - Skipped (Already Valid) : {}", summary.skipped_already_valid);
    tracing::info!("Contacts Found              : {}", summary.emails_found);
    tracing::info!("  - People Search           : {}", summary.people_search_hits);
    tracing::info!("  - Email Finder            : {}", summary.email_finder_hits);
    tracing::info!("  - Registry + Patterns     : {}", summary.registry_hits);
    tracing::info!(
        "Verdicts (V/R/I/U)          : {}/{}/{}/{}",
        summary.valid_found,
        summary.risky_found,
        summary.invalid_found,
        summary.unknown_found
    );
    tracing::info!(
        "Contacts Persisted          : {} (kept existing: {}, failures: {})",
        summary.contacts_persisted,
        summary.contacts_kept_existing,
        summary.persist_failures
    );
    tracing::info!("Exhausted Credentials       : {}", summary.exhausted_credentials);
    if summary.people_search_restricted {
        tracing::warn!("People search access was restricted during this run.");
    }
    if summary.email_finder_quota_exhausted {
        tracing::warn!("Email finder quota was exhausted during this run.");
    } else if summary.email_finder_restricted {
        tracing::warn!("Email finder access was restricted during this run.");
    }
    tracing::info!(
        "Unknowns Re-verified        : {} (resolved: {})",
        summary.verified_unknown_emails,
        summary.unknown_emails_resolved
    );
    tracing::info!("Total Time Taken            : {:.2?}", duration);
    tracing::info!("----------------------------------------------------------");
}

fn print_verification(result: &VerificationResult) -> Result<()> {
    let json = serde_json::to_string_pretty(result).context("Failed to serialize verification result")?;
    println!("{}", json);
    Ok(())
}
