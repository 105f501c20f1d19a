//! Provides the SmtpProber, a minimal mailbox probe speaking SMTP over a raw socket.

use super::error::handle_io_error;
use super::reply::{read_reply, SmtpReply};
use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::{EmailStatus, VerificationResult};
use crate::utils::dns::MxLookup;
use crate::utils::patterns::is_valid_syntax;

use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;

/// Host used by the outbound port-25 self-check.
pub const CONNECTIVITY_PROBE_HOST: &str = "gmail-smtp-in.l.google.com";

/// How a dialogue ended, before it is mapped onto a verification status.
#[derive(Debug)]
enum DialogueOutcome {
    /// A stage before RCPT got a non-positive reply.
    Aborted { stage: &'static str, reply: SmtpReply },
    /// The RCPT reply.
    Recipient(SmtpReply),
}

/// Probes a mailbox by walking banner, HELO, MAIL FROM and RCPT TO against
/// the domain's preferred mail exchanger. Nothing is ever sent.
#[derive(Clone)]
pub struct SmtpProber {
    config: Arc<Config>,
    mx: Arc<dyn MxLookup>,
}

impl SmtpProber {
    pub fn new(config: Arc<Config>, mx: Arc<dyn MxLookup>) -> Self {
        Self { config, mx }
    }

    /// Classifies `email` through the SMTP dialogue.
    ///
    /// Only a 5xx at RCPT yields invalid (besides bad syntax and a domain
    /// without MX records). Timeouts, socket errors and odd replies are unknown.
    pub async fn probe(&self, email: &str) -> VerificationResult {
        let email = email.trim();
        if !is_valid_syntax(&self.config, email) {
            tracing::debug!(target: "smtp_task", "Skipping SMTP probe for malformed address '{}'", email);
            return VerificationResult::invalid_syntax();
        }
        let Some(domain) = email.rsplit_once('@').map(|(_, d)| d.to_lowercase()) else {
            return VerificationResult::invalid_syntax();
        };

        let servers = match self.mx.lookup_mx(&domain).await {
            Ok(servers) => servers,
            Err(e) => {
                tracing::warn!(target: "smtp_task", "MX lookup for {} failed: {}", domain, e);
                return VerificationResult::unknown("dns_error");
            }
        };
        let Some(mail_server) = servers.first() else {
            tracing::info!(target: "smtp_task", "No MX records for {}; <{}> is undeliverable.", domain, email);
            return VerificationResult::no_mx();
        };
        let host = mail_server.exchange.as_str();

        tracing::debug!(target: "smtp_task",
            "Starting SMTP check for <{}> via {} (preference {})",
            email, host, mail_server.preference
        );

        let result = match tokio::time::timeout(self.config.smtp_timeout, self.dialogue(email, host)).await {
            Ok(Ok(outcome)) => Self::evaluate(outcome, host),
            Ok(Err(e)) => handle_io_error(&e, host),
            Err(_) => {
                tracing::warn!(target: "smtp_task",
                    "SMTP dialogue with {} for <{}> exceeded {:?}", host, email, self.config.smtp_timeout);
                VerificationResult::unknown("timeout").with_mx_host(host)
            }
        };

        tracing::info!(target: "smtp_task",
            "SMTP result for <{}> via {}: status={}, reason={}, code={:?}",
            email, host, result.status, result.reason, result.code
        );
        result
    }

    async fn dialogue(&self, email: &str, host: &str) -> io::Result<DialogueOutcome> {
        let stream = TcpStream::connect((host, self.config.smtp_port)).await?;
        tracing::debug!(target: "smtp_task", "Connected to {}:{}", host, self.config.smtp_port);
        let (read_half, mut writer) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let banner = read_reply(&mut reader).await?;
        if !banner.is_positive() {
            return Ok(DialogueOutcome::Aborted { stage: "banner", reply: banner });
        }

        let helo = format!("HELO {}", self.config.helo_domain());
        let reply = send_command(&mut writer, &mut reader, &helo).await?;
        if !reply.is_positive() {
            quit(&mut writer).await;
            return Ok(DialogueOutcome::Aborted { stage: "HELO", reply });
        }

        let mail_from = format!("MAIL FROM:<{}>", self.config.smtp_sender_email);
        let reply = send_command(&mut writer, &mut reader, &mail_from).await?;
        if !reply.is_positive() {
            quit(&mut writer).await;
            return Ok(DialogueOutcome::Aborted { stage: "MAIL FROM", reply });
        }

        let rcpt = format!("RCPT TO:<{}>", email);
        let reply = send_command(&mut writer, &mut reader, &rcpt).await?;
        quit(&mut writer).await;
        Ok(DialogueOutcome::Recipient(reply))
    }

    fn evaluate(outcome: DialogueOutcome, host: &str) -> VerificationResult {
        match outcome {
            DialogueOutcome::Aborted { stage, reply } => {
                tracing::warn!(target: "smtp_task",
                    "{} rejected at {}: {} {}", host, stage, reply.code, reply.text());
                VerificationResult::unknown("smtp_unknown")
                    .with_code(reply.code)
                    .with_mx_host(host)
            }
            DialogueOutcome::Recipient(reply) => {
                let (status, reason) = classify_rcpt_code(reply.code);
                tracing::debug!(target: "smtp_task",
                    "RCPT reply from {}: {} {}", host, reply.code, reply.text());
                VerificationResult::new(status, reason)
                    .with_code(reply.code)
                    .with_mx_host(host)
            }
        }
    }
}

/// Maps the RCPT reply code onto a status and reason.
///
/// Only 550 and above count as a rejection of the mailbox. Lower 5xx codes
/// (bad sequence, authentication required) say nothing about the recipient.
pub fn classify_rcpt_code(code: u16) -> (EmailStatus, &'static str) {
    match code {
        550.. => (EmailStatus::Invalid, "smtp_rejected"),
        200..=399 => (EmailStatus::Valid, "smtp_accepted"),
        _ => (EmailStatus::Unknown, "smtp_unknown"),
    }
}

async fn send_command<R>(
    writer: &mut OwnedWriteHalf,
    reader: &mut R,
    command: &str,
) -> io::Result<SmtpReply>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    tracing::trace!(target: "smtp_task", ">> {}", command);
    writer.write_all(command.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    writer.flush().await?;
    let reply = read_reply(reader).await?;
    tracing::trace!(target: "smtp_task", "<< {} {}", reply.code, reply.text());
    Ok(reply)
}

/// Best effort; the reply is not awaited.
async fn quit(writer: &mut OwnedWriteHalf) {
    if let Err(e) = writer.write_all(b"QUIT\r\n").await {
        tracing::trace!(target: "smtp_task", "QUIT not delivered: {}", e);
    }
    let _ = writer.shutdown().await;
}

/// Tests outbound SMTP connectivity by reading the banner of a well-known
/// mail exchanger. Helps diagnose a blocked port 25 before a batch starts.
pub async fn check_smtp_connectivity(config: &Config) -> Result<()> {
    check_smtp_connectivity_to(CONNECTIVITY_PROBE_HOST, config.smtp_port, config.smtp_timeout).await
}

pub(crate) async fn check_smtp_connectivity_to(host: &str, port: u16, timeout: Duration) -> Result<()> {
    tracing::info!("Testing outbound SMTP (port {}) connectivity to {}...", port, host);

    let attempt = async {
        let stream = TcpStream::connect((host, port)).await?;
        let (read_half, mut writer) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let banner = read_reply(&mut reader).await?;
        quit(&mut writer).await;
        Ok::<_, io::Error>(banner)
    };

    match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(banner)) if banner.is_positive() => {
            tracing::info!("SMTP connectivity test successful ({} greeted with {}).", host, banner.code);
            Ok(())
        }
        Ok(Ok(banner)) => Err(AppError::SmtpConnectivity(format!(
            "{} answered with non-positive banner {} {}",
            host,
            banner.code,
            banner.text()
        ))),
        Ok(Err(e)) => {
            tracing::error!("SMTP connectivity test failed connecting to {}: {}", host, e);
            Err(AppError::SmtpConnectivity(format!(
                "Connection to {}:{} failed ({}). Check firewall or network settings.",
                host, port, e
            )))
        }
        Err(_) => {
            tracing::error!(
                "SMTP connectivity test timed out connecting to {}. Outbound port {} is likely blocked.",
                host, port
            );
            Err(AppError::SmtpConnectivity(format!(
                "Connection to {}:{} timed out after {:?}",
                host, port, timeout
            )))
        }
    }
}
