//! Folds socket failures during an SMTP probe into a verification result.

use crate::core::models::VerificationResult;
use std::io;

/// Classifies an I/O error raised while talking to `server`.
///
/// Never returns an invalid status: greylisting and tarpitting look exactly
/// like network trouble from here.
pub(crate) fn handle_io_error(error: &io::Error, server: &str) -> VerificationResult {
    let result = match error.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
            tracing::warn!(target: "smtp_task", "Socket timed out talking to {}: {}", server, error);
            VerificationResult::unknown("timeout")
        }
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::AddrNotAvailable => {
            tracing::error!(target: "smtp_task",
                "SMTP connection to {} failed: {}. Outbound port 25 may be blocked.", server, error);
            VerificationResult::unknown("smtp_unreachable")
        }
        io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe => {
            tracing::warn!(target: "smtp_task", "{} closed the connection early: {}", server, error);
            VerificationResult::unknown("smtp_unreachable")
        }
        io::ErrorKind::InvalidData => {
            tracing::warn!(target: "smtp_task", "Unparseable reply from {}: {}", server, error);
            VerificationResult::unknown("smtp_unknown")
        }
        _ => {
            tracing::error!(target: "smtp_task", "Unhandled socket error for {}: {}", server, error);
            VerificationResult::unknown("smtp_unreachable")
        }
    };
    result.with_mx_host(server)
}
