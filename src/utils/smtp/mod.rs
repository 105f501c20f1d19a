//! SMTP mailbox probing over a plain TCP socket.

mod client;
mod error;
mod reply;

pub use client::{check_smtp_connectivity, classify_rcpt_code, SmtpProber, CONNECTIVITY_PROBE_HOST};
pub use reply::{is_continuation, parse_reply_code, read_reply, SmtpReply};
