//! SMTP reply reading.

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Longest reply line accepted before the server is treated as misbehaving.
const MAX_LINE_LEN: usize = 4096;
/// Continuation lines accepted for a single reply.
const MAX_REPLY_LINES: usize = 64;

/// A complete, possibly multi-line, server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpReply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl SmtpReply {
    /// 2xx and 3xx.
    pub fn is_positive(&self) -> bool {
        (200..400).contains(&self.code)
    }

    pub fn text(&self) -> String {
        self.lines.join(" ")
    }
}

/// Leading three-digit code of a reply line.
pub fn parse_reply_code(line: &str) -> Option<u16> {
    let digits = line.get(..3)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// `250-...` continues the reply, `250 ...` (or a bare `250`) ends it.
pub fn is_continuation(line: &str) -> bool {
    line.as_bytes().get(3) == Some(&b'-')
}

/// Reads one full reply, draining continuation lines.
///
/// The code of the final line decides the reply. EOF before the final line
/// surfaces as `UnexpectedEof`.
pub async fn read_reply<R>(reader: &mut R) -> io::Result<SmtpReply>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = Vec::new();
    loop {
        let mut raw = String::new();
        let read = reader.read_line(&mut raw).await?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the connection mid-reply",
            ));
        }
        if raw.len() > MAX_LINE_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "reply line too long",
            ));
        }

        let line = raw.trim_end_matches(['\r', '\n']).to_string();
        let code = parse_reply_code(&line).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("malformed reply line: {:?}", line),
            )
        })?;
        let more = is_continuation(&line);
        lines.push(line.get(4..).unwrap_or("").to_string());

        if !more {
            return Ok(SmtpReply { code, lines });
        }
        if lines.len() >= MAX_REPLY_LINES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "too many continuation lines",
            ));
        }
    }
}
