//! Stateless helpers plus the DNS and SMTP clients used by verification.

pub mod dns;
pub mod domain;
pub mod patterns;
pub mod roles;
pub mod smtp;
