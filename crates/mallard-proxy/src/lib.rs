//! Mallard Proxy - HTTP relay in front of the duckchat conversational API.
//!
//! The proxy accepts plain chat requests, handles the upstream's VQD
//! anti-abuse token on the caller's behalf, and relays the decoded response
//! stream back — either buffered into one JSON reply or forwarded
//! incrementally.
//!
//! Design goals:
//! - Keep callers unaware of tokens, browser identities, and stream dialects.
//! - Ephemeral in-memory sessions behind a store trait (no persistence).
//! - Failures map to an HTTP status plus a small JSON error envelope.

pub mod config;
pub mod rate_limit;
pub mod server;
pub mod session;

pub use config::ProxyConfig;
pub use server::serve;
