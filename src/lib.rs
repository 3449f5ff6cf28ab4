//! xip DNS Server Library
//!
//! This library answers DNS queries over UDP and TCP by reflecting the IPv4
//! address found in the queried name, alongside a text record describing the
//! client. It also serves a one-envelope zone transfer of the handled domain.

pub mod config;
pub mod dns;
pub mod errors;
pub mod handlers;
pub mod responder;
pub mod transfer;
pub mod utils;

// Re-export commonly used items
pub use config::ServerConfig;
pub use errors::DnsError;
pub use responder::{QueryResponder, Reply};
