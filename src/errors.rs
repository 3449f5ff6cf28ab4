//! Error types for the DNS server.
//!
//! This module defines the error types used throughout the responder.

use hickory_proto::ProtoError;
use thiserror::Error;

/// Represents errors that can occur in the DNS server.
#[derive(Error, Debug)]
pub enum DnsError {
    /// I/O errors from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors related to DNS message parsing or serialization.
    #[error("Invalid DNS packet: {0}")]
    Protocol(String),

    /// Configuration errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Zone transfer negotiation refused by the transport.
    #[error("Zone transfer failed: {0}")]
    Transfer(String),
}

impl From<ProtoError> for DnsError {
    fn from(e: ProtoError) -> Self {
        DnsError::Protocol(e.to_string())
    }
}
