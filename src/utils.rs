//! Utility functions for DNS operations.
//!
//! This module provides the pure helpers the responder builds answers from:
//! pulling an IPv4 literal out of a queried name and describing the peer a
//! query arrived from.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::OnceLock;

use regex::Regex;

/// Four dot-separated groups of one to three digits.
static IPV4_PATTERN: OnceLock<Regex> = OnceLock::new();

fn ipv4_pattern() -> &'static Regex {
    IPV4_PATTERN.get_or_init(|| {
        Regex::new(r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}").expect("IPv4 pattern is valid")
    })
}

/// Extract the first IPv4 address embedded in a name.
///
/// A candidate must not be glued to a longer numeric run: the byte before it
/// may not be a digit or a dot that follows a digit, and the byte after it
/// may not be a digit or a dot that precedes one. So `foo.10.0.0.82.xip.name.`
/// yields `10.0.0.82`, while `1.2.3.4.5` yields nothing.
///
/// # Arguments
/// * `name` - The name to scan, in presentation format.
///
/// # Returns
/// The address of the first bounded match, or `None` when there is no match
/// or the first match has an octet above 255.
pub fn extract_ipv4(name: &str) -> Option<Ipv4Addr> {
    let bytes = name.as_bytes();

    ipv4_pattern()
        .find_iter(name)
        .find(|m| bounded_before(bytes, m.start()) && bounded_after(bytes, m.end()))
        .and_then(|m| parse_octets(m.as_str()))
}

/// Parse a dotted quad, accepting zero-padded groups such as `001`.
fn parse_octets(quad: &str) -> Option<Ipv4Addr> {
    let mut octets = [0u8; 4];
    let mut groups = quad.split('.');
    for octet in octets.iter_mut() {
        *octet = groups.next()?.parse().ok()?;
    }
    match groups.next() {
        Some(_) => None,
        None => Some(Ipv4Addr::from(octets)),
    }
}

fn bounded_before(bytes: &[u8], start: usize) -> bool {
    match start.checked_sub(1).map(|i| bytes[i]) {
        None => true,
        Some(b) if b.is_ascii_digit() => false,
        Some(b'.') => !(start >= 2 && bytes[start - 2].is_ascii_digit()),
        Some(_) => true,
    }
}

fn bounded_after(bytes: &[u8], end: usize) -> bool {
    match bytes.get(end) {
        None => true,
        Some(b) if b.is_ascii_digit() => false,
        Some(b'.') => !bytes.get(end + 1).is_some_and(|b| b.is_ascii_digit()),
        Some(_) => true,
    }
}

/// The transport a query arrived on, with the remote address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peer {
    /// A TCP client.
    Stream(SocketAddr),
    /// A UDP client.
    Datagram(SocketAddr),
    /// A peer whose transport cannot be identified.
    Unknown,
}

impl Peer {
    /// Whether this peer can receive a multi-message stream.
    pub fn is_stream(&self) -> bool {
        matches!(self, Peer::Stream(_))
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Peer::Datagram(addr) => write!(f, "{} (udp)", addr),
            Peer::Stream(addr) => write!(f, "{} (tcp)", addr),
            Peer::Unknown => f.write_str("unknown"),
        }
    }
}

/// Describe a peer as `ip:port (proto)`, or `unknown`.
pub fn client_string(peer: &Peer) -> String {
    peer.to_string()
}
