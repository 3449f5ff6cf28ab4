//! Configuration for the DNS server.
//!
//! Settings come from command line flags, each of which falls back to an
//! environment variable and then to a built-in default. The parsed
//! `ServerConfig` is immutable for the lifetime of the process.

use std::net::{Ipv4Addr, SocketAddr};

use clap::Parser;
use hickory_proto::rr::Name;

use crate::errors::DnsError;

/// Maximum size of DNS packets in bytes.
pub const MAX_PACKET_SIZE: usize = 4096;

/// Command line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "xip-dns-server")]
#[command(
    about = "Answers DNS queries with the IPv4 address embedded in the queried name",
    long_about = None
)]
pub struct Args {
    /// Domain this server answers for.
    #[arg(long, env = "DNS_FQDN", default_value = "xip.name.")]
    pub fqdn: String,

    /// Address returned when the queried name carries none.
    #[arg(long, env = "DNS_DEFAULT_IP", default_value = "188.166.43.179")]
    pub ip: String,

    /// Address both the UDP and the TCP listener bind to.
    #[arg(long, env = "DNS_BIND", default_value = "0.0.0.0:53")]
    pub bind: String,

    /// Port to bind on, replacing the port of `--bind`.
    #[arg(short, long, env = "DNS_PORT")]
    pub port: Option<u16>,

    /// Log every response sent, at info level (hidden when RUST_LOG is
    /// stricter than info).
    #[arg(short, long, env = "DNS_VERBOSE")]
    pub verbose: bool,

    /// Size of the UDP receive buffer.
    #[arg(long, env = "DNS_MAX_PACKET_SIZE", default_value_t = MAX_PACKET_SIZE)]
    pub max_packet_size: usize,
}

/// Server configuration shared read-only by every listener and handler.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the DNS server to.
    pub bind_addr: SocketAddr,

    /// Fully qualified domain handled by this server.
    pub domain: Name,

    /// Fallback address for names without an embedded one.
    pub default_ip: Ipv4Addr,

    /// Whether responses are traced to the log.
    pub verbose: bool,

    /// Maximum size of DNS packets.
    pub max_packet_size: usize,
}

impl ServerConfig {
    /// Validate parsed arguments into a server configuration.
    ///
    /// # Returns
    /// A `Result` containing either the `ServerConfig` or a `DnsError`.
    pub fn from_args(args: Args) -> Result<Self, DnsError> {
        let mut bind_addr: SocketAddr = args
            .bind
            .parse()
            .map_err(|_| DnsError::Config(format!("Invalid bind address: {}", args.bind)))?;
        if let Some(port) = args.port {
            bind_addr.set_port(port);
        }

        let default_ip = args
            .ip
            .parse()
            .map_err(|_| DnsError::Config(format!("Invalid default IPv4 address: {}", args.ip)))?;

        if args.max_packet_size < 512 {
            return Err(DnsError::Config(format!(
                "Packet size {} is below the 512 byte DNS minimum",
                args.max_packet_size
            )));
        }

        Ok(Self {
            bind_addr,
            domain: parse_fqdn(&args.fqdn)?,
            default_ip,
            verbose: args.verbose,
            max_packet_size: args.max_packet_size,
        })
    }

    /// Whether `name` is the handled domain or one of its subdomains.
    pub fn handles(&self, name: &Name) -> bool {
        self.domain.zone_of(name)
    }
}

/// Parse a domain name, appending the root label if it is missing.
fn parse_fqdn(domain: &str) -> Result<Name, DnsError> {
    let domain = domain.trim();
    if domain.is_empty() || domain == "." {
        return Err(DnsError::Config("Handled domain must not be empty".into()));
    }

    let fqdn = if domain.ends_with('.') {
        domain.to_string()
    } else {
        format!("{}.", domain)
    };

    Name::from_ascii(&fqdn)
        .map_err(|e| DnsError::Config(format!("Invalid domain {}: {}", domain, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["xip-dns-server"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_args(args(&[
            "--fqdn",
            "xip.name.",
            "--ip",
            "188.166.43.179",
            "--bind",
            "0.0.0.0:53",
        ]))
        .unwrap();

        assert_eq!(config.domain.to_string(), "xip.name.");
        assert_eq!(config.default_ip, Ipv4Addr::new(188, 166, 43, 179));
        assert_eq!(config.bind_addr.port(), 53);
        assert!(!config.verbose);
    }

    #[test]
    fn test_fqdn_gets_trailing_dot() {
        let config = ServerConfig::from_args(args(&["--fqdn", "example.test"])).unwrap();
        assert!(config.domain.is_fqdn());
        assert_eq!(config.domain.to_string(), "example.test.");
    }

    #[test]
    fn test_port_overrides_bind() {
        let config =
            ServerConfig::from_args(args(&["--bind", "127.0.0.1:53", "-p", "5353"])).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:5353".parse().unwrap());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ServerConfig::from_args(args(&["--ip", "not-an-ip"])),
            Err(DnsError::Config(_))
        ));
        assert!(matches!(
            ServerConfig::from_args(args(&["--ip", "::1"])),
            Err(DnsError::Config(_))
        ));
        assert!(matches!(
            ServerConfig::from_args(args(&["--bind", "localhost"])),
            Err(DnsError::Config(_))
        ));
        assert!(matches!(
            ServerConfig::from_args(args(&["--fqdn", "."])),
            Err(DnsError::Config(_))
        ));
    }

    #[test]
    fn test_handles_subdomains_only() {
        let config = ServerConfig::from_args(args(&["--fqdn", "xip.name."])).unwrap();

        assert!(config.handles(&Name::from_ascii("xip.name.").unwrap()));
        assert!(config.handles(&Name::from_ascii("foo.10.0.0.82.XIP.name.").unwrap()));
        assert!(!config.handles(&Name::from_ascii("c7.se.").unwrap()));
        assert!(!config.handles(&Name::from_ascii("notxip.name.").unwrap()));
    }
}
