//! xip DNS Server
//!
//! Answers queries with the IPv4 address embedded in the queried name, and
//! tells the client which address and transport it was seen on.

use std::sync::Arc;

use clap::Parser;
use log::{error, info};
use tokio::task;

use xip_dns_server::{
    config::{Args, ServerConfig},
    errors::DnsError,
    handlers::{run_tcp_server, run_udp_server},
    responder::QueryResponder,
};

#[tokio::main]
async fn main() -> Result<(), DnsError> {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    let config = ServerConfig::from_args(Args::parse())?;
    info!(
        "Serving {} on {} (default address {})",
        config.domain, config.bind_addr, config.default_ip
    );

    let responder = Arc::new(QueryResponder::new(config));

    // Each transport fails on its own; neither stops the process
    task::spawn({
        let responder = responder.clone();
        async move {
            if let Err(e) = run_tcp_server(responder).await {
                error!("Failed to set up the tcp server: {}", e);
            }
        }
    });
    task::spawn({
        let responder = responder.clone();
        async move {
            if let Err(e) = run_udp_server(responder).await {
                error!("Failed to set up the udp server: {}", e);
            }
        }
    });

    let signal = shutdown_signal().await?;
    info!("Signal ({}) received, stopping", signal);
    Ok(())
}

/// Wait for SIGINT or SIGTERM and return its name.
#[cfg(unix)]
async fn shutdown_signal() -> Result<&'static str, DnsError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = interrupt.recv() => Ok("SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<&'static str, DnsError> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
