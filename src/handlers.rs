//! Request handlers for the DNS server.
//!
//! This module runs the UDP and TCP listeners. Both feed every query to the
//! same [`QueryResponder`] and write back whatever it decides.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hickory_proto::op::Message;
use log::{debug, error, info, warn};
use tokio::{
    io::AsyncReadExt,
    net::{TcpListener, TcpStream, UdpSocket},
    task,
    time::timeout,
};

use crate::dns::{
    encode_message, error_message, read_tcp_message, response_message, send_tcp_message,
};
use crate::errors::DnsError;
use crate::responder::{QueryResponder, Reply};
use crate::transfer::TransferOutcome;
use crate::utils::Peer;

/// Idle time after which a TCP connection is dropped.
pub const TCP_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the UDP DNS server.
///
/// # Arguments
/// * `responder` - The shared query responder.
///
/// # Returns
/// Only returns on a bind failure.
pub async fn run_udp_server(responder: Arc<QueryResponder>) -> Result<(), DnsError> {
    let bind_addr = responder.config().bind_addr;
    let socket = UdpSocket::bind(bind_addr).await?;
    serve_udp(socket, responder).await
}

/// Serve queries on an already bound UDP socket.
pub async fn serve_udp(
    socket: UdpSocket,
    responder: Arc<QueryResponder>,
) -> Result<(), DnsError> {
    info!("UDP DNS server listening on {}", socket.local_addr()?);
    let socket = Arc::new(socket);
    let mut buf = vec![0u8; responder.config().max_packet_size];

    loop {
        match socket.recv_from(&mut buf).await {
            Ok((amt, src)) => {
                let query = buf[..amt].to_vec();
                let socket = socket.clone();
                let responder = responder.clone();
                task::spawn(async move {
                    if let Err(e) = handle_udp_query(query, src, socket, responder).await {
                        warn!("UDP query error: {}", e);
                    }
                });
            }
            Err(e) => error!("UDP receive error: {}", e),
        }
    }
}

/// Handle a UDP DNS query.
///
/// # Arguments
/// * `query` - The raw DNS query.
/// * `src` - The source address of the query.
/// * `socket` - The UDP socket to send the response on.
/// * `responder` - The shared query responder.
pub async fn handle_udp_query(
    query: Vec<u8>,
    src: SocketAddr,
    socket: Arc<UdpSocket>,
    responder: Arc<QueryResponder>,
) -> Result<(), DnsError> {
    let request = match Message::from_vec(&query) {
        Ok(request) => request,
        Err(e) => {
            debug!("Received malformed query from {}: {}", src, e);
            return Ok(());
        }
    };

    let reply = match responder.respond(&request, &Peer::Datagram(src)) {
        Reply::Drop => return Ok(()),
        Reply::Answer(response) => response_message(&request, &response),
        Reply::Error(code) => error_message(&request, code),
        Reply::Transfer(TransferOutcome::Aborted(e)) => {
            debug!("UDP transfer from {} aborted: {}", src, e);
            return Ok(());
        }
        Reply::Transfer(TransferOutcome::Completed(_)) => {
            return Err(DnsError::Transfer(format!("datagram takeover for {}", src)));
        }
    };

    socket.send_to(&encode_message(&reply)?, src).await?;
    Ok(())
}

/// Run the TCP DNS server.
///
/// # Arguments
/// * `responder` - The shared query responder.
///
/// # Returns
/// Only returns on a bind failure.
pub async fn run_tcp_server(responder: Arc<QueryResponder>) -> Result<(), DnsError> {
    let bind_addr = responder.config().bind_addr;
    let listener = TcpListener::bind(bind_addr).await?;
    serve_tcp(listener, responder).await
}

/// Accept connections on an already bound TCP listener.
pub async fn serve_tcp(
    listener: TcpListener,
    responder: Arc<QueryResponder>,
) -> Result<(), DnsError> {
    info!("TCP DNS server listening on {}", listener.local_addr()?);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let responder = responder.clone();
                task::spawn(async move {
                    if let Err(e) = handle_tcp_connection(stream, addr, responder).await {
                        warn!("TCP connection error: {}", e);
                    }
                });
            }
            Err(e) => error!("TCP accept error: {}", e),
        }
    }
}

/// Handle a TCP DNS connection.
///
/// Queries are answered in sequence until the client closes the connection,
/// goes idle, or a zone transfer takes it over.
///
/// # Arguments
/// * `stream` - The TCP stream.
/// * `addr` - The client address.
/// * `responder` - The shared query responder.
pub async fn handle_tcp_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    responder: Arc<QueryResponder>,
) -> Result<(), DnsError> {
    let peer = Peer::Stream(addr);

    loop {
        let query = match timeout(TCP_TIMEOUT, read_tcp_message(&mut stream)).await {
            Ok(Ok(Some(query))) => query,
            Ok(Ok(None)) | Err(_) => return Ok(()),
            Ok(Err(e)) => return Err(e.into()),
        };

        let request = match Message::from_vec(&query) {
            Ok(request) => request,
            Err(e) => {
                debug!("Received malformed TCP query from {}: {}", addr, e);
                continue;
            }
        };

        let reply = match responder.respond(&request, &peer) {
            Reply::Drop => continue,
            Reply::Answer(response) => response_message(&request, &response),
            Reply::Error(code) => error_message(&request, code),
            Reply::Transfer(TransferOutcome::Aborted(e)) => return Err(e),
            Reply::Transfer(TransferOutcome::Completed(takeover)) => {
                for envelope in &takeover.envelopes {
                    let message = encode_message(&envelope.to_message(&request))?;
                    send_tcp_message(&mut stream, &message).await?;
                }
                debug!("Connection from {} handed over after transfer", addr);
                wait_for_close(stream).await;
                return Ok(());
            }
        };

        send_tcp_message(&mut stream, &encode_message(&reply)?).await?;
    }
}

/// Discard input until the client closes a taken-over connection.
async fn wait_for_close(mut stream: TcpStream) {
    let mut sink = [0u8; 512];
    loop {
        match timeout(TCP_TIMEOUT, stream.read(&mut sink)).await {
            Ok(Ok(0)) | Ok(Err(_)) | Err(_) => return,
            Ok(Ok(_)) => {}
        }
    }
}
