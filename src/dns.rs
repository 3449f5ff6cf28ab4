//! DNS records and messages.
//!
//! This module provides the records the responder answers with, the builder
//! that derives them from a query, and the glue that turns them into
//! `hickory-proto` messages on the wire.

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr};

use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA, SOA, TXT};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::ServerConfig;
use crate::errors::DnsError;
use crate::utils::extract_ipv4;

/// TTL of address records, in seconds.
pub const ADDRESS_TTL: u32 = 300;

/// TTL of the client text record. Never cached.
pub const TEXT_TTL: u32 = 0;

/// Prefix of the client text record payload.
pub const TEXT_PREFIX: &str = "Client: ";

/// Start-of-authority timers for zone transfers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authority {
    pub mname: Name,
    pub rname: Name,
    pub serial: u32,
    pub refresh: i32,
    pub retry: i32,
    pub expire: i32,
    pub minimum: u32,
}

/// Record payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    /// IPv4 or IPv6 address.
    Address(IpAddr),
    /// One or more text strings.
    Text(Vec<String>),
    /// Zone metadata bounding a transfer.
    Authority(Authority),
}

/// A record placed in a response, built fresh for every query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub name: Name,
    pub ttl: u32,
    pub data: RecordData,
}

impl AnswerRecord {
    /// The DNS type this record is sent as.
    pub fn kind(&self) -> RecordType {
        match &self.data {
            RecordData::Address(IpAddr::V4(_)) => RecordType::A,
            RecordData::Address(IpAddr::V6(_)) => RecordType::AAAA,
            RecordData::Text(_) => RecordType::TXT,
            RecordData::Authority(_) => RecordType::SOA,
        }
    }

    /// The address carried by an address record.
    pub fn address(&self) -> Option<IpAddr> {
        match self.data {
            RecordData::Address(ip) => Some(ip),
            _ => None,
        }
    }

    /// The strings carried by a text record.
    pub fn text(&self) -> Option<&[String]> {
        match &self.data {
            RecordData::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Convert into a wire record of class IN.
    pub fn to_record(&self) -> Record {
        let rdata = match &self.data {
            RecordData::Address(IpAddr::V4(ip)) => RData::A(A(*ip)),
            RecordData::Address(IpAddr::V6(ip)) => RData::AAAA(AAAA(*ip)),
            RecordData::Text(text) => RData::TXT(TXT::new(text.clone())),
            RecordData::Authority(soa) => RData::SOA(SOA::new(
                soa.mname.clone(),
                soa.rname.clone(),
                soa.serial,
                soa.refresh,
                soa.retry,
                soa.expire,
                soa.minimum,
            )),
        };
        Record::from_rdata(self.name.clone(), self.ttl, rdata)
    }
}

impl fmt::Display for AnswerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_record())
    }
}

/// Answer and additional sections for a non-transfer query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub answer: Vec<AnswerRecord>,
    pub additional: Vec<AnswerRecord>,
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, ";; ANSWER SECTION:")?;
        for record in &self.answer {
            writeln!(f, "{}", record)?;
        }
        writeln!(f, ";; ADDITIONAL SECTION:")?;
        for record in &self.additional {
            writeln!(f, "{}", record)?;
        }
        Ok(())
    }
}

/// Builds the address and text records for a query.
#[derive(Debug, Clone)]
pub struct AnswerBuilder {
    domain: Name,
    default_ip: Ipv4Addr,
}

impl AnswerBuilder {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            domain: config.domain.clone(),
            default_ip: config.default_ip,
        }
    }

    /// The handled domain, owner of the text and authority records.
    pub fn domain(&self) -> &Name {
        &self.domain
    }

    /// Build the A record for `name`, falling back to the default address
    /// when the name carries none.
    pub fn address_record(&self, name: &Name) -> AnswerRecord {
        let ip = extract_ipv4(&name.to_ascii()).unwrap_or(self.default_ip);
        AnswerRecord {
            name: name.clone(),
            ttl: ADDRESS_TTL,
            data: RecordData::Address(IpAddr::V4(ip)),
        }
    }

    /// Build the TXT record describing the client, owned by the handled domain.
    pub fn text_record(&self, client: &str) -> AnswerRecord {
        AnswerRecord {
            name: self.domain.clone(),
            ttl: TEXT_TTL,
            data: RecordData::Text(vec![format!("{}{}", TEXT_PREFIX, client)]),
        }
    }
}

/// Start a reply to `request`: same id, opcode, RD flag and question.
pub fn reply_to(request: &Message) -> Message {
    let mut reply = Message::new();
    reply.set_id(request.id());
    reply.set_message_type(MessageType::Response);
    reply.set_op_code(request.op_code());
    reply.set_recursion_desired(request.recursion_desired());
    reply.set_recursion_available(false);
    reply.set_checking_disabled(request.checking_disabled());
    reply.set_response_code(ResponseCode::NoError);

    for query in request.queries() {
        reply.add_query(query.clone());
    }

    reply
}

/// Build the reply message carrying a response.
pub fn response_message(request: &Message, response: &Response) -> Message {
    let mut reply = reply_to(request);
    for record in &response.answer {
        reply.add_answer(record.to_record());
    }
    for record in &response.additional {
        reply.add_additional(record.to_record());
    }
    reply
}

/// Build a reply with no records and the given response code.
pub fn error_message(request: &Message, code: ResponseCode) -> Message {
    let mut reply = reply_to(request);
    reply.set_response_code(code);
    reply
}

/// Serialize a message to wire format.
pub fn encode_message(message: &Message) -> Result<Vec<u8>, DnsError> {
    Ok(message.to_vec()?)
}

/// Send a DNS message over TCP with its two-byte length prefix.
///
/// # Arguments
/// * `stream` - The stream to send the message on.
/// * `message` - The encoded DNS message.
pub async fn send_tcp_message<W>(stream: &mut W, message: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u16::try_from(message.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "DNS message too large"))?;
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(message).await?;
    stream.flush().await
}

/// Read one length-prefixed DNS message from a TCP stream.
///
/// # Returns
/// `None` once the peer has closed the stream.
pub async fn read_tcp_message<R>(stream: &mut R) -> io::Result<Option<Vec<u8>>>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 2];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let len = u16::from_be_bytes(len_buf) as usize;
    let mut message = vec![0u8; len];
    stream.read_exact(&mut message).await?;
    Ok(Some(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::{OpCode, Query};
    use std::str::FromStr;

    fn builder() -> AnswerBuilder {
        AnswerBuilder {
            domain: Name::from_str("xip.name.").unwrap(),
            default_ip: Ipv4Addr::new(188, 166, 43, 179),
        }
    }

    #[test]
    fn test_address_record() {
        let name = Name::from_str("abc.10.0.0.82.xip.name.").unwrap();
        let rr = builder().address_record(&name);

        assert_eq!(rr.name, name);
        assert_eq!(rr.ttl, 300);
        assert_eq!(rr.kind(), RecordType::A);
        assert_eq!(rr.address(), Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 82))));
    }

    #[test]
    fn test_address_record_falls_back_to_default() {
        let rr = builder().address_record(&Name::from_str("www.xip.name.").unwrap());
        assert_eq!(
            rr.address(),
            Some(IpAddr::V4(Ipv4Addr::new(188, 166, 43, 179)))
        );
    }

    #[test]
    fn test_text_record() {
        for client in ["abc", "xyz"] {
            let rr = builder().text_record(client);

            assert_eq!(rr.name.to_string(), "xip.name.");
            assert_eq!(rr.ttl, 0);
            assert_eq!(rr.kind(), RecordType::TXT);
            assert_eq!(rr.text(), Some(&[format!("Client: {}", client)][..]));
        }
    }

    #[test]
    fn test_to_record() {
        let rr = builder()
            .address_record(&Name::from_str("a.1.2.3.4.xip.name.").unwrap())
            .to_record();

        assert_eq!(rr.record_type(), RecordType::A);
        assert_eq!(rr.ttl(), 300);
        assert_eq!(rr.data(), &RData::A(A(Ipv4Addr::new(1, 2, 3, 4))));
    }

    #[test]
    fn test_response_message_copies_request() {
        let mut request = Message::new();
        request.set_id(4711);
        request.set_message_type(MessageType::Query);
        request.set_op_code(OpCode::Query);
        request.set_recursion_desired(true);
        request.add_query(Query::query(
            Name::from_str("xip.name.").unwrap(),
            RecordType::A,
        ));

        let b = builder();
        let response = Response {
            answer: vec![b.address_record(&Name::from_str("xip.name.").unwrap())],
            additional: vec![b.text_record("unknown")],
        };

        let bytes = encode_message(&response_message(&request, &response)).unwrap();
        let reply = Message::from_vec(&bytes).unwrap();

        assert_eq!(reply.id(), 4711);
        assert_eq!(reply.message_type(), MessageType::Response);
        assert!(reply.recursion_desired());
        assert_eq!(reply.queries().len(), 1);
        assert_eq!(reply.answers().len(), 1);
        assert_eq!(reply.additionals().len(), 1);
        assert_eq!(reply.answers()[0].record_type(), RecordType::A);
        assert_eq!(reply.additionals()[0].record_type(), RecordType::TXT);
    }

    #[tokio::test]
    async fn test_tcp_framing() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        send_tcp_message(&mut client, b"hello").await.unwrap();
        drop(client);

        assert_eq!(
            read_tcp_message(&mut server).await.unwrap(),
            Some(b"hello".to_vec())
        );
        assert_eq!(read_tcp_message(&mut server).await.unwrap(), None);
    }
}
