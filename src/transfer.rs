//! Zone transfers.
//!
//! The handled zone is synthetic: a transfer streams a single envelope of
//! `[SOA, TXT, A, SOA]` and then hands the connection back to the client,
//! which is expected to close it.

use hickory_proto::op::{Message, Query};
use log::{debug, info};

use crate::dns::{reply_to, AnswerBuilder, AnswerRecord, Authority, RecordData};
use crate::errors::DnsError;
use crate::utils::{client_string, Peer};

/// Serial of the synthetic zone.
pub const ZONE_SERIAL: u32 = 2009032802;

/// TTL of the authority record.
pub const AUTHORITY_TTL: u32 = 1440;

pub const REFRESH: i32 = 21600;
pub const RETRY: i32 = 7200;
pub const EXPIRE: i32 = 604800;
pub const MINIMUM_TTL: u32 = 3600;

/// Records streamed together in one transfer message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEnvelope {
    pub records: Vec<AnswerRecord>,
}

impl TransferEnvelope {
    /// Build the message carrying this envelope in its answer section.
    pub fn to_message(&self, request: &Message) -> Message {
        let mut message = reply_to(request);
        for record in &self.records {
            message.add_answer(record.to_record());
        }
        message
    }
}

/// Outbound stream of envelopes for one transfer.
///
/// Obtained from [`TransferChannel::open`], which refuses peers that are not
/// on a stream transport.
#[derive(Debug)]
pub struct TransferChannel {
    envelopes: Vec<TransferEnvelope>,
}

impl TransferChannel {
    /// Negotiate an outbound transfer stream to `peer`.
    pub fn open(peer: &Peer) -> Result<Self, DnsError> {
        if !peer.is_stream() {
            return Err(DnsError::Transfer(format!(
                "transfer to {} requires a stream transport",
                client_string(peer)
            )));
        }

        Ok(Self {
            envelopes: Vec::new(),
        })
    }

    /// Queue an envelope for delivery.
    pub fn send(&mut self, envelope: TransferEnvelope) {
        self.envelopes.push(envelope);
    }

    /// Stop generic reply handling and give the connection to the client.
    pub fn hijack(self) -> Takeover {
        Takeover {
            envelopes: self.envelopes,
        }
    }
}

/// Terminal state of a successful transfer.
///
/// The transport writes `envelopes` in order and then writes nothing more on
/// the connection; the client closes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Takeover {
    pub envelopes: Vec<TransferEnvelope>,
}

/// Result of [`ZoneTransfer::transfer`].
#[derive(Debug)]
pub enum TransferOutcome {
    Completed(Takeover),
    Aborted(DnsError),
}

/// Drives AXFR/IXFR queries for the handled zone.
#[derive(Debug, Clone)]
pub struct ZoneTransfer {
    builder: AnswerBuilder,
    verbose: bool,
}

impl ZoneTransfer {
    pub fn new(builder: AnswerBuilder, verbose: bool) -> Self {
        Self { builder, verbose }
    }

    /// The SOA record bounding every transfer.
    pub fn authority_record(&self) -> AnswerRecord {
        let domain = self.builder.domain().clone();
        AnswerRecord {
            name: domain.clone(),
            ttl: AUTHORITY_TTL,
            data: RecordData::Authority(Authority {
                mname: domain.clone(),
                rname: domain,
                serial: ZONE_SERIAL,
                refresh: REFRESH,
                retry: RETRY,
                expire: EXPIRE,
                minimum: MINIMUM_TTL,
            }),
        }
    }

    /// Run a transfer for `query`.
    ///
    /// # Arguments
    /// * `request` - The full request message.
    /// * `query` - The transfer question.
    /// * `peer` - The client requesting the transfer.
    pub fn transfer(&self, request: &Message, query: &Query, peer: &Peer) -> TransferOutcome {
        let mut channel = match TransferChannel::open(peer) {
            Ok(channel) => channel,
            Err(e) => {
                if self.verbose {
                    info!("Zone transfer of {} aborted: {}", query.name(), e);
                }
                return TransferOutcome::Aborted(e);
            }
        };

        let soa = self.authority_record();
        let text = self.builder.text_record(&client_string(peer));
        let address = self.builder.address_record(query.name());

        debug!("Streaming zone {} to {}", query.name(), peer);
        channel.send(TransferEnvelope {
            records: vec![soa.clone(), text, address, soa],
        });

        TransferOutcome::Completed(channel.hijack())
    }
}
