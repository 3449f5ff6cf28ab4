//! Per-query routing.
//!
//! Every query received on either transport goes through
//! [`QueryResponder::respond`], which decides between a normal answer, a
//! zone transfer, an error reply, or silence.

use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::RecordType;
use log::{debug, info};

use crate::config::ServerConfig;
use crate::dns::{AnswerBuilder, Response};
use crate::transfer::{TransferOutcome, ZoneTransfer};
use crate::utils::{client_string, Peer};

/// What the transport should do with a query.
#[derive(Debug)]
pub enum Reply {
    /// Send nothing.
    Drop,
    /// Send a reply with these sections.
    Answer(Response),
    /// Send an empty reply with this response code.
    Error(ResponseCode),
    /// The query was routed to a zone transfer.
    Transfer(TransferOutcome),
}

/// Answers queries for the handled domain.
#[derive(Debug, Clone)]
pub struct QueryResponder {
    config: ServerConfig,
    builder: AnswerBuilder,
    transfer: ZoneTransfer,
}

impl QueryResponder {
    pub fn new(config: ServerConfig) -> Self {
        let builder = AnswerBuilder::new(&config);
        let transfer = ZoneTransfer::new(builder.clone(), config.verbose);
        Self {
            config,
            builder,
            transfer,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Route a parsed request from `peer`.
    pub fn respond(&self, request: &Message, peer: &Peer) -> Reply {
        if request.message_type() == MessageType::Response {
            debug!("Ignoring response message from {}", peer);
            return Reply::Drop;
        }

        if request.op_code() != OpCode::Query {
            debug!("Unsupported opcode {:?} from {}", request.op_code(), peer);
            return Reply::Error(ResponseCode::NotImp);
        }

        let query = match request.queries().first() {
            Some(query) => query,
            None => {
                debug!("Dropping query without question from {}", peer);
                return Reply::Drop;
            }
        };

        if !self.config.handles(query.name()) {
            debug!(
                "Refusing {} from {}: outside {}",
                query.name(),
                peer,
                self.config.domain
            );
            return Reply::Error(ResponseCode::Refused);
        }

        match query.query_type() {
            RecordType::AXFR | RecordType::IXFR => {
                Reply::Transfer(self.transfer.transfer(request, query, peer))
            }
            _ => {
                let response = self.answer(query, peer);
                if self.config.verbose {
                    info!(
                        ";; {} {} from {}\n{}",
                        query.name(),
                        query.query_type(),
                        peer,
                        response
                    );
                }
                Reply::Answer(response)
            }
        }
    }

    /// Build the sections for a non-transfer query.
    ///
    /// TXT queries get the client record as the answer and the address as
    /// additional data; every other type gets the reverse.
    pub fn answer(&self, query: &Query, peer: &Peer) -> Response {
        let text = self.builder.text_record(&client_string(peer));
        let address = self.builder.address_record(query.name());

        match query.query_type() {
            RecordType::TXT => Response {
                answer: vec![text],
                additional: vec![address],
            },
            _ => Response {
                answer: vec![address],
                additional: vec![text],
            },
        }
    }
}
