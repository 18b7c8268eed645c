pub mod nameserver;
pub mod wildcard;

use std::future::Future;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{Name, RData, RecordType};
use hickory_proto::serialize::binary::BinEncodable;
use hickory_proto::ProtoError;
use log::{debug, warn};
use serde::Serialize;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time;

pub use nameserver::{NameserverPool, DEFAULT_NAMESERVERS};

pub const DNS_TIMEOUT: Duration = Duration::from_secs(2);

/// Number of exchanges attempted per candidate before it is dropped.
pub const RESOLVE_ATTEMPTS: usize = 3;

const MAX_RESPONSE_SIZE: usize = 4096;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResolveResult {
    pub domain: String,
    pub a_records: Vec<String>,
    pub cname_records: Vec<String>,
}

impl ResolveResult {
    pub fn has_records(&self) -> bool {
        !self.a_records.is_empty() || !self.cname_records.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum DnsError {
    #[error("nameserver pool is empty")]
    EmptyPool,

    #[error("invalid domain name '{domain}': {source}")]
    InvalidName {
        domain: String,
        #[source]
        source: ProtoError,
    },

    #[error("failed to encode query for {domain}: {source}")]
    Encode {
        domain: String,
        #[source]
        source: ProtoError,
    },

    #[error("malformed response from {nameserver}: {source}")]
    Decode {
        nameserver: SocketAddr,
        #[source]
        source: ProtoError,
    },

    #[error("response id {actual} from {nameserver} does not match query id {expected}")]
    IdMismatch {
        nameserver: SocketAddr,
        expected: u16,
        actual: u16,
    },

    #[error("query to {nameserver} timed out after {timeout:?}")]
    Timeout {
        nameserver: SocketAddr,
        timeout: Duration,
    },

    #[error("transport error talking to {nameserver}: {source}")]
    Io {
        nameserver: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// A single A/CNAME lookup. Each resolution worker owns its own value.
pub trait Resolve: Clone + Send + Sync + 'static {
    fn resolve(&self, domain: &str)
        -> impl Future<Output = Result<ResolveResult, DnsError>> + Send;
}

#[derive(Clone, Debug)]
pub struct DnsClient {
    pool: NameserverPool,
    timeout: Duration,
}

impl DnsClient {
    pub fn new(pool: NameserverPool) -> Self {
        Self {
            pool,
            timeout: DNS_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sends one recursive A query for `domain` to `nameserver` over UDP.
    pub async fn exchange(
        &self,
        domain: &str,
        nameserver: SocketAddr,
    ) -> Result<ResolveResult, DnsError> {
        let name = Name::from_ascii(format!("{}.", domain.trim_end_matches('.'))).map_err(
            |source| DnsError::InvalidName {
                domain: domain.to_string(),
                source,
            },
        )?;

        let id: u16 = rand::random();
        let mut query = Message::new();
        query
            .set_id(id)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(true)
            .add_query(Query::query(name, RecordType::A));
        let payload = query.to_bytes().map_err(|source| DnsError::Encode {
            domain: domain.to_string(),
            source,
        })?;

        let raw = time::timeout(self.timeout, send_and_receive(&payload, nameserver))
            .await
            .map_err(|_| DnsError::Timeout {
                nameserver,
                timeout: self.timeout,
            })?
            .map_err(|source| DnsError::Io { nameserver, source })?;

        let response =
            Message::from_vec(&raw).map_err(|source| DnsError::Decode { nameserver, source })?;
        if response.id() != id {
            return Err(DnsError::IdMismatch {
                nameserver,
                expected: id,
                actual: response.id(),
            });
        }

        Ok(extract_records(domain, &response))
    }
}

impl Resolve for DnsClient {
    async fn resolve(&self, domain: &str) -> Result<ResolveResult, DnsError> {
        let nameserver = self.pool.pick().ok_or(DnsError::EmptyPool)?;
        self.exchange(domain, nameserver).await
    }
}

async fn send_and_receive(payload: &[u8], nameserver: SocketAddr) -> std::io::Result<Vec<u8>> {
    let local: SocketAddr = if nameserver.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = UdpSocket::bind(local).await?;
    socket.connect(nameserver).await?;
    socket.send(payload).await?;

    let mut buf = vec![0u8; MAX_RESPONSE_SIZE];
    let len = socket.recv(&mut buf).await?;
    buf.truncate(len);
    Ok(buf)
}

fn extract_records(domain: &str, response: &Message) -> ResolveResult {
    let mut result = ResolveResult {
        domain: domain.to_string(),
        ..Default::default()
    };
    for answer in response.answers() {
        match answer.data() {
            RData::A(a) => result.a_records.push(a.to_string()),
            RData::CNAME(cname) => result.cname_records.push(cname.to_string()),
            _ => {}
        }
    }
    result
}

/// Resolves `domain`, retrying failed exchanges. Returns `None` once every
/// attempt has failed; an empty answer is a success and is returned as is.
pub async fn resolve_with_retry<R: Resolve>(
    resolver: &R,
    domain: &str,
    attempts: usize,
) -> Option<ResolveResult> {
    for attempt in 1..=attempts {
        match resolver.resolve(domain).await {
            Ok(result) => return Some(result),
            Err(e) => warn!(
                "dns resolve failed, domain: {domain}, attempt {attempt}/{attempts}: {e}"
            ),
        }
    }
    debug!("dropping {domain} after {attempts} failed attempts");
    None
}

#[cfg(test)]
pub(crate) mod testing {
    use std::net::SocketAddr;

    use hickory_proto::op::{Message, MessageType};
    use hickory_proto::rr::rdata::{A, CNAME};
    use hickory_proto::rr::{Name, RData, Record};
    use hickory_proto::serialize::binary::BinEncodable;
    use tokio::net::UdpSocket;

    /// Answers every query: names under `www.` get a CNAME plus an A record,
    /// everything else gets an empty answer section.
    pub async fn spawn_fake_nameserver() -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            loop {
                let (len, peer) = match socket.recv_from(&mut buf).await {
                    Ok(v) => v,
                    Err(_) => break,
                };
                let query = match Message::from_vec(&buf[..len]) {
                    Ok(q) => q,
                    Err(_) => continue,
                };
                let mut response = Message::new();
                response
                    .set_id(query.id())
                    .set_message_type(MessageType::Response)
                    .set_op_code(query.op_code())
                    .set_recursion_desired(true)
                    .set_recursion_available(true);
                response.add_queries(query.queries().to_vec());
                if let Some(question) = query.queries().first() {
                    let name = question.name().clone();
                    if name.to_ascii().starts_with("www.") {
                        let target = Name::from_ascii("edge.example.net.").unwrap();
                        response.add_answer(Record::from_rdata(
                            name.clone(),
                            60,
                            RData::CNAME(CNAME(target)),
                        ));
                        response.add_answer(Record::from_rdata(
                            name,
                            60,
                            RData::A(A::new(1, 2, 3, 4)),
                        ));
                    }
                }
                let bytes = response.to_bytes().unwrap();
                let _ = socket.send_to(&bytes, peer).await;
            }
        });
        addr
    }

    /// Binds a socket that reads queries and never answers.
    pub async fn spawn_silent_nameserver() -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            while socket.recv_from(&mut buf).await.is_ok() {}
        });
        addr
    }
}
