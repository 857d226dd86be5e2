//! Multi-server stub resolver: drives the wire codec in `rfc1035` over a configured list of
//! upstream servers, retrying per-server on timeout and falling back from UDP to TCP whenever
//! a reply comes back truncated. Unlike `dnsquery`'s original single direct UDP round-trip,
//! this is the retry loop described for a production-grade stub resolver.
use std::io::Cursor;
use std::time::Duration;

use log::{debug, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;

use crate::error::{DNSError, DNSResult};
use crate::network_order::ToFromNetworkOrder;
use crate::rfc1035::{DNSMessage, DNSQuestion, QClass, QType};

/// Default per-try wall-clock timeout, matching the spec's 3s default.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
/// Default number of attempts against a single server before moving to the next one.
pub const DEFAULT_MAX_ATTEMPTS: usize = 2;
/// Default ceiling on a UDP datagram we're willing to receive.
pub const DEFAULT_UDP_PAYLOAD_SIZE: usize = 512;

/// Configuration for a `Resolver`: the ordered upstream server list and the retry knobs.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub servers: Vec<String>,
    pub timeout: Duration,
    /// Attempts per server before moving on. 0 means "try each server exactly once".
    pub max_attempts: usize,
    pub udp_payload_size: usize,
}

impl ResolverConfig {
    pub fn new(servers: Vec<String>) -> Self {
        Self {
            servers,
            timeout: DEFAULT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            udp_payload_size: DEFAULT_UDP_PAYLOAD_SIZE,
        }
    }

    fn attempts(&self) -> usize {
        if self.max_attempts == 0 {
            1
        } else {
            self.max_attempts
        }
    }
}

/// Drives `ResolverConfig`'s upstream list for one question at a time.
#[derive(Debug, Clone)]
pub struct Resolver {
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Resolves `qname`/`qtype`/`qclass`, retrying as configured. `scratch` receives the bytes
    /// of whichever reply is ultimately accepted: the returned `DNSMessage` borrows from it, so
    /// callers decode domain names etc. out of the same buffer that produced the message.
    pub async fn query<'a>(
        &self,
        qname: &'a str,
        qtype: QType,
        qclass: QClass,
        scratch: &'a mut Vec<u8>,
    ) -> DNSResult<DNSMessage<'a>> {
        if self.config.servers.is_empty() {
            return Err(DNSError::new("resolver has no configured upstream servers"));
        }

        for server in &self.config.servers {
            for attempt in 0..self.config.attempts() {
                debug!("querying {} for {} (attempt {})", server, qname, attempt + 1);

                let mut query = DNSMessage::default();
                let question = DNSQuestion::new(qname, qtype, Some(qclass))?;
                let query_id = query.header.id;
                query.push_question(question);

                let mut send_buf = Vec::new();
                query.to_network_bytes(&mut send_buf)?;

                match self.try_udp(server, &send_buf, query_id, scratch).await {
                    Ok(Some(())) => {
                        let mut cursor = Cursor::new(scratch.as_slice());
                        let mut reply = DNSMessage::default();
                        reply.from_network_bytes(&mut cursor)?;

                        // A truncated reply is incomplete by definition, so it may carry zero
                        // answers and still need the TCP fallback: check TC independently of
                        // the full accept gate (which requires an_count >= 1) rather than after
                        // it, so a 0-answer/TC=1 reply still triggers the retry.
                        if reply.header.id == query_id && reply.header.flags.truncated {
                            debug!("{} truncated reply, retrying over TCP", server);
                            self.tcp_exchange(server, &send_buf, scratch).await?;
                            let mut cursor = Cursor::new(scratch.as_slice());
                            let mut tcp_reply = DNSMessage::default();
                            tcp_reply.from_network_bytes(&mut cursor)?;
                            return Ok(tcp_reply);
                        }

                        if !Self::accepts(&reply, query_id, qname) {
                            continue;
                        }

                        return Ok(reply);
                    }
                    Ok(None) => continue, // timed out, retry
                    Err(e) => {
                        warn!("query to {} failed: {:?}", server, e);
                        continue;
                    }
                }
            }
        }

        Err(DNSError::Timeout)
    }

    /// Sends one UDP datagram and waits up to the configured timeout for a reply, filling
    /// `scratch` with exactly the bytes received. `Ok(None)` means the wait timed out.
    async fn try_udp(
        &self,
        server: &str,
        query_bytes: &[u8],
        _query_id: u16,
        scratch: &mut Vec<u8>,
    ) -> DNSResult<Option<()>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect((server.as_str(), 53)).await?;
        socket.send(query_bytes).await?;

        scratch.clear();
        scratch.resize(self.config.udp_payload_size, 0);

        match timeout(self.config.timeout, socket.recv(scratch)).await {
            Ok(Ok(received)) => {
                scratch.truncate(received);
                Ok(Some(()))
            }
            Ok(Err(e)) => Err(DNSError::from(e)),
            Err(_) => Ok(None),
        }
    }

    /// Repeats the exchange over TCP: connect, write a 2-byte length prefix + query, read the
    /// length-prefixed reply. Used only as the truncation fallback.
    async fn tcp_exchange(
        &self,
        server: &str,
        query_bytes: &[u8],
        scratch: &mut Vec<u8>,
    ) -> DNSResult<()> {
        let mut stream = timeout(self.config.timeout, TcpStream::connect((server, 53)))
            .await
            .map_err(|_| DNSError::Timeout)??;

        let len = query_bytes.len() as u16;
        let mut framed = Vec::with_capacity(2 + query_bytes.len());
        framed.extend_from_slice(&len.to_be_bytes());
        framed.extend_from_slice(query_bytes);
        stream.write_all(&framed).await?;

        let mut len_buf = [0u8; 2];
        timeout(self.config.timeout, stream.read_exact(&mut len_buf))
            .await
            .map_err(|_| DNSError::Timeout)??;
        let reply_len = u16::from_be_bytes(len_buf) as usize;

        scratch.clear();
        scratch.resize(reply_len, 0);
        timeout(self.config.timeout, stream.read_exact(scratch))
            .await
            .map_err(|_| DNSError::Timeout)??;

        Ok(())
    }

    /// A reply is accepted iff its id matches, it reports success, carries at least one
    /// answer, and its echoed question name matches ours case-insensitively.
    fn accepts(reply: &DNSMessage<'_>, query_id: u16, qname: &str) -> bool {
        use crate::rfc1035::ResponseCode;

        if reply.header.id != query_id {
            return false;
        }
        if reply.header.flags.response_code != ResponseCode::NoError {
            return false;
        }
        if reply.header.an_count < 1 {
            return false;
        }
        match reply.question.first() {
            Some(q) => names_match(&q.name.to_string(), qname),
            None => false,
        }
    }
}

/// Compares a decoded (trailing-dot-terminated) domain name against the name we asked for,
/// ASCII-case-insensitively, ignoring a trailing root dot on either side.
fn names_match(decoded: &str, asked: &str) -> bool {
    let decoded = decoded.trim_end_matches('.');
    let asked = asked.trim_end_matches('.');
    decoded.eq_ignore_ascii_case(asked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_is_case_and_trailing_dot_insensitive() {
        assert!(names_match("WWW.Example.COM.", "www.example.com"));
        assert!(names_match("example.com", "example.com."));
        assert!(!names_match("example.com", "example.org"));
    }

    #[test]
    fn attempts_treats_zero_as_one_try() {
        let config = ResolverConfig {
            servers: vec!["127.0.0.1".into()],
            timeout: DEFAULT_TIMEOUT,
            max_attempts: 0,
            udp_payload_size: DEFAULT_UDP_PAYLOAD_SIZE,
        };
        assert_eq!(config.attempts(), 1);
    }
}
