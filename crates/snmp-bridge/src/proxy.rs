// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request proxy.
//!
//! Receives GET/GETNEXT/GETBULK/SET requests, rewrites identifiers toward the
//! upstream agent, performs one bounded round-trip per request and answers the
//! original requester with the reply translated back.

use crate::codec::{Codec, DecodeError, EncodeError};
use crate::stats::GatewayStats;
use crate::table::{Direction, TranslationTable};
use crate::translate::translate;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, trace, warn};

/// Request proxy settings.
#[derive(Debug, Clone)]
pub struct ProxySettings {
    /// Listen address for client requests.
    pub listen: SocketAddr,
    /// Upstream agent.
    pub upstream: SocketAddr,
    /// Community used on forwarded requests.
    pub community: String,
    /// Upstream round-trip deadline.
    pub forward_timeout: Duration,
    /// Concurrent requests being proxied.
    pub max_in_flight: usize,
    /// Receive buffer size for both legs.
    pub max_datagram_size: usize,
}

/// Upstream I/O failure.
#[derive(Debug, Error)]
#[error("upstream {upstream}: {source}")]
pub struct ForwardError {
    pub upstream: SocketAddr,
    #[source]
    pub source: io::Error,
}

/// Upstream did not reply in time.
#[derive(Debug, Error)]
#[error("upstream {upstream} did not reply within {timeout:?}")]
pub struct ForwardTimeout {
    pub upstream: SocketAddr,
    pub timeout: Duration,
}

/// Reasons a request datagram is dropped.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error(transparent)]
    Timeout(#[from] ForwardTimeout),
}

/// Per-request state shared by all workers.
#[derive(Debug)]
struct Forwarder {
    upstream: SocketAddr,
    codec: Codec,
    table: Arc<TranslationTable>,
    forward_timeout: Duration,
    max_datagram_size: usize,
    stats: Arc<GatewayStats>,
}

impl Forwarder {
    /// Translate, forward and translate back. Returns the encoded reply.
    async fn process(&self, datagram: &[u8]) -> Result<Vec<u8>, ProxyError> {
        let request = self.codec.decode(datagram)?;
        debug!(
            "{} id={} with {} bindings",
            request.pdu_type,
            request.request_id,
            request.variables.len()
        );

        let (variables, translated) =
            translate(&request.variables, &self.table, Direction::SourceToTarget);
        trace!("request id={} translated={}", request.request_id, translated);

        let outbound = self.codec.encode(
            request.pdu_type,
            &variables,
            request.non_repeaters,
            request.max_repetitions,
            request.request_id,
        )?;

        let raw_reply = forward(
            self.upstream,
            &outbound,
            self.forward_timeout,
            self.max_datagram_size,
        )
        .await?;

        let reply = self.codec.decode(&raw_reply)?;
        let (variables, _) = translate(&reply.variables, &self.table, Direction::TargetToSource);

        // Upstream may pick its own request id; the requester only knows the original one.
        let response = reply.twin(variables, request.request_id);
        Ok(Codec::matching(&request).encode_packet(&response)?)
    }

    async fn serve(&self, socket: &UdpSocket, datagram: &[u8], peer: SocketAddr) {
        match self.process(datagram).await {
            Ok(reply) => match socket.send_to(&reply, peer).await {
                Ok(_) => GatewayStats::incr(&self.stats.requests_forwarded),
                Err(e) => {
                    warn!("Failed to reply to {}: {}", peer, e);
                    GatewayStats::incr(&self.stats.errors);
                }
            },
            Err(ProxyError::Timeout(e)) => {
                warn!("Dropping request from {}: {}", peer, e);
                GatewayStats::incr(&self.stats.forward_timeouts);
                GatewayStats::incr(&self.stats.requests_dropped);
            }
            Err(e) => {
                warn!("Dropping request from {}: {}", peer, e);
                GatewayStats::incr(&self.stats.requests_dropped);
            }
        }
    }
}

/// UDP request proxy.
pub struct RequestProxy {
    socket: Arc<UdpSocket>,
    forwarder: Arc<Forwarder>,
    max_in_flight: usize,
    max_datagram_size: usize,
}

impl RequestProxy {
    /// Bind the listening socket.
    pub async fn bind(
        settings: ProxySettings,
        table: Arc<TranslationTable>,
        stats: Arc<GatewayStats>,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(settings.listen).await?;
        info!(
            "Request proxy listening on {} (upstream {})",
            socket.local_addr()?,
            settings.upstream
        );

        Ok(Self {
            socket: Arc::new(socket),
            forwarder: Arc::new(Forwarder {
                upstream: settings.upstream,
                codec: Codec::new(settings.community),
                table,
                forward_timeout: settings.forward_timeout,
                max_datagram_size: settings.max_datagram_size,
                stats,
            }),
            max_in_flight: settings.max_in_flight.max(1),
            max_datagram_size: settings.max_datagram_size,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Serve until `shutdown` flips to true, then drain in-flight requests.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let mut buf = vec![0u8; self.max_datagram_size];

        while !*shutdown.borrow() {
            // Wait for a free worker before reading so the kernel buffers the backlog.
            let permit = tokio::select! {
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            let (len, peer) = tokio::select! {
                result = self.socket.recv_from(&mut buf) => match result {
                    Ok(received) => received,
                    Err(e) => {
                        // ICMP errors from earlier sends surface here on some platforms.
                        debug!("Request socket receive error: {}", e);
                        GatewayStats::incr(&self.forwarder.stats.errors);
                        continue;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            GatewayStats::incr(&self.forwarder.stats.requests_received);
            trace!("{} bytes from {}", len, peer);

            let datagram = buf[..len].to_vec();
            let socket = self.socket.clone();
            let forwarder = self.forwarder.clone();
            tokio::spawn(async move {
                let _permit = permit;
                forwarder.serve(&socket, &datagram, peer).await;
            });
        }

        let in_flight = self.max_in_flight - permits.available_permits();
        if in_flight > 0 {
            info!("Request proxy draining {} in-flight requests", in_flight);
        }
        // Every worker holds a permit until it finishes.
        let _ = permits.acquire_many(self.max_in_flight as u32).await;
        debug!("Request proxy stopped");
    }
}

/// One request/reply exchange with `upstream` over a fresh socket.
pub async fn forward(
    upstream: SocketAddr,
    request: &[u8],
    timeout: Duration,
    max_datagram_size: usize,
) -> Result<Vec<u8>, ProxyError> {
    let exchange = async {
        let local: IpAddr = if upstream.is_ipv4() {
            Ipv4Addr::UNSPECIFIED.into()
        } else {
            Ipv6Addr::UNSPECIFIED.into()
        };
        let socket = UdpSocket::bind(SocketAddr::new(local, 0)).await?;
        socket.connect(upstream).await?;
        socket.send(request).await?;

        let mut buf = vec![0u8; max_datagram_size];
        let len = socket.recv(&mut buf).await?;
        buf.truncate(len);
        Ok::<_, io::Error>(buf)
    };

    match tokio::time::timeout(timeout, exchange).await {
        Ok(Ok(reply)) => Ok(reply),
        Ok(Err(source)) => Err(ForwardError { upstream, source }.into()),
        Err(_) => Err(ForwardTimeout { upstream, timeout }.into()),
    }
}
