// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Trap relay.
//!
//! Device notifications (SNMPv2 traps, InformRequests and SNMPv1 traps) are
//! translated toward the management station and re-sent as SNMPv2 traps only
//! when at least one binding matched a rule. Informs are acknowledged to the
//! sender whether or not they are relayed.

use crate::codec::{
    Codec, DecodeError, EncodeError, Packet, PduType, V1TrapHeader, Value, VarBind,
    SNMP_TRAP_OID, SYS_UPTIME_OID,
};
use crate::stats::GatewayStats;
use crate::table::{Direction, TranslationTable};
use crate::translate::translate;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// `snmpTraps`, parent of the generic trap identifiers.
const SNMP_TRAPS_OID: &str = "1.3.6.1.6.3.1.1.5";
/// `snmpTrapAddress.0`
const SNMP_TRAP_ADDRESS_OID: &str = "1.3.6.1.6.3.18.1.3.0";
/// `snmpTrapCommunity.0`
const SNMP_TRAP_COMMUNITY_OID: &str = "1.3.6.1.6.3.18.1.4.0";
/// `snmpTrapEnterprise.0`
const SNMP_TRAP_ENTERPRISE_OID: &str = "1.3.6.1.6.3.1.1.4.3.0";

const ENTERPRISE_SPECIFIC: u32 = 6;

/// Trap relay settings.
#[derive(Debug, Clone)]
pub struct TrapSettings {
    /// Listen address for device traps.
    pub listen: SocketAddr,
    /// Management station.
    pub destination: SocketAddr,
    /// Community on relayed traps.
    pub community: String,
    pub max_datagram_size: usize,
}

/// Reasons a trap is not relayed.
#[derive(Debug, Error)]
pub enum TrapError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("{0} received on trap port")]
    NotTrap(PduType),

    #[error("no binding matched a translation rule")]
    Untranslated,

    #[error("send to {destination}: {source}")]
    Send {
        destination: SocketAddr,
        #[source]
        source: io::Error,
    },
}

impl TrapError {
    /// Drops that are part of normal operation.
    fn is_expected(&self) -> bool {
        matches!(self, Self::NotTrap(_) | Self::Untranslated)
    }
}

/// Prepend `sysUpTime.0` unless the list already starts with it.
pub fn with_uptime(mut variables: Vec<VarBind>, uptime_ticks: u32) -> Vec<VarBind> {
    let has_uptime = variables
        .first()
        .is_some_and(|vb| vb.oid == SYS_UPTIME_OID);
    if !has_uptime {
        variables.insert(0, VarBind::new(SYS_UPTIME_OID, Value::TimeTicks(uptime_ticks)));
    }
    variables
}

/// SNMPv2 bindings for an SNMPv1 trap (RFC 3584, section 3.1).
///
/// The time-stamp becomes `sysUpTime.0` and the generic/specific pair becomes
/// `snmpTrapOID.0`. Agent address, community and enterprise are appended
/// unless the trap already carries them.
pub fn v1_trap_bindings(
    header: &V1TrapHeader,
    community: &[u8],
    variables: &[VarBind],
) -> Vec<VarBind> {
    let trap_oid = if header.generic_trap == ENTERPRISE_SPECIFIC {
        format!("{}.0.{}", header.enterprise, header.specific_trap)
    } else {
        format!("{}.{}", SNMP_TRAPS_OID, u64::from(header.generic_trap) + 1)
    };

    let mut out = Vec::with_capacity(variables.len() + 5);
    out.push(VarBind::new(SYS_UPTIME_OID, Value::TimeTicks(header.timestamp)));
    out.push(VarBind::new(SNMP_TRAP_OID, Value::ObjectIdentifier(trap_oid)));
    out.extend_from_slice(variables);

    let trailers = [
        (SNMP_TRAP_ADDRESS_OID, Value::IpAddress(header.agent_addr)),
        (SNMP_TRAP_COMMUNITY_OID, Value::OctetString(community.to_vec())),
        (SNMP_TRAP_ENTERPRISE_OID, Value::ObjectIdentifier(header.enterprise.clone())),
    ];
    for (oid, value) in trailers {
        if !variables.iter().any(|vb| vb.oid == oid) {
            out.push(VarBind::new(oid, value));
        }
    }
    out
}

/// Response acknowledging an InformRequest, in the sender's version and community.
pub fn inform_response(inform: &Packet) -> Result<Vec<u8>, EncodeError> {
    let mut response = inform.twin(inform.variables.clone(), inform.request_id);
    response.pdu_type = PduType::Response;
    response.error_status = 0;
    response.error_index = 0;
    Codec::matching(inform).encode_packet(&response)
}

/// UDP trap relay.
pub struct TrapRelay {
    socket: UdpSocket,
    outbound: UdpSocket,
    destination: SocketAddr,
    decoder: Codec,
    encoder: Codec,
    table: Arc<TranslationTable>,
    stats: Arc<GatewayStats>,
    max_datagram_size: usize,
}

impl TrapRelay {
    /// Bind the trap listener and the outbound socket.
    pub async fn bind(
        settings: TrapSettings,
        table: Arc<TranslationTable>,
        stats: Arc<GatewayStats>,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(settings.listen).await?;
        let local: IpAddr = if settings.destination.is_ipv4() {
            Ipv4Addr::UNSPECIFIED.into()
        } else {
            Ipv6Addr::UNSPECIFIED.into()
        };
        let outbound = UdpSocket::bind(SocketAddr::new(local, 0)).await?;

        info!(
            "Trap relay listening on {} (relaying to {})",
            socket.local_addr()?,
            settings.destination
        );

        Ok(Self {
            socket,
            outbound,
            destination: settings.destination,
            decoder: Codec::default(),
            encoder: Codec::new(settings.community),
            table,
            stats,
            max_datagram_size: settings.max_datagram_size,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Decode a notification received on the trap port.
    fn decode(&self, datagram: &[u8]) -> Result<Packet, TrapError> {
        let packet = self.decoder.decode(datagram)?;
        match packet.pdu_type {
            PduType::Trap | PduType::TrapV1 | PduType::Inform => Ok(packet),
            other => Err(TrapError::NotTrap(other)),
        }
    }

    /// Translate a notification into the SNMPv2 trap to relay.
    pub fn rewrap(&self, notification: &Packet) -> Result<Vec<u8>, TrapError> {
        let (variables, translated) = match &notification.v1_trap {
            Some(header) => translate(
                &v1_trap_bindings(header, &notification.community, &notification.variables),
                &self.table,
                Direction::TargetToSource,
            ),
            None => translate(&notification.variables, &self.table, Direction::TargetToSource),
        };
        if !translated {
            return Err(TrapError::Untranslated);
        }

        let variables = with_uptime(variables, self.stats.uptime_ticks());
        Ok(self
            .encoder
            .encode(PduType::Trap, &variables, 0, 0, notification.request_id)?)
    }

    /// Translate one inbound datagram into the trap to relay.
    pub fn prepare(&self, datagram: &[u8]) -> Result<Vec<u8>, TrapError> {
        let notification = self.decode(datagram)?;
        self.rewrap(&notification)
    }

    async fn acknowledge(&self, inform: &Packet, peer: SocketAddr) {
        let response = match inform_response(inform) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Cannot acknowledge inform from {}: {}", peer, e);
                GatewayStats::incr(&self.stats.errors);
                return;
            }
        };
        match self.socket.send_to(&response, peer).await {
            Ok(_) => GatewayStats::incr(&self.stats.informs_acked),
            Err(e) => {
                warn!("Failed to acknowledge inform from {}: {}", peer, e);
                GatewayStats::incr(&self.stats.errors);
            }
        }
    }

    async fn relay(&self, datagram: &[u8], peer: SocketAddr) -> Result<(), TrapError> {
        let notification = self.decode(datagram)?;
        if notification.pdu_type == PduType::Inform {
            self.acknowledge(&notification, peer).await;
        }

        let bytes = self.rewrap(&notification)?;
        self.outbound
            .send_to(&bytes, self.destination)
            .await
            .map_err(|source| TrapError::Send {
                destination: self.destination,
                source,
            })?;
        Ok(())
    }

    /// Relay traps until `shutdown` flips to true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut buf = vec![0u8; self.max_datagram_size];

        while !*shutdown.borrow() {
            let (len, peer) = tokio::select! {
                result = self.socket.recv_from(&mut buf) => match result {
                    Ok(received) => received,
                    Err(e) => {
                        debug!("Trap socket receive error: {}", e);
                        GatewayStats::incr(&self.stats.errors);
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

            GatewayStats::incr(&self.stats.traps_received);
            trace!("trap: {} bytes from {}", len, peer);

            match self.relay(&buf[..len], peer).await {
                Ok(()) => {
                    debug!("Relayed trap from {} to {}", peer, self.destination);
                    GatewayStats::incr(&self.stats.traps_relayed);
                }
                Err(e @ TrapError::Send { .. }) => {
                    warn!("Trap from {} not relayed: {}", peer, e);
                    GatewayStats::incr(&self.stats.errors);
                }
                Err(e) if e.is_expected() => {
                    debug!("Dropping trap from {}: {}", peer, e);
                    GatewayStats::incr(&self.stats.traps_dropped);
                }
                Err(e) => {
                    warn!("Dropping trap from {}: {}", peer, e);
                    GatewayStats::incr(&self.stats.traps_dropped);
                }
            }
        }

        debug!("Trap relay stopped");
    }
}
