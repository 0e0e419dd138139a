// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Liveness heartbeat trap emitter.

use crate::codec::{Codec, EncodeError, PduType, Value, VarBind, SNMP_TRAP_OID};
use crate::stats::GatewayStats;
use crate::trap::with_uptime;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Notification identifier carried in `snmpTrapOID.0`.
pub const HEARTBEAT_TRAP_OID: &str = "1.3.6.1.4.1.100.100.0.1";

/// Status object, always `Integer(1)`.
pub const HEARTBEAT_STATUS_OID: &str = "1.3.6.1.4.1.100.100.1";

/// Heartbeat settings.
#[derive(Debug, Clone)]
pub struct HeartbeatSettings {
    pub destination: SocketAddr,
    pub community: String,
    pub interval: Duration,
}

/// Bindings of one heartbeat trap.
pub fn heartbeat_bindings(uptime_ticks: u32) -> Vec<VarBind> {
    with_uptime(
        vec![
            VarBind::new(
                SNMP_TRAP_OID,
                Value::ObjectIdentifier(HEARTBEAT_TRAP_OID.to_string()),
            ),
            VarBind::new(HEARTBEAT_STATUS_OID, Value::Integer(1)),
        ],
        uptime_ticks,
    )
}

/// Periodic heartbeat sender.
pub struct Heartbeat {
    socket: UdpSocket,
    settings: HeartbeatSettings,
    codec: Codec,
    stats: Arc<GatewayStats>,
}

impl Heartbeat {
    pub async fn bind(settings: HeartbeatSettings, stats: Arc<GatewayStats>) -> io::Result<Self> {
        let local: IpAddr = if settings.destination.is_ipv4() {
            Ipv4Addr::UNSPECIFIED.into()
        } else {
            Ipv6Addr::UNSPECIFIED.into()
        };
        let socket = UdpSocket::bind(SocketAddr::new(local, 0)).await?;
        info!(
            "Heartbeat to {} every {:?}",
            settings.destination, settings.interval
        );

        Ok(Self {
            socket,
            codec: Codec::new(settings.community.clone()),
            settings,
            stats,
        })
    }

    /// Encode heartbeat number `seq`.
    pub fn encode(&self, seq: u32) -> Result<Vec<u8>, EncodeError> {
        self.codec.encode(
            PduType::Trap,
            &heartbeat_bindings(self.stats.uptime_ticks()),
            0,
            0,
            seq,
        )
    }

    async fn send(&self, seq: u32) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let bytes = self.encode(seq)?;
        self.socket.send_to(&bytes, self.settings.destination).await?;
        Ok(())
    }

    /// Send one heartbeat now and then every interval until shutdown.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut seq: u32 = 0;

        while !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    seq = seq.wrapping_add(1);
                    match self.send(seq).await {
                        Ok(()) => {
                            debug!("Heartbeat {} sent to {}", seq, self.settings.destination);
                            GatewayStats::incr(&self.stats.heartbeats_sent);
                        }
                        Err(e) => {
                            warn!("Heartbeat to {} failed: {}", self.settings.destination, e);
                            GatewayStats::incr(&self.stats.errors);
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        debug!("Heartbeat stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SYS_UPTIME_OID;

    #[test]
    fn test_heartbeat_bindings_layout() {
        let vars = heartbeat_bindings(4200);
        assert_eq!(
            vars,
            vec![
                VarBind::new(SYS_UPTIME_OID, Value::TimeTicks(4200)),
                VarBind::new(
                    SNMP_TRAP_OID,
                    Value::ObjectIdentifier("1.3.6.1.4.1.100.100.0.1".into())
                ),
                VarBind::new("1.3.6.1.4.1.100.100.1", Value::Integer(1)),
            ]
        );
    }

    #[tokio::test]
    async fn test_sends_immediately_then_periodically() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let heartbeat = Heartbeat::bind(
            HeartbeatSettings {
                destination: receiver.local_addr().unwrap(),
                community: "alive".into(),
                interval: Duration::from_millis(50),
            },
            Arc::new(GatewayStats::new()),
        )
        .await
        .unwrap();

        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(heartbeat.run(rx));

        let codec = Codec::default();
        let mut buf = [0u8; 512];
        for expected_seq in 1..=2u32 {
            let (len, _) = tokio::time::timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
                .await
                .expect("heartbeat within deadline")
                .unwrap();
            let packet = codec.decode(&buf[..len]).unwrap();
            assert_eq!(packet.pdu_type, PduType::Trap);
            assert_eq!(packet.community, b"alive");
            assert_eq!(packet.request_id, expected_seq);
            assert_eq!(packet.variables.len(), 3);
        }

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("heartbeat stops on shutdown")
            .unwrap();
    }
}
