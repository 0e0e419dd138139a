// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Whole-gateway test driven from a configuration file.
//!
//! Request and trap ports are shared between listen and forward addresses,
//! so the agent and station live on other loopback addresses (Linux routes
//! all of 127.0.0.0/8 to `lo`).

#![cfg(target_os = "linux")]

use snmp_bridge::codec::SYS_UPTIME_OID;
use snmp_bridge::{Codec, Gateway, GatewayConfig, PduType, Value, VarBind};
use std::time::Duration;
use tokio::net::UdpSocket;

#[tokio::test]
async fn test_gateway_from_config_file() {
    let agent = UdpSocket::bind("127.0.0.2:0").await.unwrap();
    let station = UdpSocket::bind("127.0.0.3:0").await.unwrap();
    let request_port = agent.local_addr().unwrap().port();
    let trap_port = station.local_addr().unwrap().port();

    let toml = format!(
        r#"
target_ip = "127.0.0.3"
source_ip = "127.0.0.1"
proxy_lk_ip = "127.0.0.2"
request_port = {request_port}
trap_port = {trap_port}
http_enabled = false
forward_timeout_ms = 1000

[[oids]]
source_oid = "1.3.6.1.4.1.2021.8.1.0"
target_oid = "1.3.6.1.4.1.9999.1.1.0"
translation_type = "voltage"
"#
    );
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, toml).unwrap();

    let config = GatewayConfig::from_file(&path).unwrap();
    let handle = Gateway::new(config).unwrap().start().await.unwrap();
    assert!(handle.is_running());
    assert!(handle.http_addr().is_none());

    tokio::spawn(async move {
        let codec = Codec::default();
        let mut buf = vec![0u8; 4096];
        let (len, peer) = agent.recv_from(&mut buf).await.unwrap();
        let request = codec.decode(&buf[..len]).unwrap();
        assert_eq!(request.variables[0].oid, "1.3.6.1.4.1.2021.8.1.0");

        let mut reply = request.twin(
            vec![VarBind::new(
                "1.3.6.1.4.1.2021.8.1.0",
                Value::OctetString(b"3.3".to_vec()),
            )],
            request.request_id,
        );
        reply.pdu_type = PduType::Response;
        agent
            .send_to(&codec.encode_packet(&reply).unwrap(), peer)
            .await
            .unwrap();
    });

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let codec = Codec::default();
    let mut buf = vec![0u8; 4096];

    // Request path
    let request = codec
        .encode(PduType::Get, &[VarBind::null("1.3.6.1.4.1.9999.1.1.0")], 0, 0, 77)
        .unwrap();
    client.send_to(&request, handle.request_addr()).await.unwrap();
    let (len, _) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
        .await
        .expect("proxied reply")
        .unwrap();
    let reply = codec.decode(&buf[..len]).unwrap();
    assert_eq!(reply.request_id, 77);
    assert_eq!(
        reply.variables,
        vec![VarBind::new("1.3.6.1.4.1.9999.1.1.0", Value::Integer(330))]
    );

    // Trap path
    let device_trap = codec
        .encode(
            PduType::Trap,
            &[VarBind::new(
                "1.3.6.1.4.1.2021.8.1.0",
                Value::OctetString(b"11.9".to_vec()),
            )],
            0,
            0,
            5,
        )
        .unwrap();
    client.send_to(&device_trap, handle.trap_addr()).await.unwrap();
    let (len, _) = tokio::time::timeout(Duration::from_secs(2), station.recv_from(&mut buf))
        .await
        .expect("relayed trap")
        .unwrap();
    let relayed = codec.decode(&buf[..len]).unwrap();
    assert_eq!(relayed.variables[0].oid, SYS_UPTIME_OID);
    assert_eq!(
        relayed.variables[1],
        VarBind::new("1.3.6.1.4.1.9999.1.1.0", Value::Integer(1190))
    );

    let stats = tokio::time::timeout(Duration::from_secs(3), handle.shutdown())
        .await
        .expect("gateway shuts down");
    assert_eq!(stats.requests_forwarded, 1);
    assert_eq!(stats.traps_relayed, 1);
}
