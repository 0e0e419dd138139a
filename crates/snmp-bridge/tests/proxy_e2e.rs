// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end tests for the request proxy against a stub upstream agent.

use snmp_bridge::{
    Codec, GatewayStats, Packet, PduType, ProxySettings, RequestProxy, TransformKind,
    TranslationRule, TranslationTable, Value, VarBind,
};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

const STATION_VOLT: &str = "1.3.6.1.4.1.9999.1.1.0";
const AGENT_VOLT: &str = "1.3.6.1.4.1.2021.8.1.0";
const STATION_NAME: &str = "1.3.6.1.4.1.9999.1.3.0";
const AGENT_NAME: &str = "1.3.6.1.4.1.2021.8.3.0";

const UPSTREAM_REQUEST_ID_OFFSET: u32 = 1000;

fn table() -> Arc<TranslationTable> {
    Arc::new(TranslationTable::build(vec![
        TranslationRule::new(STATION_VOLT, AGENT_VOLT, TransformKind::Voltage),
        TranslationRule::new(STATION_NAME, AGENT_NAME, TransformKind::None),
    ]))
}

/// Agent that answers every request after the first `ignore` ones, each
/// after `delay`.
///
/// Replies carry a different request id so the proxy must restore it.
async fn stub_agent(
    ignore: usize,
    delay: Duration,
) -> (SocketAddr, mpsc::UnboundedReceiver<Packet>) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let codec = Codec::new("agent");
        let mut buf = vec![0u8; 4096];
        let mut seen = 0;
        loop {
            let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                break;
            };
            let request = codec.decode(&buf[..len]).unwrap();
            let _ = tx.send(request.clone());

            seen += 1;
            if seen <= ignore {
                continue;
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let variables = request
                .variables
                .iter()
                .map(|vb| match vb.oid.as_str() {
                    AGENT_VOLT => VarBind::new(AGENT_VOLT, Value::OctetString(b"12.34".to_vec())),
                    AGENT_NAME => VarBind::new(AGENT_NAME, Value::OctetString(b"cabinet".to_vec())),
                    _ => VarBind::new(vb.oid.clone(), Value::NoSuchObject),
                })
                .collect();
            let mut reply = request.twin(
                variables,
                request.request_id.wrapping_add(UPSTREAM_REQUEST_ID_OFFSET),
            );
            reply.pdu_type = PduType::Response;

            let bytes = codec.encode_packet(&reply).unwrap();
            socket.send_to(&bytes, peer).await.unwrap();
        }
    });

    (addr, rx)
}

struct RunningProxy {
    addr: SocketAddr,
    stats: Arc<GatewayStats>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

async fn start_proxy(upstream: SocketAddr, forward_timeout: Duration) -> RunningProxy {
    let stats = Arc::new(GatewayStats::new());
    let proxy = RequestProxy::bind(
        ProxySettings {
            listen: "127.0.0.1:0".parse().unwrap(),
            upstream,
            community: "agent".into(),
            forward_timeout,
            max_in_flight: 8,
            max_datagram_size: 4096,
        },
        table(),
        stats.clone(),
    )
    .await
    .unwrap();

    let addr = proxy.local_addr().unwrap();
    let (shutdown, rx) = watch::channel(false);
    let task = tokio::spawn(proxy.run(rx));
    RunningProxy {
        addr,
        stats,
        shutdown,
        task,
    }
}

fn get(oid: &str, request_id: u32) -> Vec<u8> {
    Codec::default()
        .encode(PduType::Get, &[VarBind::null(oid)], 0, 0, request_id)
        .unwrap()
}

async fn exchange(client: &UdpSocket, proxy: SocketAddr, request: &[u8]) -> Option<Packet> {
    client.send_to(request, proxy).await.unwrap();
    let mut buf = vec![0u8; 4096];
    match tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf)).await {
        Ok(Ok((len, _))) => Some(Codec::default().decode(&buf[..len]).unwrap()),
        _ => None,
    }
}

#[tokio::test]
async fn test_get_round_trip_restores_identifiers_and_request_id() {
    let (agent, mut seen) = stub_agent(0, Duration::ZERO).await;
    let running = start_proxy(agent, Duration::from_secs(2)).await;
    let (proxy, stats) = (running.addr, running.stats.clone());
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let request = Codec::new("station")
        .encode(
            PduType::Get,
            &[
                VarBind::null(STATION_VOLT),
                VarBind::null(STATION_NAME),
                VarBind::null("1.3.6.1.2.1.1.1.0"),
            ],
            0,
            0,
            4242,
        )
        .unwrap();

    let reply = exchange(&client, proxy, &request).await.expect("reply");

    assert_eq!(reply.pdu_type, PduType::Response);
    assert_eq!(reply.request_id, 4242);
    assert_eq!(reply.community, b"station");
    assert_eq!(
        reply.variables,
        vec![
            VarBind::new(STATION_VOLT, Value::Integer(1234)),
            VarBind::new(STATION_NAME, Value::OctetString(b"cabinet".to_vec())),
            VarBind::new("1.3.6.1.2.1.1.1.0", Value::NoSuchObject),
        ]
    );

    let upstream_request = seen.recv().await.unwrap();
    assert_eq!(upstream_request.community, b"agent");
    assert_eq!(upstream_request.variables[0], VarBind::null(AGENT_VOLT));
    assert_eq!(upstream_request.variables[1], VarBind::null(AGENT_NAME));
    assert_eq!(upstream_request.variables[2], VarBind::null("1.3.6.1.2.1.1.1.0"));

    assert_eq!(stats.requests_forwarded.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_get_bulk_parameters_forwarded() {
    let (agent, mut seen) = stub_agent(0, Duration::ZERO).await;
    let running = start_proxy(agent, Duration::from_secs(2)).await;
    let proxy = running.addr;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let request = Codec::default()
        .encode(PduType::GetBulk, &[VarBind::null(STATION_NAME)], 0, 10, 9)
        .unwrap();
    let reply = exchange(&client, proxy, &request).await.expect("reply");
    assert_eq!(reply.request_id, 9);

    let upstream_request = seen.recv().await.unwrap();
    assert_eq!(upstream_request.pdu_type, PduType::GetBulk);
    assert_eq!(upstream_request.non_repeaters, 0);
    assert_eq!(upstream_request.max_repetitions, 10);
}

#[tokio::test]
async fn test_malformed_datagram_then_valid_one() {
    let (agent, _seen) = stub_agent(0, Duration::ZERO).await;
    let running = start_proxy(agent, Duration::from_secs(2)).await;
    let (proxy, stats) = (running.addr, running.stats.clone());
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    client.send_to(&[0x30, 0x82, 0xff], proxy).await.unwrap();
    client.send_to(b"definitely not BER", proxy).await.unwrap();

    let request = Codec::default()
        .encode(PduType::Get, &[VarBind::null(STATION_VOLT)], 0, 0, 5)
        .unwrap();
    let reply = exchange(&client, proxy, &request).await.expect("valid request answered");

    assert_eq!(reply.request_id, 5);
    assert_eq!(reply.variables[0].oid, STATION_VOLT);
    assert_eq!(stats.requests_dropped.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn test_unresponsive_upstream_times_out_and_proxy_keeps_serving() {
    let (agent, _seen) = stub_agent(1, Duration::ZERO).await;
    let running = start_proxy(agent, Duration::from_millis(200)).await;
    let (proxy, stats) = (running.addr, running.stats.clone());
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let first = Codec::default()
        .encode(PduType::Get, &[VarBind::null(STATION_VOLT)], 0, 0, 1)
        .unwrap();
    client.send_to(&first, proxy).await.unwrap();

    let mut buf = vec![0u8; 4096];
    let silent = tokio::time::timeout(Duration::from_millis(600), client.recv_from(&mut buf)).await;
    assert!(silent.is_err(), "timed-out request must not be answered");
    assert_eq!(stats.forward_timeouts.load(Ordering::Relaxed), 1);

    let second = Codec::default()
        .encode(PduType::Get, &[VarBind::null(STATION_VOLT)], 0, 0, 2)
        .unwrap();
    let reply = exchange(&client, proxy, &second).await.expect("second request answered");
    assert_eq!(reply.request_id, 2);
}

#[tokio::test]
async fn test_shutdown_stops_listener() {
    let (agent, _seen) = stub_agent(0, Duration::ZERO).await;
    let stats = Arc::new(GatewayStats::new());
    let proxy = RequestProxy::bind(
        ProxySettings {
            listen: "127.0.0.1:0".parse().unwrap(),
            upstream: agent,
            community: "public".into(),
            forward_timeout: Duration::from_secs(1),
            max_in_flight: 4,
            max_datagram_size: 4096,
        },
        table(),
        stats,
    )
    .await
    .unwrap();

    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn(proxy.run(rx));
    tx.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("proxy stops")
        .unwrap();
}

#[tokio::test]
async fn test_stalled_request_does_not_delay_other_clients() {
    // The agent never answers the first request.
    let (agent, mut seen) = stub_agent(1, Duration::ZERO).await;
    let proxy = start_proxy(agent, Duration::from_secs(3)).await;

    let stalled = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    stalled.send_to(&get(STATION_VOLT, 1), proxy.addr).await.unwrap();
    seen.recv().await.expect("first request reached the agent");

    let other = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    other.send_to(&get(STATION_VOLT, 2), proxy.addr).await.unwrap();

    let mut buf = vec![0u8; 4096];
    let (len, _) = tokio::time::timeout(Duration::from_secs(1), other.recv_from(&mut buf))
        .await
        .expect("second client answered while the first is still pending")
        .unwrap();
    let reply = Codec::default().decode(&buf[..len]).unwrap();
    assert_eq!(reply.request_id, 2);
    assert_eq!(proxy.stats.forward_timeouts.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_reply() {
    let (agent, mut seen) = stub_agent(0, Duration::from_millis(300)).await;
    let proxy = start_proxy(agent, Duration::from_secs(2)).await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    client.send_to(&get(STATION_VOLT, 11), proxy.addr).await.unwrap();
    seen.recv().await.expect("request reached the agent");
    proxy.shutdown.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(3), proxy.task)
        .await
        .expect("proxy stops")
        .unwrap();
    // The reply was sent before run() returned.
    assert_eq!(proxy.stats.requests_forwarded.load(Ordering::Relaxed), 1);

    let mut buf = vec![0u8; 4096];
    let (len, _) = tokio::time::timeout(Duration::from_secs(1), client.recv_from(&mut buf))
        .await
        .expect("in-flight request answered during shutdown")
        .unwrap();
    assert_eq!(Codec::default().decode(&buf[..len]).unwrap().request_id, 11);
}

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_timeout() {
    let (agent, mut seen) = stub_agent(1, Duration::ZERO).await;
    let proxy = start_proxy(agent, Duration::from_millis(400)).await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    client.send_to(&get(STATION_VOLT, 12), proxy.addr).await.unwrap();
    seen.recv().await.expect("request reached the agent");
    proxy.shutdown.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(3), proxy.task)
        .await
        .expect("proxy stops")
        .unwrap();
    assert_eq!(proxy.stats.forward_timeouts.load(Ordering::Relaxed), 1);
    assert_eq!(proxy.stats.requests_dropped.load(Ordering::Relaxed), 1);
}
