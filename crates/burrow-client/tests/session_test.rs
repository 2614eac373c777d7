// ============================================
// File: crates/burrow-client/tests/session_test.rs
// ============================================
//! End-to-end session tests against a simulated peer on loopback, with
//! the mock TUN device and mock routing table standing in for the host.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;

use burrow_client::services::RestoreStep;
use burrow_client::{Client, SessionOptions, TerminateRequest, TerminationCause, TriggerSignal};
use burrow_core::{decode, encode, Frame, FrameCipher, FrameKind, PresharedKey, MAX_DATAGRAM_SIZE};
use burrow_transport::route::RouteTable;
use burrow_transport::traits::{Transport, TunConfig, TunDevice, TunProvider};
use burrow_transport::{MockRouteTable, MockTun, MockTunProvider, RouteOp, RouteOpKind, UdpTransport};

const LAN_GW: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);
const ASSIGNED: [u8; 4] = [10, 8, 0, 7];
const TUNNEL_GW: Ipv4Addr = Ipv4Addr::new(10, 8, 0, 1);
const PEER_IP: Ipv4Addr = Ipv4Addr::LOCALHOST;
const WAIT: Duration = Duration::from_secs(5);

// ============================================
// Harness
// ============================================

struct Peer {
    socket: UdpSocket,
    cipher: FrameCipher,
}

impl Peer {
    /// Waits for the Request and answers with `reply` (unsealed frame).
    async fn answer(&self, reply: &[u8]) -> SocketAddr {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let (len, client) = self.socket.recv_from(&mut buf).await.unwrap();

        let request = decode(&self.cipher.open(&buf[..len]).unwrap()).unwrap();
        assert_eq!(request.kind, FrameKind::Request);

        let sealed = self.cipher.seal(reply).unwrap();
        self.socket.send_to(&sealed, client).await.unwrap();
        client
    }

    async fn accept(&self) -> SocketAddr {
        self.answer(&encode(FrameKind::Accept, &ASSIGNED)).await
    }

    async fn recv_frame(&self) -> Frame {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let len = tokio::time::timeout(WAIT, self.socket.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();
        decode(&self.cipher.open(&buf[..len]).unwrap()).unwrap()
    }

    async fn send_frame(&self, kind: FrameKind, payload: &[u8], to: SocketAddr) {
        let sealed = self.cipher.seal(&encode(kind, payload)).unwrap();
        self.socket.send_to(&sealed, to).await.unwrap();
    }
}

struct Harness {
    peer: Peer,
    provider: Arc<MockTunProvider>,
    table: Arc<MockRouteTable>,
}

impl Harness {
    async fn new() -> (Self, Client) {
        let key = PresharedKey::from_bytes([42; 32]);

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let transport = UdpTransport::connect_from(
            "127.0.0.1:0".parse().unwrap(),
            socket.local_addr().unwrap(),
        )
        .await
        .unwrap();

        // Downing the device drops the tunnel default, as the kernel does
        let table = Arc::new(MockRouteTable::with_default(LAN_GW));
        let provider = Arc::new(MockTunProvider::with_routes(Arc::clone(&table)));

        let client = Client::new(
            Arc::new(transport) as Arc<dyn Transport>,
            &key,
            Arc::clone(&provider) as Arc<dyn TunProvider>,
            Arc::clone(&table) as Arc<dyn RouteTable>,
            SessionOptions {
                device: TunConfig::new("burrow-test"),
                handshake_timeout: WAIT,
            },
        );

        let harness = Self {
            peer: Peer {
                socket,
                cipher: FrameCipher::new(&key),
            },
            provider,
            table,
        };
        (harness, client)
    }

    /// Waits until the TUN exists and the default route points into it.
    async fn established(&self) -> Arc<MockTun> {
        tokio::time::timeout(WAIT, async {
            loop {
                if let Some(device) = self.provider.last_device() {
                    if self.table.default_route() == Some(TUNNEL_GW) {
                        return device;
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap()
    }
}

fn ip_packet(tag: u8) -> Vec<u8> {
    let mut packet = vec![0x45, 0x00, 0x00, 0x1c];
    packet.resize(28, tag);
    packet
}

fn expected_ops() -> Vec<RouteOp> {
    vec![
        // install
        RouteOp::ReadDefault,
        RouteOp::SetHost {
            gateway: LAN_GW,
            host: PEER_IP,
        },
        RouteOp::ClearDefault,
        RouteOp::SetDefault(TUNNEL_GW),
        // restore
        RouteOp::ClearDefault,
        RouteOp::SetDefault(LAN_GW),
        RouteOp::ClearHost(PEER_IP),
    ]
}

// ============================================
// Tests
// ============================================

#[tokio::test]
async fn test_session_relays_and_ends_on_signal() {
    let (h, client) = Harness::new().await;
    let (signal, trigger) = TriggerSignal::new();
    let session = tokio::spawn(client.run(signal));

    let client_addr = h.peer.accept().await;
    let device = h.established().await;

    assert_eq!(device.ip_addr(), Ipv4Addr::from(ASSIGNED));
    assert_eq!(device.name(), "burrow-test");
    assert!(device.is_up());

    // TUN → peer
    device.inject_packet(ip_packet(1));
    let frame = h.peer.recv_frame().await;
    assert_eq!(frame.kind, FrameKind::Data);
    assert_eq!(frame.payload.as_ref(), ip_packet(1).as_slice());

    // peer → TUN
    h.peer.send_frame(FrameKind::Data, &ip_packet(2), client_addr).await;
    let written = tokio::time::timeout(WAIT, device.next_written()).await.unwrap();
    assert_eq!(written, ip_packet(2));

    trigger.fire(TerminateRequest::Terminate);
    let report = tokio::time::timeout(WAIT, session).await.unwrap().unwrap().unwrap();

    assert!(matches!(report.cause, TerminationCause::Signal(TerminateRequest::Terminate)));
    assert!(report.is_clean());
    assert_eq!(report.address.inner(), Ipv4Addr::from(ASSIGNED));
    assert_eq!(report.stats.uplink_packets, 1);
    assert_eq!(report.stats.uplink_bytes, 28);
    assert_eq!(report.stats.downlink_packets, 1);
    assert_eq!(report.stats.downlink_bytes, 28);

    assert_eq!(h.table.ops(), expected_ops());
    assert_eq!(h.table.default_route(), Some(LAN_GW));
    assert!(h.table.host_routes().is_empty());
    assert_eq!(device.down_calls(), 1);
    assert!(!device.is_up());
}

#[tokio::test]
async fn test_restore_clean_after_link_drops_tunnel_default() {
    let (h, client) = Harness::new().await;
    let (signal, trigger) = TriggerSignal::new();
    let session = tokio::spawn(client.run(signal));

    h.peer.accept().await;
    let device = h.established().await;

    trigger.fire(TerminateRequest::Interrupt);
    let report = tokio::time::timeout(WAIT, session).await.unwrap().unwrap().unwrap();

    // down() ran first, so the tunnel default was already gone at restore
    assert_eq!(device.down_calls(), 1);
    assert!(report.restore.is_clean());
    assert!(report.is_clean());
    assert!(report.restore.failures().is_empty());

    assert_eq!(h.table.ops(), expected_ops());
    assert_eq!(h.table.default_route(), Some(LAN_GW));
    assert!(h.table.host_routes().is_empty());
}

#[tokio::test]
async fn test_uplink_failure_tears_down_once() {
    let (h, client) = Harness::new().await;
    let (signal, _trigger) = TriggerSignal::new();
    let session = tokio::spawn(client.run(signal));

    h.peer.accept().await;
    let device = h.established().await;

    device.fail_next_read("device removed");
    let report = tokio::time::timeout(WAIT, session).await.unwrap().unwrap().unwrap();

    match &report.cause {
        TerminationCause::Uplink(e) => assert!(e.is_device_error()),
        other => panic!("unexpected cause: {other}"),
    }
    assert!(!report.is_clean());
    assert!(report.restore.is_clean());

    // Restore ran exactly once, in reverse order
    assert_eq!(h.table.ops(), expected_ops());
    assert_eq!(device.down_calls(), 1);
}

#[tokio::test]
async fn test_non_data_frame_ends_downlink() {
    let (h, client) = Harness::new().await;
    let (signal, _trigger) = TriggerSignal::new();
    let session = tokio::spawn(client.run(signal));

    let client_addr = h.peer.accept().await;
    let device = h.established().await;

    h.peer.send_frame(FrameKind::Accept, &ASSIGNED, client_addr).await;
    let report = tokio::time::timeout(WAIT, session).await.unwrap().unwrap().unwrap();

    match &report.cause {
        TerminationCause::Downlink(e) => assert!(e.is_protocol_error()),
        other => panic!("unexpected cause: {other}"),
    }
    assert_eq!(device.written_count(), 0);
    assert_eq!(h.table.ops(), expected_ops());
}

#[tokio::test]
async fn test_forged_datagram_ends_downlink() {
    let (h, client) = Harness::new().await;
    let (signal, _trigger) = TriggerSignal::new();
    let session = tokio::spawn(client.run(signal));

    let client_addr = h.peer.accept().await;
    let device = h.established().await;

    // Well-formed plaintext frame, but not sealed with the session key
    h.peer
        .socket
        .send_to(&encode(FrameKind::Data, &ip_packet(3)), client_addr)
        .await
        .unwrap();
    let report = tokio::time::timeout(WAIT, session).await.unwrap().unwrap().unwrap();

    match &report.cause {
        TerminationCause::Downlink(e) => assert!(e.is_crypto_error()),
        other => panic!("unexpected cause: {other}"),
    }
    assert_eq!(device.written_count(), 0);
}

#[tokio::test]
async fn test_restore_failures_are_reported() {
    let (h, client) = Harness::new().await;
    let (signal, trigger) = TriggerSignal::new();
    let session = tokio::spawn(client.run(signal));

    h.peer.accept().await;
    h.established().await;

    h.table.fail_on(RouteOpKind::ClearHost);
    trigger.fire(TerminateRequest::Interrupt);
    let report = tokio::time::timeout(WAIT, session).await.unwrap().unwrap().unwrap();

    assert!(report.cause.is_signal());
    assert!(!report.is_clean());
    let failed: Vec<_> = report.restore.failures().iter().map(|f| f.step).collect();
    assert_eq!(failed, vec![RestoreStep::ClearHostRoute]);

    // Earlier steps still ran and succeeded
    assert_eq!(h.table.default_route(), Some(LAN_GW));
    assert_eq!(h.table.ops(), expected_ops());
}

#[tokio::test]
async fn test_rejected_handshake_touches_nothing() {
    let (h, client) = Harness::new().await;
    let (signal, _trigger) = TriggerSignal::new();
    let session = tokio::spawn(client.run(signal));

    // Accept with a 3-byte address
    h.peer.answer(&encode(FrameKind::Accept, &[10, 8, 0])).await;

    let err = tokio::time::timeout(WAIT, session).await.unwrap().unwrap().unwrap_err();
    assert!(err.is_protocol_error());
    assert!(h.provider.devices().is_empty());
    assert!(h.table.ops().is_empty());
}

#[tokio::test]
async fn test_handshake_timeout() {
    let (h, _) = Harness::new().await;

    // Fresh client with a short timeout against the same silent peer
    let transport = UdpTransport::connect(h.peer.socket.local_addr().unwrap()).await.unwrap();
    let client = Client::new(
        Arc::new(transport),
        &PresharedKey::from_bytes([42; 32]),
        Arc::clone(&h.provider) as Arc<dyn TunProvider>,
        Arc::clone(&h.table) as Arc<dyn RouteTable>,
        SessionOptions {
            device: TunConfig::new("burrow-test"),
            handshake_timeout: Duration::from_millis(100),
        },
    );

    let (signal, _trigger) = TriggerSignal::new();
    let err = client.run(signal).await.unwrap_err();
    assert!(err.is_network_error());
    assert!(h.provider.devices().is_empty());
    assert!(h.table.ops().is_empty());
}
