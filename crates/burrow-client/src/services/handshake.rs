// ============================================
// File: crates/burrow-client/src/services/handshake.rs
// ============================================
//! # Handshake Service
//!
//! ## Creation Reason
//! Establishes the session with the peer and, only once the peer has
//! granted an address, builds the local side of the tunnel.
//!
//! ## Handshake Flow
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    HandshakeService                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  1. seal(Request) ──► peer                                   │
//! │     │                                                        │
//! │     ▼                                                        │
//! │  2. one datagram ◄── peer          (bounded by timeout)      │
//! │     │                                                        │
//! │     ▼                                                        │
//! │  3. open ─► decode ─► Accept? ─► 4-byte address?             │
//! │     │                                                        │
//! │     ▼                                                        │
//! │  4. create TUN with the address, bring it up                 │
//! │     │                                                        │
//! │     ▼                                                        │
//! │  5. install routes (default via address.gateway())           │
//! │     │                                                        │
//! │     ▼                                                        │
//! │  6. return Tunnel                                            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Handling
//! - Every failure is fatal; there is no retry
//! - Steps 1-3 leave no local state behind
//! - A failure in 4 or 5 takes the new device down before returning
//!
//! ## ⚠️ Important Note for Next Developer
//! - Nothing in the reply is looked at before `open` succeeds
//! - The peer must be IPv4, routing cannot handle anything else
//!
//! ## Last Modified
//! v0.1.0 - Initial handshake service

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use burrow_common::types::TunnelAddress;
use burrow_core::{decode, encode, parse_accept, FrameCipher, FrameKind, MAX_DATAGRAM_SIZE};
use burrow_transport::traits::{Transport, TunConfig, TunDevice, TunProvider};

use crate::error::{ClientError, Result};
use crate::services::routing::{RoutingOrchestrator, RoutingSnapshot};

// ============================================
// Tunnel
// ============================================

/// The local half of an established tunnel.
///
/// Only a successful handshake produces one.
pub struct Tunnel {
    /// The TUN device, up and bound to `address`.
    pub device: Arc<dyn TunDevice>,
    /// Address granted by the peer.
    pub address: TunnelAddress,
    /// Routing changes to undo at teardown.
    pub routing: RoutingSnapshot,
}

impl std::fmt::Debug for Tunnel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tunnel")
            .field("device", &self.device.name())
            .field("address", &self.address)
            .field("routing", &self.routing)
            .finish()
    }
}

// ============================================
// HandshakeService
// ============================================

/// Client-side handshake.
pub struct HandshakeService {
    transport: Arc<dyn Transport>,
    cipher: Arc<FrameCipher>,
    tun_provider: Arc<dyn TunProvider>,
    routing: Arc<RoutingOrchestrator>,
    device_template: TunConfig,
    timeout: Duration,
}

impl HandshakeService {
    /// Creates the service.
    ///
    /// `device_template` supplies name and MTU; its address is replaced
    /// by the one the peer grants.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        cipher: Arc<FrameCipher>,
        tun_provider: Arc<dyn TunProvider>,
        routing: Arc<RoutingOrchestrator>,
        device_template: TunConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            cipher,
            tun_provider,
            routing,
            device_template,
            timeout,
        }
    }

    /// Runs the handshake to completion.
    ///
    /// # Errors
    /// - `HandshakeTimeout` / transport errors while talking to the peer
    /// - `Core(Decryption)` if the reply does not authenticate
    /// - `Core(..)` format or protocol errors for a bad reply
    /// - `Transport(..)` device or routing errors while setting up
    pub async fn perform(&self) -> Result<Tunnel> {
        let peer = peer_ipv4(self.transport.as_ref())?;

        let address = self.exchange().await?;
        info!(address = %address, peer = %peer, "Peer accepted session");

        let config = self.device_template.clone().with_address(address.inner());
        let device = self.tun_provider.create(config).await?;

        if let Err(e) = device.up().await {
            release(device.as_ref()).await;
            return Err(e.into());
        }

        let routing = match self.routing.install(peer, address.gateway()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                release(device.as_ref()).await;
                return Err(e);
            }
        };

        Ok(Tunnel {
            device,
            address,
            routing,
        })
    }

    /// Sends the Request and validates the reply.
    async fn exchange(&self) -> Result<TunnelAddress> {
        let request = self.cipher.seal(&encode(FrameKind::Request, &[]))?;
        self.transport.send(&request).await?;
        debug!("Request sent to {}", self.transport.peer_addr());

        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let len = tokio::time::timeout(self.timeout, self.transport.recv(&mut buf))
            .await
            .map_err(|_| ClientError::HandshakeTimeout {
                secs: self.timeout.as_secs(),
            })??;
        debug!("Received {} byte reply", len);

        let plaintext = self.cipher.open(&buf[..len])?;
        let frame = decode(&plaintext)?;
        Ok(parse_accept(&frame)?)
    }
}

impl std::fmt::Debug for HandshakeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeService")
            .field("peer", &self.transport.peer_addr())
            .field("device", &self.device_template.name)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn peer_ipv4(transport: &dyn Transport) -> Result<Ipv4Addr> {
    match transport.peer_addr().ip() {
        IpAddr::V4(ip) => Ok(ip),
        IpAddr::V6(ip) => Err(ClientError::config_invalid(
            "peer.host",
            format!("{ip} is not IPv4"),
        )),
    }
}

async fn release(device: &dyn TunDevice) {
    if let Err(e) = device.down().await {
        warn!("Failed to bring down {}: {}", device.name(), e);
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_core::PresharedKey;
    use burrow_transport::route::mock::{MockRouteTable, RouteOp, RouteOpKind};
    use burrow_transport::route::RouteTable;
    use burrow_transport::tun::mock::MockTunProvider;
    use burrow_transport::UdpTransport;
    use std::net::SocketAddr;
    use tokio::net::UdpSocket;

    const LAN_GW: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);

    struct Fixture {
        peer: UdpSocket,
        cipher: Arc<FrameCipher>,
        provider: Arc<MockTunProvider>,
        table: Arc<MockRouteTable>,
        service: HandshakeService,
    }

    async fn fixture(timeout: Duration) -> Fixture {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let transport = UdpTransport::connect(peer.local_addr().unwrap()).await.unwrap();

        let cipher = Arc::new(FrameCipher::new(&PresharedKey::from_bytes([7; 32])));
        let provider = Arc::new(MockTunProvider::new());
        let table = Arc::new(MockRouteTable::with_default(LAN_GW));
        let routing = Arc::new(RoutingOrchestrator::new(
            Arc::clone(&table) as Arc<dyn RouteTable>
        ));

        let service = HandshakeService::new(
            Arc::new(transport),
            Arc::clone(&cipher),
            Arc::clone(&provider) as Arc<dyn TunProvider>,
            routing,
            TunConfig::new("tun7"),
            timeout,
        );

        Fixture {
            peer,
            cipher,
            provider,
            table,
            service,
        }
    }

    /// Answers the next Request with `reply`, already sealed.
    async fn answer(peer: &UdpSocket, cipher: &FrameCipher, reply: Vec<u8>) -> SocketAddr {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let (len, from) = peer.recv_from(&mut buf).await.unwrap();

        let request = decode(&cipher.open(&buf[..len]).unwrap()).unwrap();
        assert_eq!(request.kind, FrameKind::Request);
        assert!(request.payload.is_empty());

        peer.send_to(&reply, from).await.unwrap();
        from
    }

    #[tokio::test]
    async fn test_accept_builds_tunnel() {
        let f = fixture(Duration::from_secs(5)).await;
        let reply = f.cipher.seal(&encode(FrameKind::Accept, &[10, 8, 0, 7])).unwrap();

        let (tunnel, _) = tokio::join!(f.service.perform(), answer(&f.peer, &f.cipher, reply.to_vec()));
        let tunnel = tunnel.unwrap();

        assert_eq!(tunnel.address.inner(), Ipv4Addr::new(10, 8, 0, 7));
        assert_eq!(tunnel.routing.tunnel_gateway, Ipv4Addr::new(10, 8, 0, 1));
        assert_eq!(tunnel.routing.peer, Ipv4Addr::LOCALHOST);

        let device = f.provider.last_device().unwrap();
        assert_eq!(device.ip_addr(), Ipv4Addr::new(10, 8, 0, 7));
        assert_eq!(device.name(), "tun7");
        assert!(device.is_up());

        assert_eq!(f.table.default_route(), Some(Ipv4Addr::new(10, 8, 0, 1)));
        assert_eq!(f.table.host_routes(), vec![(Ipv4Addr::LOCALHOST, LAN_GW)]);
    }

    async fn rejected(reply: impl FnOnce(&FrameCipher) -> Vec<u8>) -> (ClientError, Fixture) {
        let f = fixture(Duration::from_secs(5)).await;
        let reply = reply(&f.cipher);

        let (result, _) = tokio::join!(f.service.perform(), answer(&f.peer, &f.cipher, reply));
        let err = result.unwrap_err();

        assert!(f.provider.devices().is_empty(), "no device on rejection");
        assert!(f.table.ops().is_empty(), "no routing change on rejection");
        (err, f)
    }

    #[tokio::test]
    async fn test_rejects_wrong_marker() {
        let (err, _f) = rejected(|cipher| {
            cipher.seal(&[0xDE, 0xAD, 0xBE, 0xEF, 0x01, 10, 8, 0, 7]).unwrap().to_vec()
        })
        .await;
        assert!(matches!(err, ClientError::Core(ref e) if e.is_format_error()));
    }

    #[tokio::test]
    async fn test_rejects_wrong_kind() {
        let (err, _f) = rejected(|cipher| {
            cipher.seal(&encode(FrameKind::Data, &[10, 8, 0, 7])).unwrap().to_vec()
        })
        .await;
        assert!(err.is_protocol_error());
    }

    #[tokio::test]
    async fn test_rejects_bad_assignment_length() {
        for payload in [&[10, 8, 0][..], &[10, 8, 0, 7, 0][..], &[][..]] {
            let (err, _f) = rejected(|cipher| {
                cipher.seal(&encode(FrameKind::Accept, payload)).unwrap().to_vec()
            })
            .await;
            assert!(err.is_protocol_error());
        }
    }

    #[tokio::test]
    async fn test_rejects_wrong_key() {
        let (err, _f) = rejected(|_| {
            let other = FrameCipher::new(&PresharedKey::from_bytes([8; 32]));
            other.seal(&encode(FrameKind::Accept, &[10, 8, 0, 7])).unwrap().to_vec()
        })
        .await;
        assert!(err.is_crypto_error());
    }

    #[tokio::test]
    async fn test_rejects_plaintext_reply() {
        // A correctly framed but unsealed Accept must not authenticate
        let (err, _f) = rejected(|_| encode(FrameKind::Accept, &[10, 8, 0, 7]).to_vec()).await;
        assert!(err.is_crypto_error());
    }

    #[tokio::test]
    async fn test_timeout() {
        let f = fixture(Duration::from_millis(100)).await;

        let err = f.service.perform().await.unwrap_err();
        assert!(matches!(err, ClientError::HandshakeTimeout { .. }));
        assert!(err.is_network_error());
        assert!(f.provider.devices().is_empty());
    }

    #[tokio::test]
    async fn test_routing_failure_releases_device() {
        let f = fixture(Duration::from_secs(5)).await;
        f.table.fail_on(RouteOpKind::SetDefault);
        let reply = f.cipher.seal(&encode(FrameKind::Accept, &[10, 8, 0, 7])).unwrap();

        let (result, _) = tokio::join!(f.service.perform(), answer(&f.peer, &f.cipher, reply.to_vec()));
        assert!(result.unwrap_err().is_config_error());

        let device = f.provider.last_device().unwrap();
        assert_eq!(device.down_calls(), 1);
        assert!(!device.is_up());
        assert_eq!(f.table.ops().last(), Some(&RouteOp::ClearHost(Ipv4Addr::LOCALHOST)));
    }

    #[tokio::test]
    async fn test_device_failure_leaves_routes_alone() {
        let f = fixture(Duration::from_secs(5)).await;
        f.provider.fail_next_create("no /dev/net/tun");
        let reply = f.cipher.seal(&encode(FrameKind::Accept, &[10, 8, 0, 7])).unwrap();

        let (result, _) = tokio::join!(f.service.perform(), answer(&f.peer, &f.cipher, reply.to_vec()));
        assert!(result.unwrap_err().is_device_error());
        assert!(f.table.ops().is_empty());
    }
}
