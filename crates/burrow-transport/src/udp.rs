// ============================================
// File: crates/burrow-transport/src/udp.rs
// ============================================
//! # Peer Socket
//!
//! ## Creation Reason
//! The client has exactly one peer, so its UDP socket is connected once;
//! the kernel then filters out datagrams from anyone else.
//!
//! ## Main Functionality
//! - `UdpTransport::connect`: ephemeral port, connected to the peer
//! - `UdpTransport::connect_from`: same, from a chosen local address
//! - `shutdown`: closes the transport and wakes a parked `recv`
//!
//! ## ⚠️ Important Note for Next Developer
//! - Buffer sizes are a request; the kernel may clamp them to
//!   `net.core.rmem_max` / `wmem_max`
//! - The fd is released when the last `Arc` drops, not on `shutdown`
//!
//! ## Last Modified
//! v0.1.0 - Initial UDP transport implementation

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Requested kernel buffer size per direction.
const SOCKET_BUFFER_SIZE: usize = 1024 * 1024;

/// UDP socket connected to the tunnel peer.
///
/// ```ignore
/// let transport = UdpTransport::connect("203.0.113.5:9000".parse()?).await?;
/// transport.send(&sealed).await?;
/// let len = transport.recv(&mut buf).await?;
/// ```
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
    /// `true` once shut down
    closed: watch::Sender<bool>,
}

impl UdpTransport {
    /// Connects from an ephemeral port of the peer's address family.
    ///
    /// # Errors
    /// See [`UdpTransport::connect_from`].
    pub async fn connect(peer: SocketAddr) -> Result<Self> {
        let local = match peer {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        };
        Self::connect_from(local, peer).await
    }

    /// Binds `local` and connects to `peer`.
    ///
    /// # Errors
    /// `AddressInUse` or `BindFailed` for the bind, `ConnectFailed` if the
    /// kernel rejects the peer.
    pub async fn connect_from(local: SocketAddr, peer: SocketAddr) -> Result<Self> {
        let socket = Socket::new(Domain::for_address(local), Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| TransportError::io("socket(AF_INET, SOCK_DGRAM)", e))?;

        if let Err(e) = socket.set_recv_buffer_size(SOCKET_BUFFER_SIZE) {
            warn!("SO_RCVBUF not applied: {}", e);
        }
        if let Err(e) = socket.set_send_buffer_size(SOCKET_BUFFER_SIZE) {
            warn!("SO_SNDBUF not applied: {}", e);
        }
        socket
            .set_nonblocking(true)
            .map_err(|e| TransportError::io("O_NONBLOCK on UDP socket", e))?;

        socket.bind(&local.into()).map_err(|e| match e.kind() {
            std::io::ErrorKind::AddrInUse => TransportError::AddressInUse { addr: local },
            _ => TransportError::bind_failed(local, e.to_string()),
        })?;
        socket.connect(&peer.into()).map_err(|e| TransportError::ConnectFailed {
            addr: peer,
            reason: e.to_string(),
        })?;

        let socket = UdpSocket::from_std(socket.into())
            .map_err(|e| TransportError::io("registering UDP socket", e))?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| TransportError::io("getsockname", e))?;

        info!(local = %local_addr, peer = %peer, "UDP socket connected");

        let (closed, _) = watch::channel(false);
        Ok(Self {
            socket,
            local_addr,
            peer_addr: peer,
            closed,
        })
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        let mut closed = self.closed.subscribe();
        let already_closed = *closed.borrow_and_update();
        if already_closed {
            return Err(TransportError::ShuttingDown);
        }
        let shut_down = async move {
            let _ = closed.wait_for(|&c| c).await;
        };

        tokio::select! {
            () = shut_down => Err(TransportError::ShuttingDown),
            received = self.socket.recv(buf) => {
                let len = received.map_err(|e| TransportError::ReceiveFailed {
                    reason: e.to_string(),
                })?;
                trace!(len, "datagram in");
                Ok(len)
            }
        }
    }

    async fn send(&self, buf: &[u8]) -> Result<usize> {
        if self.is_closed() {
            return Err(TransportError::ShuttingDown);
        }

        let len = self.socket.send(buf).await.map_err(|e| TransportError::SendFailed {
            dest: self.peer_addr,
            reason: e.to_string(),
        })?;
        trace!(len, "datagram out");
        Ok(len)
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.local_addr)
    }

    async fn shutdown(&self) -> Result<()> {
        if !self.closed.send_replace(true) {
            debug!(peer = %self.peer_addr, "UDP transport shut down");
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        !self.is_closed()
    }
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("local", &self.local_addr)
            .field("peer", &self.peer_addr)
            .field("active", &self.is_active())
            .finish()
    }
}
