// ============================================
// File: crates/burrow-client/src/services/relay.rs
// ============================================
//! # Duplex Relay
//!
//! ## Creation Reason
//! Moves packets between the TUN device and the peer once the tunnel is
//! established, one task per direction.
//!
//! ## Data Flow
//! ```text
//!  uplink:    TUN.read ─► encode(Data) ─► seal ─► UDP.send
//!  downlink:  UDP.recv ─► open ─► decode ─► kind == Data? ─► TUN.write
//! ```
//!
//! ## Termination
//! A loop ends on its first error and returns it. A loop stopped through
//! the shutdown channel returns `None`: the coordinator is already
//! tearing down and does not need another report.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Downlink opens the datagram before looking at a single byte of it;
//!   length and structure checks only ever apply to authenticated
//!   plaintext
//! - Cancellation is only observed while a loop waits for input
//!
//! ## Last Modified
//! v0.1.0 - Initial relay loops

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, trace};

use burrow_core::{decode, encode, FrameCipher, FrameKind, MAX_DATAGRAM_SIZE};
use burrow_transport::traits::{Transport, TunDevice};

use crate::error::{ClientError, Result};

// ============================================
// RelayStats
// ============================================

/// Per-direction packet and byte counters.
///
/// Byte counts are IP packet sizes, before framing and encryption.
#[derive(Debug, Default)]
pub struct RelayStats {
    uplink_packets: AtomicU64,
    uplink_bytes: AtomicU64,
    downlink_packets: AtomicU64,
    downlink_bytes: AtomicU64,
}

/// Point-in-time copy of [`RelayStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayTotals {
    /// Packets sent to the peer.
    pub uplink_packets: u64,
    /// Bytes sent to the peer.
    pub uplink_bytes: u64,
    /// Packets written to the TUN device.
    pub downlink_packets: u64,
    /// Bytes written to the TUN device.
    pub downlink_bytes: u64,
}

impl RelayStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record_uplink(&self, bytes: usize) {
        self.uplink_packets.fetch_add(1, Ordering::Relaxed);
        self.uplink_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    fn record_downlink(&self, bytes: usize) {
        self.downlink_packets.fetch_add(1, Ordering::Relaxed);
        self.downlink_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Reads all counters.
    #[must_use]
    pub fn snapshot(&self) -> RelayTotals {
        RelayTotals {
            uplink_packets: self.uplink_packets.load(Ordering::Relaxed),
            uplink_bytes: self.uplink_bytes.load(Ordering::Relaxed),
            downlink_packets: self.downlink_packets.load(Ordering::Relaxed),
            downlink_bytes: self.downlink_bytes.load(Ordering::Relaxed),
        }
    }
}

// ============================================
// Relay
// ============================================

/// Handles shared by both relay directions.
///
/// Each loop consumes its own clone, so its handles are dropped as soon
/// as the loop returns.
#[derive(Clone)]
pub struct Relay {
    device: Arc<dyn TunDevice>,
    transport: Arc<dyn Transport>,
    cipher: Arc<FrameCipher>,
    stats: Arc<RelayStats>,
}

impl Relay {
    /// Creates a relay over an established tunnel.
    #[must_use]
    pub fn new(
        device: Arc<dyn TunDevice>,
        transport: Arc<dyn Transport>,
        cipher: Arc<FrameCipher>,
        stats: Arc<RelayStats>,
    ) -> Self {
        Self {
            device,
            transport,
            cipher,
            stats,
        }
    }

    /// TUN → peer. Runs until an error or cancellation.
    pub async fn uplink(self, mut shutdown: broadcast::Receiver<()>) -> Option<ClientError> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            let len = tokio::select! {
                _ = shutdown.recv() => {
                    debug!("Uplink received shutdown signal");
                    return None;
                }
                result = self.device.read(&mut buf) => match result {
                    Ok(len) => len,
                    Err(e) => return Some(e.into()),
                },
            };

            if let Err(e) = self.send_packet(&buf[..len]).await {
                return Some(e);
            }
        }
    }

    /// Peer → TUN. Runs until an error or cancellation.
    pub async fn downlink(self, mut shutdown: broadcast::Receiver<()>) -> Option<ClientError> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            let len = tokio::select! {
                _ = shutdown.recv() => {
                    debug!("Downlink received shutdown signal");
                    return None;
                }
                result = self.transport.recv(&mut buf) => match result {
                    Ok(len) => len,
                    Err(e) => return Some(e.into()),
                },
            };

            if let Err(e) = self.deliver_datagram(&buf[..len]).await {
                return Some(e);
            }
        }
    }

    async fn send_packet(&self, packet: &[u8]) -> Result<()> {
        let datagram = self.cipher.seal(&encode(FrameKind::Data, packet))?;
        self.transport.send(&datagram).await?;

        self.stats.record_uplink(packet.len());
        trace!(len = packet.len(), "Uplink packet");
        Ok(())
    }

    async fn deliver_datagram(&self, datagram: &[u8]) -> Result<()> {
        let plaintext = self.cipher.open(datagram)?;
        let frame = decode(&plaintext)?;
        frame.expect_kind(FrameKind::Data)?;

        self.device.write(&frame.payload).await?;

        self.stats.record_downlink(frame.payload.len());
        trace!(len = frame.payload.len(), "Downlink packet");
        Ok(())
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("device", &self.device.name())
            .field("peer", &self.transport.peer_addr())
            .finish()
    }
}

// ============================================
// Tests
// ============================================
