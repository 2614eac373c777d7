// ============================================
// File: crates/burrow-transport/src/tun/mock.rs
// ============================================
//! # In-Memory TUN Device
//!
//! ## Creation Reason
//! Stands in for `/dev/net/tun` so the handshake, relay and coordinator
//! run in tests without root.
//!
//! ## Main Functionality
//! - `MockTun`: packets the test injects come out of `read`; packets the
//!   relay writes are captured for `next_written`
//! - One-shot read/write failures to drive the failure paths
//! - `MockTunProvider`: hands out devices and keeps them for inspection
//! - Optionally tied to a `MockRouteTable`: taking a device down drops the
//!   routes that went through it
//!
//! ```ignore
//! let tun = MockTun::new(TunConfig::new("mock0"));
//! tun.inject_packet(packet.clone());
//! let len = tun.read(&mut buf).await?;
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `read` parks until a packet or a failure is injected, like a real
//!   device with no traffic
//!
//! ## Last Modified
//! v0.1.0 - Initial mock implementation

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{Result, TransportError};
use crate::route::mock::MockRouteTable;
use crate::traits::{TunConfig, TunDevice, TunProvider};

#[derive(Debug, Default)]
struct DeviceState {
    inbound: VecDeque<Vec<u8>>,
    outbound: VecDeque<Vec<u8>>,
    read_failure: Option<String>,
    write_failure: Option<String>,
    up: bool,
    down_calls: usize,
}

/// TUN device backed by two in-memory queues.
pub struct MockTun {
    config: TunConfig,
    state: Mutex<DeviceState>,
    readable: Notify,
    written: Notify,
    routes: Option<Arc<MockRouteTable>>,
}

impl MockTun {
    /// A device that is down and has nothing queued.
    #[must_use]
    pub fn new(config: TunConfig) -> Self {
        Self {
            config,
            state: Mutex::new(DeviceState::default()),
            readable: Notify::new(),
            written: Notify::new(),
            routes: None,
        }
    }

    /// Like [`MockTun::new`], but `down` drops the routes in `routes` whose
    /// gateway is on this device's network.
    #[must_use]
    pub fn with_routes(config: TunConfig, routes: Arc<MockRouteTable>) -> Self {
        Self {
            routes: Some(routes),
            ..Self::new(config)
        }
    }

    /// Queues a packet as if the host routed it into the tunnel.
    pub fn inject_packet(&self, packet: Vec<u8>) {
        self.state.lock().inbound.push_back(packet);
        self.readable.notify_one();
    }

    /// The next `read` fails with `reason` (wakes a parked reader).
    pub fn fail_next_read(&self, reason: impl Into<String>) {
        self.state.lock().read_failure = Some(reason.into());
        self.readable.notify_one();
    }

    /// The next `write` fails with `reason`.
    pub fn fail_next_write(&self, reason: impl Into<String>) {
        self.state.lock().write_failure = Some(reason.into());
    }

    /// Removes and returns everything written so far.
    #[must_use]
    pub fn take_written_packets(&self) -> Vec<Vec<u8>> {
        self.state.lock().outbound.drain(..).collect()
    }

    /// Waits for the oldest written packet and removes it.
    pub async fn next_written(&self) -> Vec<u8> {
        loop {
            let notified = self.written.notified();
            if let Some(packet) = self.state.lock().outbound.pop_front() {
                return packet;
            }
            notified.await;
        }
    }

    /// Injected packets not yet read.
    #[must_use]
    pub fn pending_read_count(&self) -> usize {
        self.state.lock().inbound.len()
    }

    /// Written packets not yet taken.
    #[must_use]
    pub fn written_count(&self) -> usize {
        self.state.lock().outbound.len()
    }

    /// How many times `down` ran.
    #[must_use]
    pub fn down_calls(&self) -> usize {
        self.state.lock().down_calls
    }

    fn poll_read(&self, buf: &mut [u8]) -> Option<Result<usize>> {
        let mut state = self.state.lock();
        if let Some(reason) = state.read_failure.take() {
            return Some(Err(TransportError::TunReadFailed { reason }));
        }
        let packet = state.inbound.pop_front()?;
        let len = packet.len().min(buf.len());
        buf[..len].copy_from_slice(&packet[..len]);
        Some(Ok(len))
    }
}

#[async_trait]
impl TunDevice for MockTun {
    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        loop {
            let notified = self.readable.notified();
            if let Some(result) = self.poll_read(buf) {
                return result;
            }
            notified.await;
        }
    }

    async fn write(&self, buf: &[u8]) -> Result<usize> {
        {
            let mut state = self.state.lock();
            if let Some(reason) = state.write_failure.take() {
                return Err(TransportError::TunWriteFailed { reason });
            }
            state.outbound.push_back(buf.to_vec());
        }
        self.written.notify_one();
        Ok(buf.len())
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn mtu(&self) -> u16 {
        self.config.mtu
    }

    fn ip_addr(&self) -> Ipv4Addr {
        self.config.address
    }

    async fn up(&self) -> Result<()> {
        self.state.lock().up = true;
        Ok(())
    }

    async fn down(&self) -> Result<()> {
        let was_up = {
            let mut state = self.state.lock();
            state.down_calls += 1;
            std::mem::replace(&mut state.up, false)
        };
        if let (true, Some(routes)) = (was_up, &self.routes) {
            routes.link_down(self.config.address, self.config.prefix_len);
        }
        Ok(())
    }

    fn is_up(&self) -> bool {
        self.state.lock().up
    }
}

impl std::fmt::Debug for MockTun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTun")
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .finish()
    }
}

// ============================================
// MockTunProvider
// ============================================

/// Hands out [`MockTun`]s and keeps a handle to each.
#[derive(Debug, Default)]
pub struct MockTunProvider {
    devices: Mutex<Vec<Arc<MockTun>>>,
    create_failure: Mutex<Option<String>>,
    routes: Option<Arc<MockRouteTable>>,
}

impl MockTunProvider {
    /// A provider whose devices touch no routing table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose devices drop their routes from `routes` when
    /// brought down. See [`MockTun::with_routes`].
    #[must_use]
    pub fn with_routes(routes: Arc<MockRouteTable>) -> Self {
        Self {
            routes: Some(routes),
            ..Self::default()
        }
    }

    /// The next `create` fails with `reason`.
    pub fn fail_next_create(&self, reason: impl Into<String>) {
        *self.create_failure.lock() = Some(reason.into());
    }

    /// Every device created so far, oldest first.
    #[must_use]
    pub fn devices(&self) -> Vec<Arc<MockTun>> {
        self.devices.lock().clone()
    }

    /// The most recently created device.
    #[must_use]
    pub fn last_device(&self) -> Option<Arc<MockTun>> {
        self.devices.lock().last().cloned()
    }
}

#[async_trait]
impl TunProvider for MockTunProvider {
    async fn create(&self, config: TunConfig) -> Result<Arc<dyn TunDevice>> {
        config.validate()?;
        if let Some(reason) = self.create_failure.lock().take() {
            return Err(TransportError::tun_create_failed(&config.name, reason));
        }

        let device = Arc::new(match &self.routes {
            Some(routes) => MockTun::with_routes(config, Arc::clone(routes)),
            None => MockTun::new(config),
        });
        self.devices.lock().push(Arc::clone(&device));
        Ok(device)
    }
}
