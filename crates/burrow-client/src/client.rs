// ============================================
// File: crates/burrow-client/src/client.rs
// ============================================
//! # Session Coordinator
//!
//! ## Creation Reason
//! Runs one tunnel session from handshake to teardown and makes sure the
//! host is put back the way it was found, whatever ends the session.
//!
//! ## Main Functionality
//! - `Client`: owns the socket, the key and the host seams
//! - Handshake, then three producers racing to end the session
//! - Single teardown pass, reported as a `SessionReport`
//!
//! ## Session Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Client                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌────────────┐  ┌────────────┐  ┌──────────────┐           │
//! │  │ Uplink     │  │ Downlink   │  │ Signal       │           │
//! │  │ TUN ─► UDP │  │ UDP ─► TUN │  │ SIGINT/TERM  │           │
//! │  └─────┬──────┘  └─────┬──────┘  └──────┬───────┘           │
//! │        │ error         │ error          │ request           │
//! │        ▼               ▼                ▼                   │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │   mpsc (capacity 3)  ─►  first TerminationCause     │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! │                          │                                  │
//! │                          ▼                                  │
//! │  broadcast shutdown ─► join tasks ─► TUN down ─► socket     │
//! │  shutdown ─► restore routes ─► SessionReport                │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `run` consumes the client, so teardown can only happen once
//! - Every producer reports at most once and the channel has room for
//!   all of them, so no producer can block after the coordinator stops
//!   listening
//! - Routing restore runs last: the TUN device must be gone before the
//!   original default route comes back
//!
//! ## Last Modified
//! v0.1.0 - Initial session coordinator

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use burrow_common::types::TunnelAddress;
use burrow_core::{FrameCipher, PresharedKey};
use burrow_transport::route::RouteTable;
use burrow_transport::traits::{Transport, TunConfig, TunProvider};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::services::handshake::{HandshakeService, Tunnel};
use crate::services::relay::{Relay, RelayStats, RelayTotals};
use crate::services::routing::{RestoreReport, RoutingOrchestrator};
use crate::session::SessionState;
use crate::signal::{SignalSource, TerminateRequest};

/// Number of tasks that may report a termination cause.
const TERMINATION_PRODUCERS: usize = 3;

/// How long teardown waits for each task.
const TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================
// TerminationCause
// ============================================

/// The first event that ended an established session.
#[derive(Debug)]
pub enum TerminationCause {
    /// The TUN → peer loop failed.
    Uplink(ClientError),
    /// The peer → TUN loop failed.
    Downlink(ClientError),
    /// A termination signal arrived.
    Signal(TerminateRequest),
    /// The signal source itself failed.
    SignalFailed(ClientError),
    /// Every task exited without reporting.
    Aborted,
}

impl TerminationCause {
    /// Returns `true` if the session was ended on request.
    #[must_use]
    pub const fn is_signal(&self) -> bool {
        matches!(self, Self::Signal(_))
    }

    /// The error behind the termination, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&ClientError> {
        match self {
            Self::Uplink(e) | Self::Downlink(e) | Self::SignalFailed(e) => Some(e),
            Self::Signal(_) | Self::Aborted => None,
        }
    }
}

impl fmt::Display for TerminationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uplink(e) => write!(f, "uplink failed: {e}"),
            Self::Downlink(e) => write!(f, "downlink failed: {e}"),
            Self::Signal(request) => write!(f, "{request} signal"),
            Self::SignalFailed(e) => write!(f, "signal source failed: {e}"),
            Self::Aborted => f.write_str("all tasks exited without a report"),
        }
    }
}

// ============================================
// SessionReport
// ============================================

/// Summary of a finished session.
#[derive(Debug)]
pub struct SessionReport {
    /// Address the peer granted.
    pub address: TunnelAddress,
    /// What ended the session.
    pub cause: TerminationCause,
    /// Outcome of the routing restore.
    pub restore: RestoreReport,
    /// Relay counters at teardown.
    pub stats: RelayTotals,
}

impl SessionReport {
    /// Returns `true` if the session ended on request and the routing
    /// table was fully restored.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.cause.is_signal() && self.restore.is_clean()
    }
}

// ============================================
// SessionOptions
// ============================================

/// Per-session settings.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// TUN name and MTU; the address comes from the peer.
    pub device: TunConfig,
    /// Bound on the wait for the Accept.
    pub handshake_timeout: Duration,
}

impl SessionOptions {
    /// Takes the settings from a loaded configuration.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            device: TunConfig::new(&config.tun.device_name).with_mtu(config.tun.mtu),
            handshake_timeout: config.handshake.timeout(),
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            device: TunConfig::default(),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

// ============================================
// Client
// ============================================

/// Tunnel client.
///
/// # Lifecycle
/// 1. Create with `Client::new` (or `Client::from_config` on Linux)
/// 2. `client.run(signals).await` until the session ends
/// 3. Inspect the returned `SessionReport`
pub struct Client {
    transport: Arc<dyn Transport>,
    cipher: Arc<FrameCipher>,
    tun_provider: Arc<dyn TunProvider>,
    routing: Arc<RoutingOrchestrator>,
    options: SessionOptions,
    state: SessionState,
    shutdown_tx: broadcast::Sender<()>,
}

impl Client {
    /// Creates a client over the given seams.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        key: &PresharedKey,
        tun_provider: Arc<dyn TunProvider>,
        route_table: Arc<dyn RouteTable>,
        options: SessionOptions,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            transport,
            cipher: Arc::new(FrameCipher::new(key)),
            tun_provider,
            routing: Arc::new(RoutingOrchestrator::new(route_table)),
            options,
            state: SessionState::Disconnected,
            shutdown_tx,
        }
    }

    /// Builds a client with the Linux TUN device, `ip` routing and a UDP
    /// socket connected to the configured peer.
    ///
    /// # Errors
    /// Returns error if the key cannot be loaded, the peer cannot be
    /// resolved or the socket cannot be opened.
    #[cfg(target_os = "linux")]
    pub async fn from_config(config: &ClientConfig) -> Result<Self> {
        use burrow_transport::{IpRouteTable, LinuxTunProvider, UdpTransport};

        let key = config.crypto.preshared_key().await?;
        debug!("Using {}", config.crypto.source());

        let peer = config.peer.resolve().await?;
        let transport = UdpTransport::connect(peer.into()).await?;

        Ok(Self::new(
            Arc::new(transport),
            &key,
            Arc::new(LinuxTunProvider),
            Arc::new(IpRouteTable::new()),
            SessionOptions::from_config(config),
        ))
    }

    /// Returns the current session state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Runs one session to completion.
    ///
    /// # Errors
    /// Returns error only if the session could not be established. Once
    /// established, every ending is reported through `SessionReport`.
    pub async fn run(mut self, signals: impl SignalSource) -> Result<SessionReport> {
        info!(
            peer = %self.transport.peer_addr(),
            "Starting burrow client v{}",
            env!("CARGO_PKG_VERSION")
        );

        self.state.transition(SessionState::Handshaking)?;

        let handshake = HandshakeService::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.cipher),
            Arc::clone(&self.tun_provider),
            Arc::clone(&self.routing),
            self.options.device.clone(),
            self.options.handshake_timeout,
        );

        let tunnel = match handshake.perform().await {
            Ok(tunnel) => tunnel,
            Err(e) => {
                error!("Handshake failed: {}", e);
                self.state.transition(SessionState::Closed)?;
                if let Err(e) = self.transport.shutdown().await {
                    warn!("UDP shutdown error: {}", e);
                }
                return Err(e);
            }
        };

        self.state.transition(SessionState::Established)?;
        info!(
            address = %tunnel.address,
            device = tunnel.device.name(),
            "Tunnel established"
        );

        let stats = Arc::new(RelayStats::new());
        let (cause_tx, mut cause_rx) = mpsc::channel(TERMINATION_PRODUCERS);
        let tasks = self.spawn_tasks(&tunnel, Arc::clone(&stats), &cause_tx, signals);
        drop(cause_tx);

        let cause = cause_rx.recv().await.unwrap_or(TerminationCause::Aborted);
        if cause.is_signal() {
            info!("Session ending: {}", cause);
        } else {
            error!("Session ending: {}", cause);
        }

        self.state.transition(SessionState::Terminating)?;
        let address = tunnel.address;
        let restore = self.teardown(tasks, tunnel).await;
        self.state.transition(SessionState::Closed)?;

        let stats = stats.snapshot();
        info!(
            uplink_packets = stats.uplink_packets,
            uplink_bytes = stats.uplink_bytes,
            downlink_packets = stats.downlink_packets,
            downlink_bytes = stats.downlink_bytes,
            "Session closed"
        );

        Ok(SessionReport {
            address,
            cause,
            restore,
            stats,
        })
    }

    /// Spawns uplink, downlink and the signal listener.
    fn spawn_tasks(
        &self,
        tunnel: &Tunnel,
        stats: Arc<RelayStats>,
        cause_tx: &mpsc::Sender<TerminationCause>,
        mut signals: impl SignalSource,
    ) -> Vec<(&'static str, JoinHandle<()>)> {
        let relay = Relay::new(
            Arc::clone(&tunnel.device),
            Arc::clone(&self.transport),
            Arc::clone(&self.cipher),
            stats,
        );

        let uplink = {
            let relay = relay.clone();
            let shutdown_rx = self.shutdown_tx.subscribe();
            let tx = cause_tx.clone();
            tokio::spawn(async move {
                if let Some(e) = relay.uplink(shutdown_rx).await {
                    let _ = tx.send(TerminationCause::Uplink(e)).await;
                }
                debug!("Uplink task exiting");
            })
        };

        let downlink = {
            let shutdown_rx = self.shutdown_tx.subscribe();
            let tx = cause_tx.clone();
            tokio::spawn(async move {
                if let Some(e) = relay.downlink(shutdown_rx).await {
                    let _ = tx.send(TerminationCause::Downlink(e)).await;
                }
                debug!("Downlink task exiting");
            })
        };

        let signal = {
            let mut shutdown_rx = self.shutdown_tx.subscribe();
            let tx = cause_tx.clone();
            tokio::spawn(async move {
                let cause = tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Signal task received shutdown signal");
                        return;
                    }
                    result = signals.wait() => match result {
                        Ok(request) => TerminationCause::Signal(request),
                        Err(e) => TerminationCause::SignalFailed(e),
                    },
                };
                let _ = tx.send(cause).await;
            })
        };

        vec![("uplink", uplink), ("downlink", downlink), ("signal", signal)]
    }

    /// Stops every task and undoes everything the handshake set up.
    async fn teardown(
        &self,
        tasks: Vec<(&'static str, JoinHandle<()>)>,
        tunnel: Tunnel,
    ) -> RestoreReport {
        info!("Tearing down tunnel...");
        let _ = self.shutdown_tx.send(());

        for (name, task) in tasks {
            let abort = task.abort_handle();
            match tokio::time::timeout(TASK_JOIN_TIMEOUT, task).await {
                Ok(Ok(())) => debug!("Task '{}' completed", name),
                Ok(Err(e)) => warn!("Task '{}' failed: {}", name, e),
                Err(_) => {
                    warn!("Task '{}' timed out during shutdown", name);
                    abort.abort();
                }
            }
        }

        let Tunnel { device, routing, .. } = tunnel;

        if let Err(e) = device.down().await {
            warn!("Failed to bring down {}: {}", device.name(), e);
        }
        drop(device);

        if let Err(e) = self.transport.shutdown().await {
            warn!("UDP shutdown error: {}", e);
        }

        self.routing.restore(&routing).await
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("peer", &self.transport.peer_addr())
            .field("device", &self.options.device.name)
            .field("state", &self.state)
            .finish()
    }
}
