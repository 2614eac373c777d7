// ============================================
// File: crates/burrow-client/src/services/routing.rs
// ============================================
//! # Routing Orchestrator
//!
//! ## Creation Reason
//! Makes the tunnel the host's default path without cutting the client
//! off from the peer, and puts the host routing table back afterwards.
//!
//! ## Install / Restore Sequence
//! ```text
//!  install                                 restore
//!  ───────                                 ───────
//!  1. read default gw ──► snapshot
//!  2. add  peer/32 via original gw ──┐  ┌── 3. del peer/32
//!  3. del  default                   │  │   2. add default via original gw
//!  4. add  default via tunnel gw ────┘  └── 1. del default
//! ```
//! Install stops at the first failing step and undoes the steps it had
//! already applied. Restore runs every step no matter what and reports
//! each failure.
//!
//! ## ⚠️ Important Note for Next Developer
//! - The peer host route MUST exist before the default route moves,
//!   otherwise the tunnel's own datagrams would be routed into the tunnel
//! - Restore failures are never fatal; they come back in `RestoreReport`
//!
//! ## Last Modified
//! v0.1.0 - Initial routing orchestrator

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use burrow_transport::error::TransportError;
use burrow_transport::route::RouteTable;

use crate::error::Result;

// ============================================
// RoutingSnapshot
// ============================================

/// Routing state captured by [`RoutingOrchestrator::install`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingSnapshot {
    /// Default gateway before the tunnel came up.
    pub original_gateway: Ipv4Addr,
    /// Tunnel-side gateway installed as default.
    pub tunnel_gateway: Ipv4Addr,
    /// Peer reached through `original_gateway` by a host route.
    pub peer: Ipv4Addr,
}

// ============================================
// RestoreReport
// ============================================

/// One step of the restore sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStep {
    /// Remove the tunnel default route.
    ClearDefault,
    /// Put the original default gateway back.
    RestoreDefault,
    /// Remove the peer host route.
    ClearHostRoute,
}

impl fmt::Display for RestoreStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ClearDefault => "clear default route",
            Self::RestoreDefault => "restore original default route",
            Self::ClearHostRoute => "clear peer host route",
        };
        f.write_str(name)
    }
}

/// A restore step that failed.
#[derive(Debug)]
pub struct RestoreFailure {
    /// Which step.
    pub step: RestoreStep,
    /// What went wrong.
    pub error: TransportError,
}

/// Outcome of [`RoutingOrchestrator::restore`].
#[derive(Debug, Default)]
pub struct RestoreReport {
    failures: Vec<RestoreFailure>,
}

impl RestoreReport {
    /// Returns `true` if every step succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failed steps, in the order they ran.
    #[must_use]
    pub fn failures(&self) -> &[RestoreFailure] {
        &self.failures
    }

    fn record(&mut self, step: RestoreStep, result: std::result::Result<(), TransportError>) {
        if let Err(e) = result {
            error!(step = %step, "Routing restore step failed: {}", e);
            self.failures.push(RestoreFailure { step, error: e });
        } else {
            debug!(step = %step, "Routing restore step done");
        }
    }
}

// ============================================
// RoutingOrchestrator
// ============================================

/// Applies and reverts the tunnel's routing changes.
pub struct RoutingOrchestrator {
    table: Arc<dyn RouteTable>,
}

impl RoutingOrchestrator {
    /// Creates an orchestrator over `table`.
    #[must_use]
    pub fn new(table: Arc<dyn RouteTable>) -> Self {
        Self { table }
    }

    /// Points the default route at `tunnel_gateway`, keeping `peer`
    /// reachable via the current default gateway.
    ///
    /// # Errors
    /// The failing step's error, after the applied steps were undone.
    pub async fn install(&self, peer: Ipv4Addr, tunnel_gateway: Ipv4Addr) -> Result<RoutingSnapshot> {
        let original_gateway = self.table.default_gateway().await?;
        debug!(gateway = %original_gateway, "Current default gateway");

        self.table.set_gateway_for_host(original_gateway, peer).await?;
        debug!(peer = %peer, via = %original_gateway, "Peer host route added");

        if let Err(e) = self.table.clear_default_gateway().await {
            warn!("Failed to clear default route, rolling back: {}", e);
            self.undo_host_route(peer).await;
            return Err(e.into());
        }

        if let Err(e) = self.table.set_default_gateway(tunnel_gateway).await {
            warn!("Failed to set tunnel default route, rolling back: {}", e);
            if let Err(e) = self.table.set_default_gateway(original_gateway).await {
                error!("Rollback: failed to restore default via {}: {}", original_gateway, e);
            }
            self.undo_host_route(peer).await;
            return Err(e.into());
        }

        info!(
            gateway = %tunnel_gateway,
            original = %original_gateway,
            peer = %peer,
            "Default route moved into the tunnel"
        );

        Ok(RoutingSnapshot {
            original_gateway,
            tunnel_gateway,
            peer,
        })
    }

    /// Reverts [`install`](Self::install). Every step is attempted.
    pub async fn restore(&self, snapshot: &RoutingSnapshot) -> RestoreReport {
        let mut report = RestoreReport::default();

        report.record(
            RestoreStep::ClearDefault,
            self.table.clear_default_gateway().await,
        );
        report.record(
            RestoreStep::RestoreDefault,
            self.table.set_default_gateway(snapshot.original_gateway).await,
        );
        report.record(
            RestoreStep::ClearHostRoute,
            self.table.clear_gateway_for_host(snapshot.peer).await,
        );

        if report.is_clean() {
            info!(gateway = %snapshot.original_gateway, "Routing restored");
        } else {
            error!(
                failures = report.failures().len(),
                "Routing restored with failures, check the host routing table"
            );
        }

        report
    }

    async fn undo_host_route(&self, peer: Ipv4Addr) {
        if let Err(e) = self.table.clear_gateway_for_host(peer).await {
            error!("Rollback: failed to remove host route for {}: {}", peer, e);
        }
    }
}

impl fmt::Debug for RoutingOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingOrchestrator").finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
