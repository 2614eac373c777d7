// ============================================
// File: crates/burrow-transport/src/route/mock.rs
// ============================================
//! # Mock Routing Table
//!
//! ## Creation Reason
//! Routing changes are host-wide and need root; tests instead check
//! the exact sequence of operations against this in-memory table.
//!
//! ## Main Functionality
//! - Keeps a default gateway and a set of /32 host routes
//! - Records every attempted operation in order, failed ones included
//! - Fails chosen operation kinds on demand
//! - `link_down`: drops routes whose next hop sat on a downed link, the
//!   way the kernel does when a TUN device goes down
//!
//! Removing a route that is already gone succeeds, matching
//! `IpRouteTable`.
//!
//! ## Last Modified
//! v0.1.0 - Initial mock implementation

use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::RouteTable;
use crate::error::{Result, TransportError};

// ============================================
// RouteOp
// ============================================

/// One recorded routing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOp {
    /// `default_gateway()`
    ReadDefault,
    /// `set_default_gateway(gateway)`
    SetDefault(Ipv4Addr),
    /// `clear_default_gateway()`
    ClearDefault,
    /// `set_gateway_for_host(gateway, host)`
    SetHost {
        /// Next hop
        gateway: Ipv4Addr,
        /// Destination host
        host: Ipv4Addr,
    },
    /// `clear_gateway_for_host(host)`
    ClearHost(Ipv4Addr),
}

/// Operation kinds, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteOpKind {
    /// `default_gateway()`
    ReadDefault,
    /// `set_default_gateway()`
    SetDefault,
    /// `clear_default_gateway()`
    ClearDefault,
    /// `set_gateway_for_host()`
    SetHost,
    /// `clear_gateway_for_host()`
    ClearHost,
}

impl RouteOp {
    /// Returns the kind of this operation.
    #[must_use]
    pub const fn kind(&self) -> RouteOpKind {
        match self {
            Self::ReadDefault => RouteOpKind::ReadDefault,
            Self::SetDefault(_) => RouteOpKind::SetDefault,
            Self::ClearDefault => RouteOpKind::ClearDefault,
            Self::SetHost { .. } => RouteOpKind::SetHost,
            Self::ClearHost(_) => RouteOpKind::ClearHost,
        }
    }
}

// ============================================
// MockRouteTable
// ============================================

#[derive(Debug, Default)]
struct TableState {
    default: Option<Ipv4Addr>,
    hosts: BTreeMap<Ipv4Addr, Ipv4Addr>,
    ops: Vec<RouteOp>,
    failing: HashSet<RouteOpKind>,
}

/// In-memory `RouteTable`.
///
/// # Example
/// ```ignore
/// use burrow_transport::route::{mock::{MockRouteTable, RouteOp}, RouteTable};
/// use std::net::Ipv4Addr;
///
/// # #[tokio::main]
/// # async fn main() {
/// let table = MockRouteTable::with_default(Ipv4Addr::new(192, 168, 1, 1));
/// table.clear_default_gateway().await.unwrap();
/// assert_eq!(table.default_route(), None);
/// assert_eq!(table.ops(), vec![RouteOp::ClearDefault]);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MockRouteTable {
    state: Mutex<TableState>,
}

impl MockRouteTable {
    /// Creates an empty table (no default route).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table whose default route is via `gateway`.
    #[must_use]
    pub fn with_default(gateway: Ipv4Addr) -> Self {
        let table = Self::new();
        table.state.lock().default = Some(gateway);
        table
    }

    /// Makes every later operation of `kind` fail.
    pub fn fail_on(&self, kind: RouteOpKind) {
        self.state.lock().failing.insert(kind);
    }

    /// Stops failing operations of `kind`.
    pub fn clear_failure(&self, kind: RouteOpKind) {
        self.state.lock().failing.remove(&kind);
    }

    /// Returns every operation attempted so far, in order.
    #[must_use]
    pub fn ops(&self) -> Vec<RouteOp> {
        self.state.lock().ops.clone()
    }

    /// Returns the current default gateway.
    #[must_use]
    pub fn default_route(&self) -> Option<Ipv4Addr> {
        self.state.lock().default
    }

    /// Returns the current host routes as (host, gateway) pairs.
    #[must_use]
    pub fn host_routes(&self) -> Vec<(Ipv4Addr, Ipv4Addr)> {
        self.state
            .lock()
            .hosts
            .iter()
            .map(|(host, gw)| (*host, *gw))
            .collect()
    }

    /// Drops every route whose gateway lies in `address/prefix_len`, as
    /// the kernel does when the link carrying that network goes down.
    /// Not recorded as an operation.
    pub fn link_down(&self, address: Ipv4Addr, prefix_len: u8) {
        let mask = u32::MAX
            .checked_shl(32 - u32::from(prefix_len.min(32)))
            .unwrap_or(0);
        let network = u32::from(address) & mask;
        let on_link = |gateway: &Ipv4Addr| u32::from(*gateway) & mask == network;

        let mut state = self.state.lock();
        if state.default.as_ref().is_some_and(|gateway| on_link(gateway)) {
            state.default = None;
        }
        state.hosts.retain(|_, gateway| !on_link(&*gateway));
    }

    /// Records `op`, then applies `apply` unless the kind is set to fail.
    fn record<T>(&self, op: RouteOp, apply: impl FnOnce(&mut TableState) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock();
        state.ops.push(op);
        if state.failing.contains(&op.kind()) {
            return Err(TransportError::route_failed(
                format!("{op:?}"),
                "injected failure",
            ));
        }
        apply(&mut state)
    }
}

#[async_trait]
impl RouteTable for MockRouteTable {
    async fn default_gateway(&self) -> Result<Ipv4Addr> {
        self.record(RouteOp::ReadDefault, |state| {
            state.default.ok_or(TransportError::NoDefaultGateway)
        })
    }

    async fn set_default_gateway(&self, gateway: Ipv4Addr) -> Result<()> {
        self.record(RouteOp::SetDefault(gateway), |state| {
            if state.default.is_some() {
                return Err(TransportError::route_failed(
                    format!("add default via {gateway}"),
                    "File exists",
                ));
            }
            state.default = Some(gateway);
            Ok(())
        })
    }

    async fn clear_default_gateway(&self) -> Result<()> {
        self.record(RouteOp::ClearDefault, |state| {
            state.default = None;
            Ok(())
        })
    }

    async fn set_gateway_for_host(&self, gateway: Ipv4Addr, host: Ipv4Addr) -> Result<()> {
        self.record(RouteOp::SetHost { gateway, host }, |state| {
            if state.hosts.contains_key(&host) {
                return Err(TransportError::route_failed(
                    format!("add {host}/32 via {gateway}"),
                    "File exists",
                ));
            }
            state.hosts.insert(host, gateway);
            Ok(())
        })
    }

    async fn clear_gateway_for_host(&self, host: Ipv4Addr) -> Result<()> {
        self.record(RouteOp::ClearHost(host), |state| {
            state.hosts.remove(&host);
            Ok(())
        })
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    const LAN_GW: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);
    const PEER: Ipv4Addr = Ipv4Addr::new(203, 0, 113, 5);

    #[tokio::test]
    async fn test_table_behaves_like_kernel() {
        let table = MockRouteTable::with_default(LAN_GW);

        assert_eq!(table.default_gateway().await.unwrap(), LAN_GW);

        // Adding a second default fails until the first is removed
        assert!(table.set_default_gateway(Ipv4Addr::new(10, 8, 0, 1)).await.is_err());
        table.clear_default_gateway().await.unwrap();
        // Already gone counts as done
        table.clear_default_gateway().await.unwrap();
        table.set_default_gateway(Ipv4Addr::new(10, 8, 0, 1)).await.unwrap();

        table.set_gateway_for_host(LAN_GW, PEER).await.unwrap();
        assert_eq!(table.host_routes(), vec![(PEER, LAN_GW)]);
        table.clear_gateway_for_host(PEER).await.unwrap();
        assert!(table.host_routes().is_empty());
        table.clear_gateway_for_host(PEER).await.unwrap();
    }

    #[tokio::test]
    async fn test_link_down_drops_routes_through_it() {
        let table = MockRouteTable::new();
        table.set_default_gateway(Ipv4Addr::new(10, 8, 0, 1)).await.unwrap();
        table.set_gateway_for_host(LAN_GW, PEER).await.unwrap();

        // Another /24 on the same first octets is untouched
        table.link_down(Ipv4Addr::new(10, 8, 1, 7), 24);
        assert_eq!(table.default_route(), Some(Ipv4Addr::new(10, 8, 0, 1)));

        table.link_down(Ipv4Addr::new(10, 8, 0, 7), 24);
        assert_eq!(table.default_route(), None);
        assert_eq!(table.host_routes(), vec![(PEER, LAN_GW)]);
        assert_eq!(table.ops().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_injection_still_records() {
        let table = MockRouteTable::with_default(LAN_GW);
        table.fail_on(RouteOpKind::ClearDefault);

        let err = table.clear_default_gateway().await.unwrap_err();
        assert!(err.is_route_error());
        assert_eq!(table.default_route(), Some(LAN_GW));
        assert_eq!(table.ops(), vec![RouteOp::ClearDefault]);

        table.clear_failure(RouteOpKind::ClearDefault);
        table.clear_default_gateway().await.unwrap();
        assert_eq!(table.default_route(), None);
    }

    #[tokio::test]
    async fn test_empty_table_has_no_default() {
        let table = MockRouteTable::new();
        assert!(matches!(
            table.default_gateway().await,
            Err(TransportError::NoDefaultGateway)
        ));
    }
}
