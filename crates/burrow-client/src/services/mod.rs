// ============================================
// File: crates/burrow-client/src/services/mod.rs
// ============================================
//! # Session Phases
//!
//! Each phase of a session is its own service, run in this order by
//! [`crate::client::Client`]:
//!
//! ```text
//! handshake   Request ─► Accept ─► create TUN        -> Tunnel
//! routing     save gw, pin peer/32, default -> tun  -> RoutingSnapshot
//! relay       uplink + downlink until one fails or cancel fires
//! routing     restore from the snapshot              -> RestoreReport
//! ```
//!
//! Services receive trait objects only. None of them decides when the
//! session ends; that belongs to the coordinator.
//!
//! ## Last Modified
//! v0.1.0 - Initial services structure

pub mod handshake;
pub mod relay;
pub mod routing;

pub use handshake::{HandshakeService, Tunnel};
pub use relay::{Relay, RelayStats, RelayTotals};
pub use routing::{RestoreFailure, RestoreReport, RestoreStep, RoutingOrchestrator, RoutingSnapshot};
