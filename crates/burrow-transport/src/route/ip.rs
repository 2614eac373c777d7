// ============================================
// File: crates/burrow-transport/src/route/ip.rs
// ============================================
//! # iproute2 Routing Table
//!
//! ## Commands
//! ```text
//! default_gateway         ip -4 route show default
//! set_default_gateway     ip -4 route add default via G
//! clear_default_gateway   ip -4 route del default
//! set_gateway_for_host    ip -4 route add H/32 via G
//! clear_gateway_for_host  ip -4 route del H/32
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Deleting a route that is already gone succeeds. Bringing the TUN
//!   link down makes the kernel drop the tunnel default route before
//!   restore gets to it, and iproute2 then answers `No such process`.
//!
//! ## Last Modified
//! v0.1.0 - Initial iproute2 implementation

use std::net::Ipv4Addr;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::RouteTable;
use crate::error::{Result, TransportError};

/// Default program used for route manipulation.
const IP_PROGRAM: &str = "ip";

/// iproute2's text for ESRCH on `route del`.
const ROUTE_GONE: &str = "No such process";

// ============================================
// IpRouteTable
// ============================================

/// `RouteTable` backed by the `ip` command.
#[derive(Debug, Clone)]
pub struct IpRouteTable {
    program: String,
}

impl IpRouteTable {
    /// Uses `ip` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_program(IP_PROGRAM)
    }

    /// Uses a specific binary, e.g. `/sbin/ip`.
    #[must_use]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Runs `<program> -4 route <args>` and returns stdout.
    async fn route(&self, args: &[&str]) -> Result<String> {
        let command = format!("{} -4 route {}", self.program, args.join(" "));
        debug!("Running: {}", command);

        let output = Command::new(&self.program)
            .args(["-4", "route"])
            .args(args)
            .output()
            .await
            .map_err(|e| TransportError::route_failed(&command, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransportError::route_failed(&command, stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Runs a `del`, treating an already missing route as removed.
    async fn remove(&self, args: &[&str]) -> Result<()> {
        already_gone_is_ok(self.route(args).await)
    }
}

fn already_gone_is_ok(result: Result<String>) -> Result<()> {
    match result {
        Err(TransportError::RouteCommandFailed { command, reason }) if reason.contains(ROUTE_GONE) => {
            debug!("`{}`: route already gone", command);
            Ok(())
        }
        other => other.map(drop),
    }
}

impl Default for IpRouteTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RouteTable for IpRouteTable {
    async fn default_gateway(&self) -> Result<Ipv4Addr> {
        let output = self.route(&["show", "default"]).await?;
        parse_gateway(&output).ok_or(TransportError::NoDefaultGateway)
    }

    async fn set_default_gateway(&self, gateway: Ipv4Addr) -> Result<()> {
        self.route(&["add", "default", "via", &gateway.to_string()])
            .await
            .map(drop)
    }

    async fn clear_default_gateway(&self) -> Result<()> {
        self.remove(&["del", "default"]).await
    }

    async fn set_gateway_for_host(&self, gateway: Ipv4Addr, host: Ipv4Addr) -> Result<()> {
        let dest = format!("{host}/32");
        self.route(&["add", &dest, "via", &gateway.to_string()])
            .await
            .map(drop)
    }

    async fn clear_gateway_for_host(&self, host: Ipv4Addr) -> Result<()> {
        let dest = format!("{host}/32");
        self.remove(&["del", &dest]).await
    }
}

// ============================================
// Output Parsing
// ============================================

/// Extracts the gateway from `ip route show default` output, e.g.
/// `default via 192.168.1.1 dev eth0 proto dhcp metric 100`.
///
/// Only the first default route counts.
fn parse_gateway(output: &str) -> Option<Ipv4Addr> {
    output
        .lines()
        .filter(|line| line.trim_start().starts_with("default"))
        .find_map(|line| {
            let mut words = line.split_whitespace();
            words.find(|&w| w == "via")?;
            words.next()?.parse().ok()
        })
}

// ============================================
// Tests
// ============================================
