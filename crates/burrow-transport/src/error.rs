// ============================================
// File: crates/burrow-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Failures of the three host seams the client drives: the UDP socket,
//! the TUN device and the routing table.
//!
//! ## Error Kinds
//! ```text
//! Network  socket bind/connect/send/recv, socket shut down
//! Device   TUN open/configure/read/write
//! Route    `ip route` failed, or no default gateway to save
//! Config   a TunConfig that cannot be applied
//! System   permissions, raw I/O
//! ```
//! `ClientError` builds its own classification on top of `kind()`.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Device and route failures are almost always missing CAP_NET_ADMIN
//! - `RouteCommandFailed` keeps the whole command line so it can be
//!   re-run by hand
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Coarse grouping of [`TransportError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// UDP socket.
    Network,
    /// TUN device.
    Device,
    /// Routing table.
    Route,
    /// Unusable settings.
    Config,
    /// Privileges and unclassified I/O.
    System,
}

// ============================================
// TransportError
// ============================================

/// Errors from the socket, TUN device and routing table.
///
/// Grouped by [`TransportErrorKind`]; see [`TransportError::kind`].
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Socket
    // ========================================

    /// The local address could not be bound.
    #[error("Cannot bind UDP socket to {addr}: {reason}")]
    BindFailed {
        /// Address the socket was bound to
        addr: SocketAddr,
        /// OS error text
        reason: String,
    },

    /// The kernel refused the peer address.
    #[error("Cannot connect UDP socket to {addr}: {reason}")]
    ConnectFailed {
        /// Peer address
        addr: SocketAddr,
        /// OS error text
        reason: String,
    },

    /// A datagram could not be handed to the kernel.
    #[error("Datagram to {dest} not sent: {reason}")]
    SendFailed {
        /// Peer the datagram was meant for
        dest: SocketAddr,
        /// OS error text
        reason: String,
    },

    /// Receiving failed, e.g. ICMP port unreachable on a connected socket.
    #[error("Datagram receive failed: {reason}")]
    ReceiveFailed {
        /// OS error text
        reason: String,
    },

    /// Another socket already holds the local address.
    #[error("Local address {addr} is taken")]
    AddressInUse {
        /// The contested address
        addr: SocketAddr,
    },

    /// The transport was shut down; pending and later I/O ends here.
    #[error("UDP socket is shut down")]
    ShuttingDown,

    // ========================================
    // TUN Device
    // ========================================

    /// `/dev/net/tun` could not be opened or `TUNSETIFF` failed.
    #[error("Cannot open TUN device '{name}': {reason}")]
    TunCreateFailed {
        /// Requested interface name
        name: String,
        /// Why the device could not be created
        reason: String,
    },

    /// Address, MTU or link state could not be applied.
    #[error("Cannot configure TUN device '{name}': {reason}")]
    TunConfigFailed {
        /// Interface name
        name: String,
        /// Failing command and its output
        reason: String,
    },

    /// Reading a packet from the device failed.
    #[error("Reading from TUN device failed: {reason}")]
    TunReadFailed {
        /// OS error text
        reason: String,
    },

    /// Writing a packet to the device failed.
    #[error("Writing to TUN device failed: {reason}")]
    TunWriteFailed {
        /// OS error text
        reason: String,
    },

    // ========================================
    // Routing Table
    // ========================================

    /// An `ip route` invocation failed.
    #[error("Route command `{command}` failed: {reason}")]
    RouteCommandFailed {
        /// Full command line, ready to re-run by hand
        command: String,
        /// stderr of the command, or why it could not start
        reason: String,
    },

    /// There is no IPv4 default route to save.
    #[error("Routing table has no IPv4 default gateway")]
    NoDefaultGateway,

    // ========================================
    // Configuration / System
    // ========================================

    /// A setting that cannot be applied.
    #[error("Invalid {field}: {reason}")]
    InvalidConfig {
        /// Offending field
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// The process lacks the privileges for an operation.
    #[error("Operation not permitted: {operation}")]
    PermissionDenied {
        /// What was attempted
        operation: String,
    },

    /// Any other I/O failure.
    #[error("{context}")]
    Io {
        /// What was being done
        context: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    /// Creates a `BindFailed` error.
    pub fn bind_failed(addr: SocketAddr, reason: impl Into<String>) -> Self {
        Self::BindFailed {
            addr,
            reason: reason.into(),
        }
    }

    /// Creates a `TunCreateFailed` error.
    pub fn tun_create_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TunCreateFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `TunConfigFailed` error.
    pub fn tun_config_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TunConfigFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `RouteCommandFailed` error.
    pub fn route_failed(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RouteCommandFailed {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Wraps an I/O error with context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates an `InvalidConfig` error.
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Which seam the error came from.
    #[must_use]
    pub const fn kind(&self) -> TransportErrorKind {
        match self {
            Self::BindFailed { .. }
            | Self::ConnectFailed { .. }
            | Self::SendFailed { .. }
            | Self::ReceiveFailed { .. }
            | Self::AddressInUse { .. }
            | Self::ShuttingDown => TransportErrorKind::Network,
            Self::TunCreateFailed { .. }
            | Self::TunConfigFailed { .. }
            | Self::TunReadFailed { .. }
            | Self::TunWriteFailed { .. } => TransportErrorKind::Device,
            Self::RouteCommandFailed { .. } | Self::NoDefaultGateway => TransportErrorKind::Route,
            Self::InvalidConfig { .. } => TransportErrorKind::Config,
            Self::PermissionDenied { .. } | Self::Io { .. } => TransportErrorKind::System,
        }
    }

    /// Returns `true` if retrying as root would likely help.
    #[must_use]
    pub const fn requires_privileges(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. } | Self::TunCreateFailed { .. }
        )
    }

    /// Returns `true` for socket errors.
    #[must_use]
    pub const fn is_network_error(&self) -> bool {
        matches!(self.kind(), TransportErrorKind::Network)
    }

    /// Returns `true` for TUN device errors.
    #[must_use]
    pub const fn is_tun_error(&self) -> bool {
        matches!(self.kind(), TransportErrorKind::Device)
    }

    /// Returns `true` for routing table errors.
    #[must_use]
    pub const fn is_route_error(&self) -> bool {
        matches!(self.kind(), TransportErrorKind::Route)
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            return Self::PermissionDenied {
                operation: err.to_string(),
            };
        }
        Self::io("I/O error", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::bind_failed("127.0.0.1:9000".parse().unwrap(), "in use");
        assert_eq!(err.to_string(), "Cannot bind UDP socket to 127.0.0.1:9000: in use");

        let err = TransportError::route_failed("ip -4 route del default", "No such process");
        assert_eq!(
            err.to_string(),
            "Route command `ip -4 route del default` failed: No such process"
        );
    }

    #[test]
    fn test_error_kinds() {
        let err = TransportError::SendFailed {
            dest: "127.0.0.1:9000".parse().unwrap(),
            reason: "unreachable".into(),
        };
        assert_eq!(err.kind(), TransportErrorKind::Network);
        assert!(err.is_network_error());
        assert!(!err.is_tun_error());

        let err = TransportError::tun_create_failed("tun0", "EPERM");
        assert_eq!(err.kind(), TransportErrorKind::Device);
        assert!(err.requires_privileges());

        assert!(TransportError::NoDefaultGateway.is_route_error());
        assert!(!TransportError::NoDefaultGateway.is_network_error());
        assert_eq!(
            TransportError::invalid_config("mtu", "too small").kind(),
            TransportErrorKind::Config
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let err: TransportError = io::Error::new(io::ErrorKind::WouldBlock, "would block").into();
        assert_eq!(err.kind(), TransportErrorKind::System);

        let err: TransportError = io::Error::from(io::ErrorKind::PermissionDenied).into();
        assert!(matches!(err, TransportError::PermissionDenied { .. }));
    }
}
