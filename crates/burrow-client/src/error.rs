// ============================================
// File: crates/burrow-client/src/error.rs
// ============================================
//! # Client Error Types
//!
//! ## Error Classes
//! ```text
//! network   socket bind/send/recv, peer resolution, handshake timeout
//! protocol  bad marker, unknown kind, wrong kind, bad assignment
//! crypto    seal/open failure, unusable key
//! device    TUN create/config/read/write
//! config    config file, routing command failure
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial client error types

use thiserror::Error;

use burrow_core::error::CoreError;
use burrow_transport::error::{TransportError, TransportErrorKind};

use crate::session::SessionState;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

// ============================================
// ClientError
// ============================================

/// Client error types.
///
/// Lower-layer errors are wrapped unchanged; the `is_*` helpers classify
/// across all of them.
#[derive(Error, Debug)]
pub enum ClientError {
    // ========================================
    // Configuration
    // ========================================

    /// The config file could not be read or parsed.
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        /// Config file path
        path: String,
        /// I/O or TOML error text
        reason: String,
    },

    /// A config value is out of range or inconsistent.
    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        /// Dotted field name, e.g. `tun.mtu`
        field: String,
        /// What is wrong with it
        reason: String,
    },

    // ========================================
    // Session
    // ========================================

    /// The peer host name did not resolve.
    #[error("Failed to resolve peer '{host}': {reason}")]
    Resolve {
        /// Host as configured
        host: String,
        /// Resolver error text
        reason: String,
    },

    /// The peer never answered the Request.
    #[error("No Accept from peer within {secs}s")]
    HandshakeTimeout {
        /// Configured timeout
        secs: u64,
    },

    /// A session state change the state machine does not allow.
    #[error("Invalid session transition: {from} -> {to}")]
    InvalidState {
        /// Current state
        from: SessionState,
        /// Requested state
        to: SessionState,
    },

    /// Signal handlers could not be installed or polled.
    #[error("Signal handling failed: {reason}")]
    Signal {
        /// OS error text
        reason: String,
    },

    // ========================================
    // Wrapped
    // ========================================

    /// Framing or crypto failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Socket, TUN or routing failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ClientError {
    /// Creates a `ConfigLoad` error.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ConfigInvalid` error.
    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Resolve` error.
    pub fn resolve(host: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolve {
            host: host.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Signal` error.
    pub fn signal(reason: impl Into<String>) -> Self {
        Self::Signal {
            reason: reason.into(),
        }
    }

    /// Socket failures, resolution failures and the handshake timeout.
    #[must_use]
    pub fn is_network_error(&self) -> bool {
        match self {
            Self::Resolve { .. } | Self::HandshakeTimeout { .. } => true,
            Self::Transport(e) => e.is_network_error(),
            _ => false,
        }
    }

    /// Malformed or unexpected frames.
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_protocol_error())
    }

    /// Seal/open or key failures.
    #[must_use]
    pub fn is_crypto_error(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_crypto_error())
    }

    /// TUN device failures.
    #[must_use]
    pub fn is_device_error(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_tun_error())
    }

    /// Bad configuration, or a routing command the host rejected.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        match self {
            Self::ConfigLoad { .. } | Self::ConfigInvalid { .. } => true,
            Self::Transport(e) => matches!(
                e.kind(),
                TransportErrorKind::Route | TransportErrorKind::Config
            ),
            _ => false,
        }
    }
}
