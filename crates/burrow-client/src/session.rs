// ============================================
// File: crates/burrow-client/src/session.rs
// ============================================
//! # Session State Machine
//!
//! ## State Transitions
//! ```text
//!                     ┌──────────────┐
//!                     │ Disconnected │
//!                     └──────┬───────┘
//!                            │ handshake starts
//!                            ▼
//!                     ┌──────────────┐  handshake or
//!                     │ Handshaking  │──startup failure──┐
//!                     └──────┬───────┘                   │
//!                            │ Accept + TUN + routes     │
//!                            ▼                           │
//!                     ┌──────────────┐                   │
//!                     │ Established  │                   │
//!                     └──────┬───────┘                   │
//!                            │ first failure or signal   │
//!                            ▼                           │
//!                     ┌──────────────┐                   │
//!                     │ Terminating  │                   │
//!                     └──────┬───────┘                   │
//!                            │ cleanup done              │
//!                            ▼                           │
//!                     ┌──────────────┐                   │
//!                     │    Closed    │◄──────────────────┘
//!                     └──────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `Closed` is terminal; a new session needs a new `Client`
//! - Handles to the TUN device only exist from `Established` on, carried
//!   by the `Tunnel` the handshake returns
//!
//! ## Last Modified
//! v0.1.0 - Initial state machine

use std::fmt;

use tracing::debug;

use crate::error::{ClientError, Result};

/// Lifecycle state of the client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Nothing sent yet.
    #[default]
    Disconnected,
    /// Request sent, waiting for Accept.
    Handshaking,
    /// TUN up, routes installed, relay running.
    Established,
    /// Cleanup in progress.
    Terminating,
    /// Session over.
    Closed,
}

impl SessionState {
    /// Returns `true` if moving from `self` to `to` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Disconnected, Self::Handshaking)
                | (Self::Handshaking, Self::Established)
                | (Self::Handshaking, Self::Closed)
                | (Self::Established, Self::Terminating)
                | (Self::Terminating, Self::Closed)
        )
    }

    /// Moves to `to`.
    ///
    /// # Errors
    /// `InvalidState` if the transition is not allowed; `self` is left
    /// unchanged.
    pub fn transition(&mut self, to: Self) -> Result<()> {
        if !self.can_transition_to(to) {
            return Err(ClientError::InvalidState { from: *self, to });
        }
        debug!(from = %self, to = %to, "Session state change");
        *self = to;
        Ok(())
    }

    /// Returns `true` once the session is over.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "Disconnected",
            Self::Handshaking => "Handshaking",
            Self::Established => "Established",
            Self::Terminating => "Terminating",
            Self::Closed => "Closed",
        };
        f.write_str(name)
    }
}

// ============================================
// Tests
// ============================================
