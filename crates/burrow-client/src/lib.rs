// ============================================
// File: crates/burrow-client/src/lib.rs
// ============================================
//! # Burrow Client
//!
//! ## Creation Reason
//! Runs one tunnel session against one peer: a sealed Request/Accept
//! handshake over UDP, a TUN device on the granted address, the host's
//! default route moved onto it, and two relay loops until something ends
//! the session. The routing table is put back on every exit path.
//!
//! ## Main Functionality
//! - [`client::Client`]: the lifecycle coordinator; owns the seams and
//!   returns a [`SessionReport`]
//! - [`services`]: handshake, routing and relay phases
//! - [`session::SessionState`]: `Disconnected → Handshaking → Established →
//!   Terminating → Closed`
//! - [`signal`]: SIGINT/SIGTERM, or a manual trigger in tests
//! - [`config::ClientConfig`]: TOML file, peer overridable from the CLI
//!
//! ## ⚠️ Important Note for Next Developer
//! - One session per process. A failed session is reported, never
//!   retried.
//!
//! ## Last Modified
//! v0.1.0 - Initial client library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod services;
pub mod session;
pub mod signal;

pub use client::{Client, SessionOptions, SessionReport, TerminationCause};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use session::SessionState;
pub use signal::{SignalSource, TerminateRequest, Trigger, TriggerSignal};

#[cfg(unix)]
pub use signal::OsSignals;
