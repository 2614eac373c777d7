// ============================================
// File: crates/burrow-client/src/signal.rs
// ============================================
//! # Termination Signals
//!
//! ## Main Functionality
//! - `SignalSource`: something that eventually asks the session to end
//! - `OsSignals`: SIGINT / SIGTERM
//! - `TriggerSignal`: programmatic termination, for embedding and tests
//!
//! ## ⚠️ Important Note for Next Developer
//! - `OsSignals::new` installs the handlers immediately; create it before
//!   the handshake so an early Ctrl+C is not lost to the default action
//!
//! ## Last Modified
//! v0.1.0 - Initial signal sources

use std::fmt;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::info;

use crate::error::{ClientError, Result};

/// Why the session was asked to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateRequest {
    /// SIGINT / Ctrl+C.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl fmt::Display for TerminateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => f.write_str("interrupt"),
            Self::Terminate => f.write_str("terminate"),
        }
    }
}

/// Source of a single termination request.
///
/// The coordinator waits on it exactly once.
#[async_trait]
pub trait SignalSource: Send + 'static {
    /// Waits for the request.
    ///
    /// # Errors
    /// Returns error if the source can no longer deliver a request.
    async fn wait(&mut self) -> Result<TerminateRequest>;
}

// ============================================
// OsSignals
// ============================================

/// SIGINT and SIGTERM.
#[cfg(unix)]
pub struct OsSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl OsSignals {
    /// Installs the handlers.
    ///
    /// # Errors
    /// `Signal` if a handler cannot be installed.
    pub fn new() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        let interrupt = signal(SignalKind::interrupt())
            .map_err(|e| ClientError::signal(format!("SIGINT handler: {e}")))?;
        let terminate = signal(SignalKind::terminate())
            .map_err(|e| ClientError::signal(format!("SIGTERM handler: {e}")))?;

        Ok(Self {
            interrupt,
            terminate,
        })
    }
}

#[cfg(unix)]
#[async_trait]
impl SignalSource for OsSignals {
    async fn wait(&mut self) -> Result<TerminateRequest> {
        let request = tokio::select! {
            received = self.interrupt.recv() => received.map(|()| TerminateRequest::Interrupt),
            received = self.terminate.recv() => received.map(|()| TerminateRequest::Terminate),
        };

        let request = request.ok_or_else(|| ClientError::signal("signal stream closed"))?;
        info!("Received {} signal", request);
        Ok(request)
    }
}

#[cfg(unix)]
impl fmt::Debug for OsSignals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OsSignals")
    }
}

// ============================================
// TriggerSignal
// ============================================

/// Signal source fired through a [`Trigger`].
///
/// If the trigger is dropped without firing, `wait` never returns.
#[derive(Debug)]
pub struct TriggerSignal {
    rx: Option<oneshot::Receiver<TerminateRequest>>,
}

/// Fires the paired [`TriggerSignal`].
#[derive(Debug)]
pub struct Trigger {
    tx: oneshot::Sender<TerminateRequest>,
}

impl TriggerSignal {
    /// Creates a signal and its trigger.
    #[must_use]
    pub fn new() -> (Self, Trigger) {
        let (tx, rx) = oneshot::channel();
        (Self { rx: Some(rx) }, Trigger { tx })
    }
}

impl Trigger {
    /// Requests termination. Has no effect once the session is over.
    pub fn fire(self, request: TerminateRequest) {
        let _ = self.tx.send(request);
    }
}

#[async_trait]
impl SignalSource for TriggerSignal {
    async fn wait(&mut self) -> Result<TerminateRequest> {
        let Some(rx) = self.rx.take() else {
            return Err(ClientError::signal("signal already consumed"));
        };

        match rx.await {
            Ok(request) => {
                info!("Termination requested: {}", request);
                Ok(request)
            }
            Err(_) => std::future::pending().await,
        }
    }
}

// ============================================
// Tests
// ============================================
