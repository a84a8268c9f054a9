//! Observable connection state.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::error::Error;

// ============================================================================
// Phase
// ============================================================================

/// Lifecycle phase of the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No identity, or a deliberate close left nothing to recover.
    Idle,
    /// A connection attempt (transport open + handshake) is in flight.
    Connecting,
    /// A handshaken session is live.
    Connected,
    /// A backoff timer is pending before the next automatic attempt.
    ReconnectWait,
    /// The automatic retry budget is spent; only `reconnect()` or an
    /// identity change resumes.
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::ReconnectWait => "reconnect-wait",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// ConnectionState
// ============================================================================

/// Snapshot of the manager's connectivity, returned by `status()`.
///
/// `connected` is true only while a session object exists and has
/// completed its handshake. `error` holds the last captured error and is
/// cleared on the next successful connection.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    /// Current lifecycle phase.
    pub phase: Phase,
    /// Whether a handshaken session is live right now.
    pub connected: bool,
    /// Last error observed, if any.
    pub error: Option<Arc<Error>>,
}

impl ConnectionState {
    /// Creates a state snapshot; `connected` is derived from the phase.
    #[inline]
    #[must_use]
    pub(crate) fn new(phase: Phase, error: Option<Arc<Error>>) -> Self {
        Self {
            phase,
            connected: phase == Phase::Connected,
            error,
        }
    }

    /// The initial state: idle, no error.
    #[inline]
    #[must_use]
    pub(crate) fn idle() -> Self {
        Self::new(Phase::Idle, None)
    }
}

// ============================================================================
// Tests
// ============================================================================
