//! Authenticated identity signal consumed by the connection manager.
//!
//! The identity itself is owned by the surrounding application (login,
//! session refresh, logout). This crate only observes it: a
//! [`tokio::sync::watch`] channel of `Option<Identity>` is the reactive
//! source, and every transition (absent to present, present to absent, or
//! a value change) makes the manager re-evaluate the connection lifecycle.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use tokio::sync::watch;

// ============================================================================
// Identity
// ============================================================================

/// Opaque reference to the currently authenticated user.
///
/// The manager never inspects the value beyond equality; it exists so a
/// change of user (without an intervening logout) still tears down and
/// re-establishes the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Creates an identity from an opaque user reference.
    #[inline]
    #[must_use]
    pub fn new(user_ref: impl Into<String>) -> Self {
        Self(user_ref.into())
    }

    /// Returns the opaque user reference.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// Channel Helpers
// ============================================================================

/// Sender half of the identity signal, held by the application.
pub type IdentityPublisher = watch::Sender<Option<Identity>>;

/// Receiver half of the identity signal, consumed by the manager.
pub type IdentityWatch = watch::Receiver<Option<Identity>>;

/// Creates an identity channel starting with no authenticated user.
#[must_use]
pub fn identity_channel() -> (IdentityPublisher, IdentityWatch) {
    watch::channel(None)
}

// ============================================================================
// Tests
// ============================================================================
