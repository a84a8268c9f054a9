//! Bearer credential access for connection-time authentication.
//!
//! The credential lives in ephemeral session-scoped storage owned by the
//! surrounding application. The manager re-reads it through
//! [`CredentialStore`] on every connection attempt, never caching it,
//! because the token may rotate between attempts. An absent credential is
//! a valid, non-throwing outcome.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

// ============================================================================
// CredentialStore
// ============================================================================

/// Synchronous read access to session-scoped bearer credentials.
///
/// Implementations must be cheap and non-blocking: the manager calls
/// [`bearer`](CredentialStore::bearer) from its supervisor task before
/// every connection attempt.
pub trait CredentialStore: Send + Sync {
    /// Returns the bearer token stored under `key`, if any.
    fn bearer(&self, key: &str) -> Option<String>;
}

// ============================================================================
// SessionCredentials
// ============================================================================

/// In-process credential store scoped to one application session.
///
/// Suitable for embedding and tests; production consumers typically adapt
/// their own session storage by implementing [`CredentialStore`] directly.
#[derive(Debug, Default)]
pub struct SessionCredentials {
    /// Token values by storage key.
    tokens: RwLock<FxHashMap<String, String>>,
}

impl SessionCredentials {
    /// Creates an empty credential store.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a bearer token under `key`, replacing any previous value.
    pub fn put(&self, key: impl Into<String>, token: impl Into<String>) {
        self.tokens.write().insert(key.into(), token.into());
    }

    /// Removes the token stored under `key`, returning it if present.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.tokens.write().remove(key)
    }

    /// Removes all stored tokens.
    pub fn clear(&self) {
        self.tokens.write().clear();
    }
}

impl CredentialStore for SessionCredentials {
    fn bearer(&self, key: &str) -> Option<String> {
        self.tokens.read().get(key).cloned()
    }
}

// ============================================================================
// Tests
// ============================================================================
