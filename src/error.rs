//! Error types for the realtime connection manager.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use storefront_realtime::{Result, ConnectionManager};
//!
//! fn example(manager: &ConnectionManager) {
//!     if let Some(error) = manager.status().error {
//!         eprintln!("link degraded: {error}");
//!     }
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants | Retried |
//! |----------|----------|---------|
//! | Configuration | [`Error::Config`], [`Error::InvalidEndpoint`], [`Error::MissingCredential`] | never |
//! | Handshake | [`Error::Handshake`], [`Error::HandshakeTimeout`] | per backoff |
//! | Transport | [`Error::ConnectionClosed`], [`Error::WebSocket`], [`Error::Io`] | per backoff |
//! | Remote | [`Error::RemoteProtocol`] | per backoff |
//! | External | [`Error::Json`] | per backoff |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Errors are never fatal to the manager: they are captured into the
/// observable connection state and, for transient variants, drive the
/// backoff/retry machinery.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when manager configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Endpoint URL is not a usable WebSocket endpoint.
    ///
    /// Only `ws` and `wss` schemes are accepted; there is no protocol
    /// fallback negotiation.
    #[error("Invalid endpoint {url}: {message}")]
    InvalidEndpoint {
        /// The rejected endpoint URL.
        url: String,
        /// Why the endpoint was rejected.
        message: String,
    },

    /// No bearer credential found in the credential store.
    ///
    /// This is a configuration failure, not a transient one: no retry is
    /// scheduled. Recovery requires a manual reconnect or identity change
    /// after the credential appears.
    #[error("No bearer credential found under key '{key}'")]
    MissingCredential {
        /// Storage key that was looked up.
        key: String,
    },

    // ========================================================================
    // Handshake Errors
    // ========================================================================
    /// Handshake rejected or failed before the session was acknowledged.
    #[error("Handshake failed: {message}")]
    Handshake {
        /// Description of the handshake failure.
        message: String,
    },

    /// Remote endpoint did not acknowledge the handshake in time.
    #[error("Handshake timeout after {timeout_ms}ms")]
    HandshakeTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Transport / Remote Errors
    // ========================================================================
    /// Connection closed while an operation was in flight.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Error reported by the remote endpoint over the live session.
    #[error("Remote protocol error: {message}")]
    RemoteProtocol {
        /// Error message reported by the remote endpoint.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid endpoint error.
    #[inline]
    pub fn invalid_endpoint(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a missing credential error.
    #[inline]
    pub fn missing_credential(key: impl Into<String>) -> Self {
        Self::MissingCredential { key: key.into() }
    }

    /// Creates a handshake error.
    #[inline]
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::Handshake {
            message: message.into(),
        }
    }

    /// Creates a handshake timeout error.
    #[inline]
    pub fn handshake_timeout(timeout_ms: u64) -> Self {
        Self::HandshakeTimeout { timeout_ms }
    }

    /// Creates a remote protocol error.
    #[inline]
    pub fn remote_protocol(message: impl Into<String>) -> Self {
        Self::RemoteProtocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a configuration error.
    ///
    /// Configuration errors are never retried automatically.
    #[inline]
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::InvalidEndpoint { .. } | Self::MissingCredential { .. }
        )
    }

    /// Returns `true` if this error is transient.
    ///
    /// Transient errors are retried per the manager's backoff policy.
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        !self.is_config()
    }

    /// Returns `true` if this is a handshake error.
    #[inline]
    #[must_use]
    pub fn is_handshake_error(&self) -> bool {
        matches!(self, Self::Handshake { .. } | Self::HandshakeTimeout { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
