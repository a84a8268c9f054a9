//! Storefront realtime - Resilient realtime connection manager.
//!
//! This library keeps a web storefront's chat/notification link alive:
//! it establishes an authenticated WebSocket session, recovers from
//! unplanned drops with bounded exponential backoff, and tears everything
//! down the moment the user logs out.
//!
//! # Architecture
//!
//! The manager follows a supervisor model:
//!
//! - **[`ConnectionManager`]**: owns the lifecycle; one supervisor task
//!   runs the whole state machine, so transitions never race
//! - **[`ConnectionSession`]**: one live, handshaken connection; consumers
//!   attach message listeners and publish payloads through it
//! - **Identity signal**: a [`watch`](tokio::sync::watch) channel owned by
//!   the application; absence preempts every connection activity
//!
//! Key design principles:
//!
//! - At most one live session; replacement closes the old one first
//! - The bearer credential is re-read from storage on every attempt
//! - Deliberate closes (local or remote) are never retried
//! - Liveness probes are diagnostic only, never a disconnect trigger
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use storefront_realtime::{
//!     ConnectionManager, RealtimeConfig, Result, SessionCredentials, identity_channel,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = RealtimeConfig::builder()
//!         .endpoint("wss://rt.shop.example/live")
//!         .build()?;
//!
//!     let credentials = Arc::new(SessionCredentials::new());
//!     let (identity_tx, identity_rx) = identity_channel();
//!
//!     let manager = ConnectionManager::builder()
//!         .config(config)
//!         .credentials(credentials.clone())
//!         .identity(identity_rx)
//!         .build()?;
//!
//!     // Login: store the credential, then announce the identity.
//!     credentials.put("access_token", "eyJ...");
//!     identity_tx.send(Some("user-7".into())).ok();
//!
//!     // Later: inspect state, attach a listener, or force a reconnect.
//!     if let Some(session) = manager.current_session() {
//!         session.set_message_handler(Box::new(|payload| {
//!             println!("incoming: {payload}");
//!         }));
//!     }
//!     println!("phase: {}", manager.status().phase);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`backoff`] | Bounded exponential backoff policy |
//! | [`config`] | Manager configuration and builder |
//! | [`credentials`] | Credential storage abstraction |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`identity`] | Authenticated identity signal |
//! | [`manager`] | Connection lifecycle management |
//! | [`protocol`] | Wire message types (internal) |
//! | [`transport`] | WebSocket transport layer (internal) |

// ============================================================================
// Modules
// ============================================================================

/// Bounded exponential backoff policy.
pub mod backoff;

/// Manager configuration and builder.
///
/// Use [`RealtimeConfig::builder()`] to create a validated configuration.
pub mod config;

/// Credential storage abstraction.
///
/// The manager reads the bearer token through [`CredentialStore`] on every
/// connection attempt; it never caches credentials.
pub mod credentials;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Authenticated identity signal.
///
/// The application publishes login/logout through [`identity_channel`];
/// the manager reacts to every transition.
pub mod identity;

/// Connection lifecycle management.
///
/// Use [`ConnectionManager::builder()`] to create a running manager.
pub mod manager;

/// Wire message types.
///
/// Internal module defining the tagged JSON message format.
pub mod protocol;

/// WebSocket transport layer.
///
/// Internal module handling connection establishment and the session
/// event loop.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Policy and configuration
pub use backoff::BackoffPolicy;
pub use config::{RealtimeConfig, RealtimeConfigBuilder};

// Credential and identity types
pub use credentials::{CredentialStore, SessionCredentials};
pub use identity::{Identity, IdentityPublisher, IdentityWatch, identity_channel};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::SessionId;

// Manager types
pub use manager::{ConnectionManager, ConnectionState, ManagerBuilder, Phase};

// Transport types
pub use transport::{
    ConnectionSession, Connector, DisconnectReason, Established, MessageHandler, WsConnector,
};
