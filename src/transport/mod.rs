//! Realtime transport layer.
//!
//! This module handles the WebSocket transport between the client and the
//! realtime endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                              ┌─────────────────┐
//! │ ConnectionManager│                              │  Realtime       │
//! │                  │         WebSocket            │  Endpoint       │
//! │  WsConnector     │◄────────────────────────────►│                 │
//! │  → Session       │      wss://…/live            │  (chat/notify)  │
//! │                  │                              │                 │
//! └──────────────────┘                              └─────────────────┘
//! ```
//!
//! # Session Lifecycle
//!
//! 1. `Connector::connect` — open the transport and authenticate it
//! 2. `ConnectionSession` — exchange messages, answer liveness probes
//! 3. `DisconnectReason` — classify how the session ended; the manager
//!    decides whether to recover
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connector` | Connection establishment and handshake |
//! | `session` | Live session handle and event loop |

// ============================================================================
// Submodules
// ============================================================================

/// Connection establishment and handshake.
pub mod connector;

/// Live session handle and event loop.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use connector::{Connector, Established, WsConnector};
pub use session::{ConnectionSession, DisconnectReason, MessageHandler};
