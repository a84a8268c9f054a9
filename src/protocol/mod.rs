//! Realtime wire protocol message types.
//!
//! This module defines the tagged JSON message format exchanged between
//! the client and the realtime endpoint.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | `hello` | Client → Server | Handshake: authenticate the connection |
//! | `helloAck` | Server → Client | Handshake acknowledged; session live |
//! | `ping` / `pong` | Client ↔ Server | Liveness probe (diagnostic only) |
//! | `publish` / `event` | Client ↔ Server | Opaque domain payloads |
//! | `bye` | Either | Deliberate close announcement |
//! | `error` | Server → Client | Remote-reported protocol error |

// ============================================================================
// Submodules
// ============================================================================

/// Client and server message types.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use message::{ClientMessage, ServerMessage, TransportPolicy};
