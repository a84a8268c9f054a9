//! Client and server message types.
//!
//! Defines the tagged JSON message format exchanged over the realtime
//! link. Chat payloads travel opaquely in `publish`/`event` messages;
//! their semantics belong to the consumer, not this crate.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::SessionId;

// ============================================================================
// TransportPolicy
// ============================================================================

/// Transport-level auto-reconnect policy declared at open time.
///
/// Advisory to the remote endpoint: a secondary safety net beneath the
/// manager's own backoff policy, never a replacement for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportPolicy {
    /// Reconnect attempts the transport layer may make on its own.
    pub retries: u32,

    /// Delay between transport-level attempts, in milliseconds.
    #[serde(rename = "retryDelayMs")]
    pub retry_delay_ms: u64,
}

// ============================================================================
// ClientMessage
// ============================================================================

/// A message from the client to the remote endpoint.
///
/// # Format
///
/// ```json
/// {"type": "hello", "token": "...", "client": "user-7",
///  "transport": {"retries": 3, "retryDelayMs": 2000}}
/// {"type": "ping", "seq": 4}
/// {"type": "publish", "payload": { ... }}
/// {"type": "bye"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Handshake: authenticates the raw connection as a session.
    Hello {
        /// Bearer credential, re-read from storage for this attempt.
        token: String,
        /// Opaque reference to the authenticated user.
        client: String,
        /// Transport-level safety net declared at open time.
        transport: TransportPolicy,
    },

    /// Liveness probe. The remote endpoint answers with `pong`.
    Ping {
        /// Monotonic probe sequence number.
        seq: u64,
    },

    /// Opaque domain payload (chat message, read receipt, ...).
    Publish {
        /// Consumer-owned payload; not interpreted by this crate.
        payload: Value,
    },

    /// Deliberate local close announcement.
    Bye,
}

// ============================================================================
// ServerMessage
// ============================================================================

/// A message from the remote endpoint to the client.
///
/// # Format
///
/// ```json
/// {"type": "helloAck", "sessionId": "uuid"}
/// {"type": "pong", "seq": 4}
/// {"type": "event", "payload": { ... }}
/// {"type": "error", "message": "..."}
/// {"type": "bye"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Handshake acknowledgment; promotes the connection to a session.
    HelloAck {
        /// Server-assigned session identifier.
        #[serde(rename = "sessionId")]
        session_id: SessionId,
    },

    /// Liveness probe acknowledgment. Diagnostic only.
    Pong {
        /// Sequence number of the `ping` being acknowledged.
        seq: u64,
    },

    /// Opaque domain payload (incoming chat message, notification, ...).
    Event {
        /// Consumer-owned payload; routed to the attached listener.
        payload: Value,
    },

    /// Remote-reported protocol error on the live session.
    Error {
        /// Error description from the remote endpoint.
        message: String,
    },

    /// Deliberate remote close announcement.
    Bye,
}

// ============================================================================
// Tests
// ============================================================================
