//! Connection establishment and handshake.
//!
//! This module opens the WebSocket transport and promotes it to an
//! authenticated session.
//!
//! # Connection Flow
//!
//! 1. Open a WebSocket to the configured endpoint (`ws`/`wss` only, no
//!    protocol fallback), attaching the bearer credential as an
//!    `Authorization` header
//! 2. Send the `hello` handshake message with the credential, the client
//!    identity, and the transport-level reconnect declaration
//! 3. Wait for `helloAck` (with timeout); anything else fails the handshake
//! 4. Spawn the session event loop
//!
//! The [`Connector`] trait is the seam the manager goes through, so tests
//! substitute a scripted transport.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::{SinkExt, Stream, StreamExt};
use serde_json::{from_str, to_string};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tracing::{debug, info};

use crate::config::RealtimeConfig;
use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::identity::Identity;
use crate::protocol::{ClientMessage, ServerMessage, TransportPolicy};

use super::session::{ConnectionSession, DisconnectReason};

// ============================================================================
// Established
// ============================================================================

/// A freshly handshaken session, handed to the manager.
pub struct Established {
    /// The live session handle.
    pub session: ConnectionSession,
    /// Fires exactly once with the disconnect reason when the session ends.
    pub closed: oneshot::Receiver<DisconnectReason>,
}

// ============================================================================
// Connector
// ============================================================================

/// Opens and authenticates a realtime session.
///
/// The credential is supplied per call: the manager re-reads it from
/// storage for every attempt, since it may rotate between attempts.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establishes one authenticated session.
    ///
    /// # Errors
    ///
    /// - [`Error::WebSocket`] if the transport cannot be opened
    /// - [`Error::Handshake`] if the remote endpoint rejects the handshake
    /// - [`Error::HandshakeTimeout`] if the acknowledgment never arrives
    async fn connect(
        &self,
        config: &RealtimeConfig,
        identity: &Identity,
        token: &str,
    ) -> Result<Established>;
}

// ============================================================================
// WsConnector
// ============================================================================

/// WebSocket connector against the configured realtime endpoint.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl WsConnector {
    /// Creates a new WebSocket connector.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
        config: &RealtimeConfig,
        identity: &Identity,
        token: &str,
    ) -> Result<Established> {
        // Attach the credential as connection-time authentication data
        let mut request = config.endpoint.as_str().into_client_request()?;
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| Error::handshake("Bearer token is not a valid header value"))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (mut ws_stream, _response) = connect_async(request).await?;
        debug!(endpoint = %config.endpoint, "WebSocket transport opened");

        // Authenticate the raw connection as a session
        let hello = ClientMessage::Hello {
            token: token.to_string(),
            client: identity.as_str().to_string(),
            transport: TransportPolicy {
                retries: config.transport_retries,
                retry_delay_ms: config.transport_retry_delay.as_millis() as u64,
            },
        };
        ws_stream.send(Message::Text(to_string(&hello)?.into())).await?;

        let timeout_ms = config.handshake_timeout.as_millis() as u64;
        let session_id = timeout(config.handshake_timeout, wait_for_ack(&mut ws_stream))
            .await
            .map_err(|_| Error::handshake_timeout(timeout_ms))??;

        info!(session_id = %session_id, "Handshake acknowledged");

        let (session, closed) = ConnectionSession::spawn(session_id, ws_stream);
        Ok(Established { session, closed })
    }
}

// ============================================================================
// Handshake
// ============================================================================

/// Reads frames until the handshake acknowledgment arrives.
async fn wait_for_ack<S>(ws_stream: &mut S) -> Result<SessionId>
where
    S: Stream<Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = match ws_stream.next().await {
            Some(Ok(message)) => message,
            Some(Err(e)) => return Err(Error::WebSocket(e)),
            None => return Err(Error::handshake("Connection ended before acknowledgment")),
        };

        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => {
                return Err(Error::handshake("Connection closed during handshake"));
            }
            // Ignore Binary, Ping, Pong
            _ => continue,
        };

        match from_str::<ServerMessage>(&text) {
            Ok(ServerMessage::HelloAck { session_id }) => return Ok(session_id),
            Ok(ServerMessage::Error { message }) => return Err(Error::handshake(message)),
            Ok(ServerMessage::Bye) => {
                return Err(Error::handshake("Remote endpoint refused the session"));
            }
            Ok(other) => {
                debug!(?other, "Ignoring pre-ack message");
            }
            Err(e) => {
                return Err(Error::handshake(format!("Unparsable handshake reply: {e}")));
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::session::testing::ws_pair;

    #[tokio::test]
    async fn test_wait_for_ack_success() {
        let (mut client, mut server) = ws_pair().await;
        let id = SessionId::generate();

        let ack = to_string(&ServerMessage::HelloAck { session_id: id }).expect("serialize");
        server.send(Message::Text(ack.into())).await.expect("send");

        let got = wait_for_ack(&mut client).await.expect("ack");
        assert_eq!(got, id);
    }

    #[tokio::test]
    async fn test_wait_for_ack_rejection() {
        let (mut client, mut server) = ws_pair().await;

        server
            .send(Message::Text(
                r#"{"type":"error","message":"bad token"}"#.to_string().into(),
            ))
            .await
            .expect("send");

        let result = wait_for_ack(&mut client).await;
        let Err(Error::Handshake { message }) = result else {
            panic!("expected handshake error");
        };
        assert_eq!(message, "bad token");
    }

    #[tokio::test]
    async fn test_wait_for_ack_remote_bye() {
        let (mut client, mut server) = ws_pair().await;

        server
            .send(Message::Text(r#"{"type":"bye"}"#.to_string().into()))
            .await
            .expect("send");

        assert!(matches!(
            wait_for_ack(&mut client).await,
            Err(Error::Handshake { .. })
        ));
    }

    #[tokio::test]
    async fn test_wait_for_ack_skips_pre_ack_noise() {
        let (mut client, mut server) = ws_pair().await;
        let id = SessionId::generate();

        server
            .send(Message::Text(r#"{"type":"pong","seq":0}"#.to_string().into()))
            .await
            .expect("send");
        let ack = to_string(&ServerMessage::HelloAck { session_id: id }).expect("serialize");
        server.send(Message::Text(ack.into())).await.expect("send");

        let got = wait_for_ack(&mut client).await.expect("ack");
        assert_eq!(got, id);
    }

    #[tokio::test]
    async fn test_wait_for_ack_connection_ended() {
        let (mut client, server) = ws_pair().await;
        drop(server);

        assert!(wait_for_ack(&mut client).await.is_err());
    }
}
