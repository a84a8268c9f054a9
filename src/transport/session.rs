//! Live session handle and event loop.
//!
//! A [`ConnectionSession`] is the single live transport handle owned by
//! the connection manager. The session spawns a tokio task that handles:
//!
//! - Incoming messages from the remote endpoint (events, pongs, errors)
//! - Outgoing messages from consumers (publishes) and the probe (pings)
//! - Close detection, classified into a [`DisconnectReason`]
//!
//! Consumers only ever attach or detach a message listener on the handle
//! returned by the manager; session lifecycle stays with the manager.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, from_str, to_string};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::protocol::{ClientMessage, ServerMessage};

// ============================================================================
// Types
// ============================================================================

/// Message listener callback type.
///
/// Called for each domain payload received from the remote endpoint.
pub type MessageHandler = Box<dyn Fn(Value) + Send + Sync>;

// ============================================================================
// DisconnectReason
// ============================================================================

/// Why a session's event loop ended.
///
/// Deliberate reasons (local or remote) suppress automatic reconnection;
/// everything else is an unplanned drop the manager recovers from.
#[derive(Debug, Clone)]
pub enum DisconnectReason {
    /// The manager closed the session on purpose.
    DeliberateLocal,
    /// The remote endpoint closed the session on purpose.
    DeliberateRemote,
    /// The stream ended without any close exchange.
    Dropped,
    /// The transport or the remote endpoint reported an error.
    Errored(Arc<Error>),
}

impl DisconnectReason {
    /// Returns `true` for a deliberate close, local or remote.
    ///
    /// Both sides' deliberate closes suppress automatic reconnection.
    #[inline]
    #[must_use]
    pub fn is_deliberate(&self) -> bool {
        matches!(self, Self::DeliberateLocal | Self::DeliberateRemote)
    }

    /// Converts an unplanned disconnect into the error recorded in status.
    #[must_use]
    pub(crate) fn into_error(self) -> Arc<Error> {
        match self {
            Self::Errored(error) => error,
            _ => Arc::new(Error::ConnectionClosed),
        }
    }
}

// ============================================================================
// SessionCommand
// ============================================================================

/// Internal commands for the event loop.
enum SessionCommand {
    /// Send a message to the remote endpoint.
    Send(ClientMessage),
    /// Announce a deliberate local close and shut the stream down.
    Close,
}

// ============================================================================
// ProbeState
// ============================================================================

/// Shared liveness probe accounting.
///
/// Sequence numbers start at 1; 0 means "none yet".
#[derive(Debug, Default)]
struct ProbeState {
    /// Last ping sequence number sent.
    last_ping: AtomicU64,
    /// Last pong sequence number received.
    last_pong: AtomicU64,
}

// ============================================================================
// ConnectionSession
// ============================================================================

/// The live transport handle for one authenticated realtime session.
///
/// Exactly one session is live at a time; the manager owns its lifecycle
/// with close-then-replace semantics. Clones share the same underlying
/// event loop and are cheap.
///
/// # Thread Safety
///
/// `ConnectionSession` is `Send + Sync`; all operations are non-blocking.
pub struct ConnectionSession {
    /// Server-assigned session identifier.
    id: SessionId,
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    /// Message listener (shared with event loop).
    handler: Arc<Mutex<Option<MessageHandler>>>,
    /// Liveness probe accounting (shared with event loop).
    probe: Arc<ProbeState>,
    /// Whether the event loop is still running.
    open: Arc<AtomicBool>,
}

impl Clone for ConnectionSession {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            command_tx: self.command_tx.clone(),
            handler: Arc::clone(&self.handler),
            probe: Arc::clone(&self.probe),
            open: Arc::clone(&self.open),
        }
    }
}

impl std::fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("id", &self.id)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl ConnectionSession {
    /// Creates a session from a handshaken WebSocket stream.
    ///
    /// Spawns the event loop task internally. Returns the session handle
    /// and a receiver that fires exactly once with the disconnect reason
    /// when the event loop ends.
    pub(crate) fn spawn<S>(id: SessionId, stream: S) -> (Self, oneshot::Receiver<DisconnectReason>)
    where
        S: Stream<Item = std::result::Result<Message, WsError>>
            + Sink<Message, Error = WsError>
            + Send
            + Unpin
            + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = oneshot::channel();
        let handler: Arc<Mutex<Option<MessageHandler>>> = Arc::new(Mutex::new(None));
        let probe = Arc::new(ProbeState::default());
        let open = Arc::new(AtomicBool::new(true));

        tokio::spawn(Self::run_event_loop(
            stream,
            command_rx,
            closed_tx,
            Arc::clone(&handler),
            Arc::clone(&probe),
            Arc::clone(&open),
        ));

        let session = Self {
            id,
            command_tx,
            handler,
            probe,
            open,
        };

        (session, closed_rx)
    }

    /// Returns the server-assigned session identifier.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Returns `true` while the event loop is running.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Sets the message listener callback.
    ///
    /// The listener is called for each domain payload received from the
    /// remote endpoint. Replaces any previous listener.
    pub fn set_message_handler(&self, handler: MessageHandler) {
        let mut guard = self.handler.lock();
        *guard = Some(handler);
    }

    /// Detaches the message listener.
    pub fn clear_message_handler(&self) {
        let mut guard = self.handler.lock();
        *guard = None;
    }

    /// Sends an opaque domain payload to the remote endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the session is gone.
    pub fn publish(&self, payload: Value) -> Result<()> {
        self.command_tx
            .send(SessionCommand::Send(ClientMessage::Publish { payload }))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Sends a liveness probe with the given sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the session is gone.
    pub(crate) fn ping(&self, seq: u64) -> Result<()> {
        self.probe.last_ping.store(seq, Ordering::Release);
        self.command_tx
            .send(SessionCommand::Send(ClientMessage::Ping { seq }))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Returns how many probes are outstanding (sent but unacked).
    ///
    /// Purely diagnostic; an unacked probe never forces a disconnect.
    #[inline]
    #[must_use]
    pub fn probe_lag(&self) -> u64 {
        let sent = self.probe.last_ping.load(Ordering::Acquire);
        let acked = self.probe.last_pong.load(Ordering::Acquire);
        sent.saturating_sub(acked)
    }

    /// Closes the session deliberately.
    ///
    /// Announces `bye`, closes the stream, and ends the event loop with
    /// [`DisconnectReason::DeliberateLocal`]. Idempotent.
    pub(crate) fn close(&self) {
        let _ = self.command_tx.send(SessionCommand::Close);
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop<S>(
        stream: S,
        mut command_rx: mpsc::UnboundedReceiver<SessionCommand>,
        closed_tx: oneshot::Sender<DisconnectReason>,
        handler: Arc<Mutex<Option<MessageHandler>>>,
        probe: Arc<ProbeState>,
        open: Arc<AtomicBool>,
    ) where
        S: Stream<Item = std::result::Result<Message, WsError>>
            + Sink<Message, Error = WsError>
            + Send
            + Unpin
            + 'static,
    {
        let (mut ws_write, mut ws_read) = stream.split();

        let reason = loop {
            tokio::select! {
                // Incoming messages from the remote endpoint
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(reason) = Self::handle_incoming(&text, &handler, &probe) {
                                let _ = ws_write.close().await;
                                break reason;
                            }
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("Session closed by remote");
                            break DisconnectReason::DeliberateRemote;
                        }

                        Some(Err(e)) => {
                            warn!(error = %e, "Session transport error");
                            break DisconnectReason::Errored(Arc::new(Error::WebSocket(e)));
                        }

                        None => {
                            debug!("Session stream ended");
                            break DisconnectReason::Dropped;
                        }

                        // Ignore Binary, Ping, Pong frames
                        _ => {}
                    }
                }

                // Outgoing messages from consumers, probe, and manager
                command = command_rx.recv() => {
                    match command {
                        Some(SessionCommand::Send(message)) => {
                            Self::handle_send(message, &mut ws_write).await;
                        }

                        Some(SessionCommand::Close) | None => {
                            debug!("Closing session deliberately");
                            Self::announce_bye(&mut ws_write).await;
                            let _ = ws_write.close().await;
                            break DisconnectReason::DeliberateLocal;
                        }
                    }
                }
            }
        };

        open.store(false, Ordering::Release);
        let _ = closed_tx.send(reason);

        debug!("Session event loop terminated");
    }

    /// Handles an incoming text message from the remote endpoint.
    ///
    /// Returns `Some(reason)` when the message ends the session.
    fn handle_incoming(
        text: &str,
        handler: &Arc<Mutex<Option<MessageHandler>>>,
        probe: &Arc<ProbeState>,
    ) -> Option<DisconnectReason> {
        let message = match from_str::<ServerMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Failed to parse incoming message");
                return None;
            }
        };

        match message {
            ServerMessage::Event { payload } => {
                let guard = handler.lock();
                if let Some(ref handler) = *guard {
                    handler(payload);
                } else {
                    trace!("Event received with no listener attached");
                }
                None
            }

            ServerMessage::Pong { seq } => {
                probe.last_pong.store(seq, Ordering::Release);
                trace!(seq, "Liveness probe acknowledged");
                None
            }

            ServerMessage::Error { message } => {
                warn!(message = %message, "Remote endpoint reported an error");
                Some(DisconnectReason::Errored(Arc::new(Error::remote_protocol(
                    message,
                ))))
            }

            ServerMessage::Bye => {
                debug!("Remote endpoint said goodbye");
                Some(DisconnectReason::DeliberateRemote)
            }

            ServerMessage::HelloAck { session_id } => {
                warn!(session_id = %session_id, "Unexpected handshake ack on live session");
                None
            }
        }
    }

    /// Serializes and sends an outgoing message.
    async fn handle_send<W>(message: ClientMessage, ws_write: &mut W)
    where
        W: Sink<Message, Error = WsError> + Unpin,
    {
        let json = match to_string(&message) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize outgoing message");
                return;
            }
        };

        if let Err(e) = ws_write.send(Message::Text(json.into())).await {
            // The read side will observe and classify the failure.
            warn!(error = %e, "Failed to send message");
        }
    }

    /// Sends the deliberate close announcement, best effort.
    async fn announce_bye<W>(ws_write: &mut W)
    where
        W: Sink<Message, Error = WsError> + Unpin,
    {
        if let Ok(json) = to_string(&ClientMessage::Bye)
            && let Err(e) = ws_write.send(Message::Text(json.into())).await
        {
            debug!(error = %e, "Failed to announce deliberate close");
        }
    }
}

// ============================================================================
// Test Support
// ============================================================================


// ============================================================================
// Tests
// ============================================================================
