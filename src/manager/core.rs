//! Connection manager and supervisor loop.
//!
//! The [`ConnectionManager`] owns the lifecycle of one logical realtime
//! session per authenticated identity: it establishes the transport,
//! authenticates it, recovers from unplanned drops with bounded
//! exponential backoff, and exposes status plus a manual reconnect
//! trigger to consumers.
//!
//! All state transitions run on a single supervisor task; timers,
//! transport callbacks, and identity changes are multiplexed through
//! `tokio::select!`, so no transition ever races another.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, info, warn};

use crate::config::RealtimeConfig;
use crate::credentials::CredentialStore;
use crate::error::Error;
use crate::identity::IdentityWatch;
use crate::transport::session::{ConnectionSession, DisconnectReason};
use crate::transport::{Connector, Established};

use super::state::{ConnectionState, Phase};

// ============================================================================
// Types
// ============================================================================

/// Commands consumers send to the supervisor.
enum Command {
    /// Tear down and attempt a fresh connection, retry counter reset.
    Reconnect,
    /// Tear down everything and end the supervisor.
    Shutdown,
}

/// What woke a parked supervisor (idle, failed, or missing credential).
enum Wake {
    /// The identity signal changed; re-evaluate from the top.
    IdentityChanged,
    /// Manual reconnect requested.
    Reconnect,
    /// Shutdown requested, or every signal source is gone.
    Shutdown,
}

/// Why the supervisor stopped watching a live session.
enum Monitor {
    /// The session's event loop ended with the given reason.
    Closed(DisconnectReason),
    /// The identity signal changed while connected.
    IdentityChanged,
    /// Manual reconnect requested while connected.
    Reconnect,
    /// Shutdown requested while connected.
    Shutdown,
}

// ============================================================================
// ManagerInner
// ============================================================================

/// Shared state between the manager handle and its supervisor task.
pub(crate) struct ManagerInner {
    /// Validated configuration.
    config: RealtimeConfig,
    /// Credential source, re-read on every connection attempt.
    credentials: Arc<dyn CredentialStore>,
    /// Observable connectivity snapshot.
    state: Mutex<ConnectionState>,
    /// The single live session slot, exclusively owned by the manager.
    session: Mutex<Option<ConnectionSession>>,
    /// Channel for sending commands to the supervisor.
    command_tx: mpsc::UnboundedSender<Command>,
    /// Supervisor task handle, taken on shutdown.
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl ManagerInner {
    /// Replaces the observable phase, preserving the last error.
    fn set_phase(&self, phase: Phase) {
        let mut state = self.state.lock();
        let error = state.error.clone();
        *state = ConnectionState::new(phase, error);
    }

    /// Enters `Connected`, clearing any previous error.
    fn enter_connected(&self) {
        *self.state.lock() = ConnectionState::new(Phase::Connected, None);
    }

    /// Enters `Idle` with the given (possibly absent) error.
    fn enter_idle(&self, error: Option<Arc<Error>>) {
        *self.state.lock() = ConnectionState::new(Phase::Idle, error);
    }

    /// Records an attempt failure without leaving the current phase.
    fn record_error(&self, error: Arc<Error>) {
        self.state.lock().error = Some(error);
    }

    /// Records an unplanned session drop and demotes to `ReconnectWait`.
    fn record_drop(&self, error: Arc<Error>) {
        *self.state.lock() = ConnectionState::new(Phase::ReconnectWait, Some(error));
    }

    /// Installs a new session, fully closing any previous one first.
    ///
    /// Close-then-replace: there are never two live handles.
    fn install_session(&self, session: ConnectionSession) {
        let mut slot = self.session.lock();
        if let Some(old) = slot.take() {
            old.close();
        }
        *slot = Some(session);
    }

    /// Closes and drops the current session, if any. Idempotent.
    fn discard_session(&self) {
        if let Some(old) = self.session.lock().take() {
            old.close();
        }
    }
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Resilient realtime connection manager.
///
/// Maintains at most one live, authenticated session matching the current
/// identity, transparently recovering from unplanned drops, and exposing
/// state to consumers.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use storefront_realtime::{
///     ConnectionManager, RealtimeConfig, SessionCredentials, identity_channel,
/// };
///
/// # async fn example() -> storefront_realtime::Result<()> {
/// let config = RealtimeConfig::builder()
///     .endpoint("wss://rt.shop.example/live")
///     .build()?;
///
/// let credentials = Arc::new(SessionCredentials::new());
/// let (identity_tx, identity_rx) = identity_channel();
///
/// let manager = ConnectionManager::builder()
///     .config(config)
///     .credentials(credentials.clone())
///     .identity(identity_rx)
///     .build()?;
///
/// credentials.put("access_token", "eyJ...");
/// identity_tx.send(Some("user-7".into())).ok();
///
/// if let Some(session) = manager.current_session() {
///     session.set_message_handler(Box::new(|payload| {
///         println!("incoming: {payload}");
///     }));
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    /// Shared inner state.
    pub(crate) inner: Arc<ManagerInner>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.status();
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.inner.config.endpoint.as_str())
            .field("phase", &state.phase)
            .field("connected", &state.connected)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ConnectionManager - Public API
// ============================================================================

impl ConnectionManager {
    /// Creates a configuration builder for the manager.
    #[inline]
    #[must_use]
    pub fn builder() -> super::builder::ManagerBuilder {
        super::builder::ManagerBuilder::new()
    }

    /// Returns the active session handle, or `None` if not connected.
    ///
    /// Side-effect free. Consumers may attach or detach message listeners
    /// on the returned handle, never manage its lifecycle.
    #[inline]
    #[must_use]
    pub fn current_session(&self) -> Option<ConnectionSession> {
        self.inner.session.lock().clone()
    }

    /// Returns the current connectivity snapshot and last error.
    ///
    /// Side-effect free.
    #[inline]
    #[must_use]
    pub fn status(&self) -> ConnectionState {
        self.inner.state.lock().clone()
    }

    /// Forces a fresh connection attempt.
    ///
    /// Resets the retry counter to 0, tears down any existing session or
    /// pending backoff timer, and goes straight to `Connecting`. Always
    /// safe to call, from any state; a no-op while no identity is present
    /// or after shutdown.
    pub fn reconnect(&self) {
        let _ = self.inner.command_tx.send(Command::Reconnect);
    }

    /// Tears down the session, probe, and timers, and ends the supervisor.
    ///
    /// Idempotent; safe to call even if nothing is active.
    pub async fn shutdown(&self) {
        let _ = self.inner.command_tx.send(Command::Shutdown);
        let handle = self.inner.supervisor.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

// ============================================================================
// ConnectionManager - Construction
// ============================================================================

impl ConnectionManager {
    /// Creates the manager and spawns its supervisor task.
    ///
    /// Must be called within a tokio runtime.
    pub(crate) fn spawn(
        config: RealtimeConfig,
        credentials: Arc<dyn CredentialStore>,
        identity_rx: IdentityWatch,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(ManagerInner {
            config,
            credentials,
            state: Mutex::new(ConnectionState::idle()),
            session: Mutex::new(None),
            command_tx,
            supervisor: Mutex::new(None),
        });

        let handle = tokio::spawn(run(
            Arc::clone(&inner),
            connector,
            identity_rx,
            command_rx,
        ));
        *inner.supervisor.lock() = Some(handle);

        info!(endpoint = %inner.config.endpoint, "Connection manager started");

        Self { inner }
    }
}

// ============================================================================
// Supervisor
// ============================================================================

/// Supervisor loop: the manager's entire state machine.
///
/// Identity transitions take priority over everything; an in-flight
/// attempt or pending timer is cancelled before any new logic runs, so a
/// stale attempt can never resurrect a session for a logged-out identity.
async fn run(
    inner: Arc<ManagerInner>,
    connector: Arc<dyn Connector>,
    mut identity_rx: IdentityWatch,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
) {
    'lifecycle: loop {
        let identity = identity_rx.borrow_and_update().clone();

        // Idle: park until there is someone to connect for.
        let Some(identity) = identity else {
            inner.discard_session();
            inner.enter_idle(None);
            match wait_for_wake(&mut identity_rx, &mut command_rx).await {
                Wake::IdentityChanged => continue 'lifecycle,
                // Reconnect with no identity is a no-op.
                Wake::Reconnect => continue 'lifecycle,
                Wake::Shutdown => break 'lifecycle,
            }
        };

        debug!(identity = %identity, "Identity present, starting connection cycle");
        let mut retries: u32 = 0;

        'attempts: loop {
            // The credential is re-read from storage on every attempt; it
            // may have rotated since the last one.
            let Some(token) = inner.credentials.bearer(&inner.config.credential_key) else {
                warn!(key = %inner.config.credential_key, "No bearer credential available");
                inner.enter_idle(Some(Arc::new(Error::missing_credential(
                    inner.config.credential_key.clone(),
                ))));
                // Configuration failure: no retry is scheduled.
                match wait_for_wake(&mut identity_rx, &mut command_rx).await {
                    Wake::IdentityChanged => continue 'lifecycle,
                    Wake::Reconnect => {
                        retries = 0;
                        continue 'attempts;
                    }
                    Wake::Shutdown => break 'lifecycle,
                }
            };

            inner.set_phase(Phase::Connecting);
            debug!(prior_retries = retries, "Opening realtime session");

            let attempt = tokio::select! {
                result = connector.connect(&inner.config, &identity, &token) => result,

                // Identity transitions preempt the in-flight attempt.
                changed = identity_rx.changed() => {
                    if changed.is_err() {
                        break 'lifecycle;
                    }
                    continue 'lifecycle;
                }

                command = command_rx.recv() => match command {
                    Some(Command::Reconnect) => {
                        retries = 0;
                        continue 'attempts;
                    }
                    Some(Command::Shutdown) | None => break 'lifecycle,
                }
            };

            match attempt {
                Ok(Established { session, closed }) => {
                    retries = 0;
                    inner.install_session(session.clone());
                    inner.enter_connected();
                    info!(session_id = %session.id(), "Realtime session established");

                    let probe = spawn_probe(session, inner.config.probe_interval);
                    let outcome =
                        monitor_session(closed, &mut identity_rx, &mut command_rx).await;
                    probe.abort();
                    inner.discard_session();

                    match outcome {
                        Monitor::IdentityChanged => {
                            inner.enter_idle(None);
                            continue 'lifecycle;
                        }
                        Monitor::Shutdown => break 'lifecycle,
                        Monitor::Reconnect => {
                            inner.set_phase(Phase::Connecting);
                            retries = 0;
                            continue 'attempts;
                        }
                        Monitor::Closed(reason) if reason.is_deliberate() => {
                            // Intentional close, local or remote: no retry.
                            info!("Session closed deliberately, standing down");
                            inner.enter_idle(None);
                            match wait_for_wake(&mut identity_rx, &mut command_rx).await {
                                Wake::IdentityChanged => continue 'lifecycle,
                                Wake::Reconnect => {
                                    retries = 0;
                                    continue 'attempts;
                                }
                                Wake::Shutdown => break 'lifecycle,
                            }
                        }
                        Monitor::Closed(reason) => {
                            warn!("Session dropped unexpectedly");
                            inner.record_drop(reason.into_error());
                            // Fall through to backoff scheduling.
                        }
                    }
                }
                Err(error) => {
                    warn!(error = %error, "Connection attempt failed");
                    inner.record_error(Arc::new(error));
                }
            }

            // Budget spent: stop automatic recovery until reconnect() or
            // an identity change.
            if retries >= inner.config.max_retries {
                warn!(retries, "Automatic retry budget exhausted");
                inner.set_phase(Phase::Failed);
                match wait_for_wake(&mut identity_rx, &mut command_rx).await {
                    Wake::IdentityChanged => continue 'lifecycle,
                    Wake::Reconnect => {
                        retries = 0;
                        continue 'attempts;
                    }
                    Wake::Shutdown => break 'lifecycle,
                }
            }

            let delay = inner.config.backoff.delay(retries + 1);
            inner.set_phase(Phase::ReconnectWait);
            debug!(
                delay_ms = delay.as_millis() as u64,
                next_attempt = retries + 1,
                "Backoff timer scheduled"
            );

            tokio::select! {
                () = sleep(delay) => {
                    // The counter increments when the timer fires, before
                    // the attempt runs.
                    retries += 1;
                    continue 'attempts;
                }

                changed = identity_rx.changed() => {
                    if changed.is_err() {
                        break 'lifecycle;
                    }
                    continue 'lifecycle;
                }

                command = command_rx.recv() => match command {
                    Some(Command::Reconnect) => {
                        retries = 0;
                        continue 'attempts;
                    }
                    Some(Command::Shutdown) | None => break 'lifecycle,
                }
            }
        }
    }

    inner.discard_session();
    inner.enter_idle(None);
    debug!("Connection manager supervisor terminated");
}

/// Parks until the identity changes, a command arrives, or every signal
/// source is gone.
async fn wait_for_wake(
    identity_rx: &mut IdentityWatch,
    command_rx: &mut mpsc::UnboundedReceiver<Command>,
) -> Wake {
    tokio::select! {
        changed = identity_rx.changed() => match changed {
            Ok(()) => Wake::IdentityChanged,
            // Identity publisher is gone; nothing can ever change again.
            Err(_) => Wake::Shutdown,
        },
        command = command_rx.recv() => match command {
            Some(Command::Reconnect) => Wake::Reconnect,
            Some(Command::Shutdown) | None => Wake::Shutdown,
        },
    }
}

/// Watches a live session until it closes or something preempts it.
async fn monitor_session(
    closed: tokio::sync::oneshot::Receiver<DisconnectReason>,
    identity_rx: &mut IdentityWatch,
    command_rx: &mut mpsc::UnboundedReceiver<Command>,
) -> Monitor {
    tokio::select! {
        reason = closed => match reason {
            Ok(reason) => Monitor::Closed(reason),
            // Event loop vanished without reporting; treat as a drop.
            Err(_) => Monitor::Closed(DisconnectReason::Dropped),
        },
        changed = identity_rx.changed() => match changed {
            Ok(()) => Monitor::IdentityChanged,
            Err(_) => Monitor::Shutdown,
        },
        command = command_rx.recv() => match command {
            Some(Command::Reconnect) => Monitor::Reconnect,
            Some(Command::Shutdown) | None => Monitor::Shutdown,
        },
    }
}

/// Starts the periodic liveness probe for one connected span.
///
/// The handle is owned by the `Connected` state that started it and is
/// aborted the moment that state is left. An unacked probe is logged,
/// never acted on: the transport's own detection governs disconnects.
fn spawn_probe(session: ConnectionSession, period: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it.
        ticker.tick().await;

        let mut seq: u64 = 0;
        loop {
            ticker.tick().await;

            let lag = session.probe_lag();
            if lag > 0 {
                warn!(unacked = lag, "Previous liveness probe unacknowledged");
            }

            seq += 1;
            if session.ping(seq).is_err() {
                debug!("Session gone, stopping liveness probe");
                break;
            }
        }
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures_util::{SinkExt, StreamExt};
    use serde_json::from_str;
    use tokio::io::DuplexStream;
    use tokio::time::Instant;
    use tokio_tungstenite::WebSocketStream;
    use tokio_tungstenite::tungstenite::Message;

    use crate::credentials::SessionCredentials;
    use crate::error::Result;
    use crate::identifiers::SessionId;
    use crate::identity::{Identity, IdentityPublisher, identity_channel};
    use crate::protocol::ClientMessage;
    use crate::transport::session::testing::ws_pair;

    type FarEnd = WebSocketStream<DuplexStream>;

    /// One recorded connection attempt: when, with which token, for whom.
    #[derive(Debug, Clone)]
    struct Attempt {
        at: Instant,
        token: String,
        client: String,
    }

    /// Scripted connector: pops one outcome per attempt (`true` connects,
    /// `false` fails with a transient handshake error); an empty script
    /// keeps failing. Far ends of successful sessions are handed to the
    /// test through a channel.
    struct FakeConnector {
        outcomes: Mutex<VecDeque<bool>>,
        attempts: Mutex<Vec<Attempt>>,
        far_tx: mpsc::UnboundedSender<FarEnd>,
    }

    impl FakeConnector {
        fn attempts(&self) -> Vec<Attempt> {
            self.attempts.lock().clone()
        }

        fn push_outcome(&self, ok: bool) {
            self.outcomes.lock().push_back(ok);
        }
    }

    #[async_trait]
    impl Connector for FakeConnector {
        async fn connect(
            &self,
            _config: &RealtimeConfig,
            identity: &Identity,
            token: &str,
        ) -> Result<Established> {
            self.attempts.lock().push(Attempt {
                at: Instant::now(),
                token: token.to_string(),
                client: identity.as_str().to_string(),
            });

            let ok = self.outcomes.lock().pop_front().unwrap_or(false);
            if !ok {
                return Err(Error::handshake("scripted failure"));
            }

            let (client, server) = ws_pair().await;
            let (session, closed) = ConnectionSession::spawn(SessionId::generate(), client);
            let _ = self.far_tx.send(server);
            Ok(Established { session, closed })
        }
    }

    struct Harness {
        manager: ConnectionManager,
        identity: IdentityPublisher,
        credentials: Arc<SessionCredentials>,
        connector: Arc<FakeConnector>,
        far_rx: mpsc::UnboundedReceiver<FarEnd>,
    }

    fn test_config() -> RealtimeConfig {
        RealtimeConfig::builder()
            .endpoint("ws://127.0.0.1:9/live")
            .build()
            .expect("valid config")
    }

    fn harness_with_config(outcomes: Vec<bool>, config: RealtimeConfig) -> Harness {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let (far_tx, far_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(FakeConnector {
            outcomes: Mutex::new(outcomes.into()),
            attempts: Mutex::new(Vec::new()),
            far_tx,
        });

        let credentials = Arc::new(SessionCredentials::new());
        let (identity, identity_rx) = identity_channel();

        let manager = ConnectionManager::builder()
            .config(config)
            .credentials(Arc::clone(&credentials) as Arc<dyn CredentialStore>)
            .identity(identity_rx)
            .connector(Arc::clone(&connector) as Arc<dyn Connector>)
            .build()
            .expect("manager builds");

        Harness {
            manager,
            identity,
            credentials,
            connector,
            far_rx,
        }
    }

    fn harness(outcomes: Vec<bool>) -> Harness {
        harness_with_config(outcomes, test_config())
    }

    async fn wait_for_phase(manager: &ConnectionManager, phase: Phase) {
        for _ in 0..20_000 {
            if manager.status().phase == phase {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "timed out waiting for phase {phase}, still {}",
            manager.status().phase
        );
    }

    async fn wait_for_attempts(connector: &FakeConnector, count: usize) {
        for _ in 0..20_000 {
            if connector.attempts().len() >= count {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "timed out waiting for {count} attempts, saw {}",
            connector.attempts().len()
        );
    }

    async fn next_far_message(far: &mut FarEnd) -> Option<ClientMessage> {
        loop {
            match far.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Some(from_str(&text).expect("client message"));
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
                Some(Ok(_)) => continue,
            }
        }
    }

    /// Reads the far end until the near side is gone.
    async fn wait_far_closed(far: &mut FarEnd) {
        while next_far_message(far).await.is_some() {}
    }

    fn login(harness: &Harness, user: &str) {
        harness.credentials.put("access_token", format!("tok-{user}"));
        harness
            .identity
            .send(Some(Identity::new(user)))
            .expect("supervisor alive");
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_without_identity() {
        let h = harness(vec![]);
        sleep(Duration::from_secs(5)).await;

        let state = h.manager.status();
        assert_eq!(state.phase, Phase::Idle);
        assert!(!state.connected);
        assert!(state.error.is_none());
        assert!(h.manager.current_session().is_none());
        assert!(h.connector.attempts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_credential_reports_and_never_retries() {
        let h = harness(vec![true]);
        h.identity
            .send(Some(Identity::new("user-1")))
            .expect("supervisor alive");

        for _ in 0..20_000 {
            if h.manager.status().error.is_some() {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }

        let state = h.manager.status();
        assert_eq!(state.phase, Phase::Idle);
        assert!(!state.connected);
        let error = state.error.expect("error surfaced");
        assert!(matches!(*error, Error::MissingCredential { .. }));

        // No timer scheduled: nothing happens no matter how long we wait.
        sleep(Duration::from_secs(300)).await;
        assert!(h.connector.attempts().is_empty());
        assert_eq!(h.manager.status().phase, Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connects_and_exposes_session() {
        let mut h = harness(vec![true]);
        login(&h, "user-1");

        wait_for_phase(&h.manager, Phase::Connected).await;

        let state = h.manager.status();
        assert!(state.connected);
        assert!(state.error.is_none());
        assert!(h.manager.current_session().is_some());

        let _far = h.far_rx.recv().await.expect("far end delivered");
        let attempts = h.connector.attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].token, "tok-user-1");
        assert_eq!(attempts[0].client, "user-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_schedule_reaches_failed() {
        let h = harness(vec![]);
        login(&h, "user-1");

        wait_for_phase(&h.manager, Phase::Failed).await;

        // Initial attempt plus the budget of 5 automatic attempts.
        let attempts = h.connector.attempts();
        assert_eq!(attempts.len(), 6);

        let delays: Vec<u64> = attempts
            .windows(2)
            .map(|pair| (pair[1].at - pair[0].at).as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16]);

        let state = h.manager.status();
        assert!(!state.connected);
        assert!(state.error.is_some());

        // Failed is terminal for automatic recovery.
        sleep(Duration::from_secs(300)).await;
        assert_eq!(h.connector.attempts().len(), 6);
        assert_eq!(h.manager.status().phase, Phase::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_from_failed_resets_counter() {
        let h = harness(vec![]);
        login(&h, "user-1");
        wait_for_phase(&h.manager, Phase::Failed).await;

        h.connector.push_outcome(true);
        h.manager.reconnect();

        wait_for_phase(&h.manager, Phase::Connected).await;
        assert_eq!(h.connector.attempts().len(), 7);
        assert!(h.manager.status().error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_identity_absent_tears_down_from_connected() {
        let mut h = harness(vec![true]);
        login(&h, "user-1");
        wait_for_phase(&h.manager, Phase::Connected).await;
        let mut far = h.far_rx.recv().await.expect("far end delivered");

        h.identity.send(None).expect("supervisor alive");

        wait_for_phase(&h.manager, Phase::Idle).await;
        assert!(h.manager.current_session().is_none());

        // The session was really closed, not leaked.
        wait_far_closed(&mut far).await;

        // And no timer is pending.
        sleep(Duration::from_secs(300)).await;
        assert_eq!(h.connector.attempts().len(), 1);
        assert_eq!(h.manager.status().phase, Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identity_absent_cancels_pending_backoff() {
        let h = harness(vec![]);
        login(&h, "user-1");
        wait_for_phase(&h.manager, Phase::ReconnectWait).await;

        h.identity.send(None).expect("supervisor alive");
        wait_for_phase(&h.manager, Phase::Idle).await;

        let before = h.connector.attempts().len();
        sleep(Duration::from_secs(300)).await;
        assert_eq!(h.connector.attempts().len(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deliberate_remote_close_does_not_retry() {
        let mut h = harness(vec![true]);
        login(&h, "user-1");
        wait_for_phase(&h.manager, Phase::Connected).await;
        let mut far = h.far_rx.recv().await.expect("far end delivered");

        far.send(Message::Text(r#"{"type":"bye"}"#.to_string().into()))
            .await
            .expect("send bye");

        wait_for_phase(&h.manager, Phase::Idle).await;
        assert!(h.manager.current_session().is_none());

        sleep(Duration::from_secs(300)).await;
        assert_eq!(h.connector.attempts().len(), 1);
        assert_eq!(h.manager.status().phase, Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_drop_schedules_single_retry() {
        let mut h = harness(vec![true, true]);
        login(&h, "user-1");
        wait_for_phase(&h.manager, Phase::Connected).await;

        let first_id = h.manager.current_session().expect("session").id();
        let far = h.far_rx.recv().await.expect("far end delivered");

        let dropped_at = Instant::now();
        drop(far);

        // Yield so the supervisor observes the drop before we poll for
        // the post-retry Connected phase.
        sleep(Duration::from_millis(1)).await;
        wait_for_phase(&h.manager, Phase::Connected).await;

        let attempts = h.connector.attempts();
        assert_eq!(attempts.len(), 2, "exactly one automatic retry");

        // First automatic attempt waits the base delay.
        let delta = attempts[1].at - dropped_at;
        assert!(
            delta >= Duration::from_secs(1) && delta < Duration::from_millis(1500),
            "retry fired after {delta:?}"
        );

        let second_id = h.manager.current_session().expect("session").id();
        assert_ne!(first_id, second_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_credential_reread_between_attempts() {
        let h = harness(vec![false, true]);
        h.credentials.put("access_token", "tok-old");
        h.identity
            .send(Some(Identity::new("user-1")))
            .expect("supervisor alive");

        wait_for_attempts(&h.connector, 1).await;
        // Rotate the token while the backoff timer is pending.
        h.credentials.put("access_token", "tok-new");

        wait_for_phase(&h.manager, Phase::Connected).await;

        let tokens: Vec<String> = h
            .connector
            .attempts()
            .iter()
            .map(|a| a.token.clone())
            .collect();
        assert_eq!(tokens, vec!["tok-old", "tok-new"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_without_identity_is_noop() {
        let h = harness(vec![true]);
        h.credentials.put("access_token", "tok");

        h.manager.reconnect();
        sleep(Duration::from_secs(30)).await;

        assert!(h.connector.attempts().is_empty());
        assert_eq!(h.manager.status().phase, Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identity_change_swaps_session() {
        let mut h = harness(vec![true, true]);
        login(&h, "user-1");
        wait_for_phase(&h.manager, Phase::Connected).await;
        let mut far_first = h.far_rx.recv().await.expect("far end delivered");

        login(&h, "user-2");

        wait_for_attempts(&h.connector, 2).await;
        wait_for_phase(&h.manager, Phase::Connected).await;

        // Old session torn down before the new identity's attempt.
        wait_far_closed(&mut far_first).await;

        let attempts = h.connector.attempts();
        assert_eq!(attempts[0].client, "user-1");
        assert_eq!(attempts[1].client, "user-2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_while_connected_replaces_session() {
        let mut h = harness(vec![true, true]);
        login(&h, "user-1");
        wait_for_phase(&h.manager, Phase::Connected).await;
        let mut far_first = h.far_rx.recv().await.expect("far end delivered");
        let first_id = h.manager.current_session().expect("session").id();

        h.manager.reconnect();

        wait_for_attempts(&h.connector, 2).await;
        wait_for_phase(&h.manager, Phase::Connected).await;
        wait_far_closed(&mut far_first).await;

        let second_id = h.manager.current_session().expect("session").id();
        assert_ne!(first_id, second_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_pings_on_interval() {
        let config = RealtimeConfig::builder()
            .endpoint("ws://127.0.0.1:9/live")
            .probe_interval(Duration::from_secs(5))
            .build()
            .expect("valid config");
        let mut h = harness_with_config(vec![true], config);
        login(&h, "user-1");
        wait_for_phase(&h.manager, Phase::Connected).await;
        let mut far = h.far_rx.recv().await.expect("far end delivered");

        let first = next_far_message(&mut far).await.expect("first probe");
        assert_eq!(first, ClientMessage::Ping { seq: 1 });

        far.send(Message::Text(r#"{"type":"pong","seq":1}"#.to_string().into()))
            .await
            .expect("send pong");

        let second = next_far_message(&mut far).await.expect("second probe");
        assert_eq!(second, ClientMessage::Ping { seq: 2 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_is_idempotent() {
        let mut h = harness(vec![true]);
        login(&h, "user-1");
        wait_for_phase(&h.manager, Phase::Connected).await;
        let mut far = h.far_rx.recv().await.expect("far end delivered");

        h.manager.shutdown().await;
        h.manager.shutdown().await;

        assert_eq!(h.manager.status().phase, Phase::Idle);
        assert!(h.manager.current_session().is_none());
        wait_far_closed(&mut far).await;

        // After shutdown these are inert, never panicking.
        h.manager.reconnect();
    }

    #[tokio::test(start_paused = true)]
    async fn test_identity_publisher_drop_tears_down() {
        let mut h = harness(vec![true]);
        login(&h, "user-1");
        wait_for_phase(&h.manager, Phase::Connected).await;
        let mut far = h.far_rx.recv().await.expect("far end delivered");

        drop(h.identity);

        wait_for_phase(&h.manager, Phase::Idle).await;
        assert!(h.manager.current_session().is_none());
        wait_far_closed(&mut far).await;
    }
}
