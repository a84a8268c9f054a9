//! Builder for [`ConnectionManager`].

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use crate::config::RealtimeConfig;
use crate::credentials::CredentialStore;
use crate::error::{Error, Result};
use crate::identity::IdentityWatch;
use crate::transport::{Connector, WsConnector};

use super::core::ConnectionManager;

// ============================================================================
// ManagerBuilder
// ============================================================================

/// Builder for [`ConnectionManager`].
///
/// Requires a validated [`RealtimeConfig`], a credential store, and the
/// identity watch. A custom [`Connector`] is optional; the real WebSocket
/// connector is used when none is supplied.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use storefront_realtime::{
///     ConnectionManager, RealtimeConfig, SessionCredentials, identity_channel,
/// };
///
/// # fn example() -> storefront_realtime::Result<()> {
/// let config = RealtimeConfig::builder()
///     .endpoint("wss://rt.shop.example/live")
///     .build()?;
/// let (_identity_tx, identity_rx) = identity_channel();
///
/// let manager = ConnectionManager::builder()
///     .config(config)
///     .credentials(Arc::new(SessionCredentials::new()))
///     .identity(identity_rx)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ManagerBuilder {
    /// Validated manager configuration.
    config: Option<RealtimeConfig>,
    /// Credential source, re-read on every attempt.
    credentials: Option<Arc<dyn CredentialStore>>,
    /// Identity signal receiver.
    identity: Option<IdentityWatch>,
    /// Transport connector override.
    connector: Option<Arc<dyn Connector>>,
}

impl ManagerBuilder {
    /// Creates a new builder with nothing configured.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the manager configuration.
    #[inline]
    #[must_use]
    pub fn config(mut self, config: RealtimeConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the credential store the bearer token is read from.
    #[inline]
    #[must_use]
    pub fn credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sets the identity signal the manager reacts to.
    #[inline]
    #[must_use]
    pub fn identity(mut self, identity: IdentityWatch) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Overrides the transport connector.
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Builds the manager and spawns its supervisor task.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the configuration, credential store, or
    /// identity watch is missing.
    pub fn build(self) -> Result<ConnectionManager> {
        let config = self
            .config
            .ok_or_else(|| Error::config("Manager configuration is required. Use .config()"))?;
        let credentials = self
            .credentials
            .ok_or_else(|| Error::config("Credential store is required. Use .credentials()"))?;
        let identity = self
            .identity
            .ok_or_else(|| Error::config("Identity watch is required. Use .identity()"))?;

        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WsConnector::new()));

        Ok(ConnectionManager::spawn(
            config,
            credentials,
            identity,
            connector,
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================
