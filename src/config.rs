//! Manager configuration and builder.
//!
//! Provides a fluent API for configuring the realtime endpoint, backoff
//! policy, liveness probe, and the transport-level safety net declared at
//! connection-open time.
//!
//! # Example
//!
//! ```
//! use storefront_realtime::RealtimeConfig;
//!
//! # fn example() -> storefront_realtime::Result<()> {
//! let config = RealtimeConfig::builder()
//!     .endpoint("wss://rt.shop.example/live")
//!     .credential_key("access_token")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::backoff::BackoffPolicy;
use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default storage key for the bearer credential.
const DEFAULT_CREDENTIAL_KEY: &str = "access_token";

/// Default backoff base delay (1s).
const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Default backoff cap (30s).
const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Default budget of automatic reconnect attempts.
const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default liveness probe interval (25s).
const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(25);

/// Default handshake acknowledgment timeout (10s).
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default transport-level reconnect attempts declared at open time.
const DEFAULT_TRANSPORT_RETRIES: u32 = 3;

/// Default transport-level reconnect delay declared at open time (2s).
const DEFAULT_TRANSPORT_RETRY_DELAY: Duration = Duration::from_secs(2);

// ============================================================================
// RealtimeConfig
// ============================================================================

/// Validated configuration for a [`ConnectionManager`].
///
/// Built via [`RealtimeConfig::builder()`].
///
/// [`ConnectionManager`]: crate::manager::ConnectionManager
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// WebSocket endpoint (`ws`/`wss` only; no fallback negotiation).
    pub endpoint: Url,
    /// Storage key the bearer credential is read under on every attempt.
    pub credential_key: String,
    /// Backoff schedule for automatic reconnect attempts.
    pub backoff: BackoffPolicy,
    /// Budget of automatic reconnect attempts before entering `Failed`.
    pub max_retries: u32,
    /// Interval between liveness probe pings while connected.
    pub probe_interval: Duration,
    /// Maximum time to wait for the handshake acknowledgment.
    pub handshake_timeout: Duration,
    /// Transport-level reconnect attempts, declared to the endpoint at
    /// open time. A secondary safety net beneath the manager's own policy.
    pub transport_retries: u32,
    /// Transport-level reconnect delay, declared alongside
    /// [`transport_retries`](Self::transport_retries).
    pub transport_retry_delay: Duration,
}

impl RealtimeConfig {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> RealtimeConfigBuilder {
        RealtimeConfigBuilder::new()
    }
}

// ============================================================================
// RealtimeConfigBuilder
// ============================================================================

/// Builder for [`RealtimeConfig`].
///
/// Only the endpoint is required; everything else has reference defaults
/// (base 1s, cap 30s, 5 automatic attempts, 25s probe interval).
#[derive(Debug, Default, Clone)]
pub struct RealtimeConfigBuilder {
    /// Endpoint URL, unparsed until `build()`.
    endpoint: Option<String>,
    /// Credential storage key override.
    credential_key: Option<String>,
    /// Backoff base override.
    backoff_base: Option<Duration>,
    /// Backoff cap override.
    backoff_cap: Option<Duration>,
    /// Retry budget override.
    max_retries: Option<u32>,
    /// Probe interval override.
    probe_interval: Option<Duration>,
    /// Handshake timeout override.
    handshake_timeout: Option<Duration>,
    /// Transport retry count override.
    transport_retries: Option<u32>,
    /// Transport retry delay override.
    transport_retry_delay: Option<Duration>,
}

impl RealtimeConfigBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the realtime endpoint URL (`ws://` or `wss://`).
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Sets the storage key the bearer credential is read under.
    #[inline]
    #[must_use]
    pub fn credential_key(mut self, key: impl Into<String>) -> Self {
        self.credential_key = Some(key.into());
        self
    }

    /// Sets the backoff base delay (delay before the first automatic attempt).
    #[inline]
    #[must_use]
    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = Some(base);
        self
    }

    /// Sets the backoff delay cap.
    #[inline]
    #[must_use]
    pub fn backoff_cap(mut self, cap: Duration) -> Self {
        self.backoff_cap = Some(cap);
        self
    }

    /// Sets the budget of automatic reconnect attempts.
    ///
    /// Zero is permitted and means manual-only recovery.
    #[inline]
    #[must_use]
    pub fn max_retries(mut self, max: u32) -> Self {
        self.max_retries = Some(max);
        self
    }

    /// Sets the liveness probe interval.
    #[inline]
    #[must_use]
    pub fn probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = Some(interval);
        self
    }

    /// Sets the handshake acknowledgment timeout.
    #[inline]
    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    /// Sets the transport-level reconnect attempt count declared at open time.
    #[inline]
    #[must_use]
    pub fn transport_retries(mut self, retries: u32) -> Self {
        self.transport_retries = Some(retries);
        self
    }

    /// Sets the transport-level reconnect delay declared at open time.
    #[inline]
    #[must_use]
    pub fn transport_retry_delay(mut self, delay: Duration) -> Self {
        self.transport_retry_delay = Some(delay);
        self
    }

    /// Builds the configuration with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the endpoint is not set, or a duration/key
    ///   override is degenerate (zero durations, empty key)
    /// - [`Error::InvalidEndpoint`] if the endpoint does not parse or is
    ///   not a `ws`/`wss` URL
    pub fn build(self) -> Result<RealtimeConfig> {
        let endpoint = self.validate_endpoint()?;

        let credential_key = self
            .credential_key
            .unwrap_or_else(|| DEFAULT_CREDENTIAL_KEY.to_string());
        if credential_key.is_empty() {
            return Err(Error::config("Credential key must not be empty"));
        }

        let base = self.backoff_base.unwrap_or(DEFAULT_BACKOFF_BASE);
        let cap = self.backoff_cap.unwrap_or(DEFAULT_BACKOFF_CAP);
        if base.is_zero() {
            return Err(Error::config("Backoff base must be non-zero"));
        }
        if cap < base {
            return Err(Error::config(
                "Backoff cap must be at least the backoff base",
            ));
        }

        let probe_interval = self.probe_interval.unwrap_or(DEFAULT_PROBE_INTERVAL);
        if probe_interval.is_zero() {
            return Err(Error::config("Probe interval must be non-zero"));
        }

        let handshake_timeout = self.handshake_timeout.unwrap_or(DEFAULT_HANDSHAKE_TIMEOUT);
        if handshake_timeout.is_zero() {
            return Err(Error::config("Handshake timeout must be non-zero"));
        }

        Ok(RealtimeConfig {
            endpoint,
            credential_key,
            backoff: BackoffPolicy::new(base, cap),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            probe_interval,
            handshake_timeout,
            transport_retries: self.transport_retries.unwrap_or(DEFAULT_TRANSPORT_RETRIES),
            transport_retry_delay: self
                .transport_retry_delay
                .unwrap_or(DEFAULT_TRANSPORT_RETRY_DELAY),
        })
    }
}

// ============================================================================
// Validation
// ============================================================================

impl RealtimeConfigBuilder {
    /// Validates the endpoint configuration.
    fn validate_endpoint(&self) -> Result<Url> {
        let raw = self.endpoint.clone().ok_or_else(|| {
            Error::config(
                "Realtime endpoint is required. Use .endpoint() to set it.\n\
                 Example: RealtimeConfig::builder().endpoint(\"wss://rt.shop.example/live\")",
            )
        })?;

        let url = Url::parse(&raw).map_err(|e| Error::invalid_endpoint(&raw, e.to_string()))?;

        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(Error::invalid_endpoint(
                &raw,
                format!("unsupported scheme '{other}', expected ws or wss"),
            )),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
