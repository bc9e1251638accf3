//! Client configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::heartbeat::{HeartBeat, HeartBeatTolerance};

/// Session-level configuration. Plain data; construct with
/// `StompConfig::default()` and adjust with the builder-style setters.
#[derive(Debug, Clone)]
pub struct StompConfig {
    /// Heart-beat requested in the CONNECT frame. Defaults to disabled.
    pub heart_beat: HeartBeat,
    /// Margins applied to the negotiated heart-beat periods.
    pub heart_beat_tolerance: HeartBeatTolerance,
    /// How long to wait for the CONNECTED frame.
    pub connection_timeout: Duration,
    /// How long a receipt-tracked send waits for its RECEIPT frame.
    pub receipt_timeout: Duration,
    /// How long a graceful disconnect waits for the DISCONNECT receipt.
    /// Expiry here is tolerated, not an error.
    pub disconnect_timeout: Duration,
    /// Attach a `receipt` header to every send and await the RECEIPT.
    pub auto_receipt: bool,
    /// Send DISCONNECT with a receipt before closing the transport.
    pub graceful_disconnect: bool,
    /// Open the handshake with the STOMP command instead of CONNECT
    /// (STOMP 1.1+ servers only).
    pub connect_with_stomp_command: bool,
    /// Virtual host for the `host` header (sent on 1.1+ handshakes).
    pub host: Option<String>,
    pub login: Option<String>,
    pub passcode: Option<String>,
    /// Insert `content-length` automatically when a body is present.
    pub auto_content_length: bool,
}

impl Default for StompConfig {
    fn default() -> Self {
        Self {
            heart_beat: HeartBeat::NONE,
            heart_beat_tolerance: HeartBeatTolerance::default(),
            connection_timeout: Duration::from_secs(15),
            receipt_timeout: Duration::from_secs(15),
            disconnect_timeout: Duration::from_millis(200),
            auto_receipt: false,
            graceful_disconnect: true,
            connect_with_stomp_command: false,
            host: None,
            login: None,
            passcode: None,
            auto_content_length: true,
        }
    }
}

impl StompConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn heart_beat(mut self, heart_beat: HeartBeat) -> Self {
        self.heart_beat = heart_beat;
        self
    }

    pub fn heart_beat_tolerance(mut self, tolerance: HeartBeatTolerance) -> Self {
        self.heart_beat_tolerance = tolerance;
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    pub fn disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout = timeout;
        self
    }

    pub fn auto_receipt(mut self, enabled: bool) -> Self {
        self.auto_receipt = enabled;
        self
    }

    pub fn graceful_disconnect(mut self, enabled: bool) -> Self {
        self.graceful_disconnect = enabled;
        self
    }

    pub fn connect_with_stomp_command(mut self, enabled: bool) -> Self {
        self.connect_with_stomp_command = enabled;
        self
    }

    pub fn auto_content_length(mut self, enabled: bool) -> Self {
        self.auto_content_length = enabled;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn credentials(mut self, login: impl Into<String>, passcode: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self.passcode = Some(passcode.into());
        self
    }
}

/// Delay policy between reconnection attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryDelayStrategy {
    /// Same delay before every attempt.
    Fixed(Duration),
    /// `initial * factor^attempt`, attempt counting from 0.
    ExponentialBackoff { initial: Duration, factor: f64 },
}

impl RetryDelayStrategy {
    /// Delay before attempt number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            RetryDelayStrategy::Fixed(d) => *d,
            RetryDelayStrategy::ExponentialBackoff { initial, factor } => {
                initial.mul_f64(factor.powi(attempt as i32))
            }
        }
    }
}

/// Hook run after each successful reconnect, e.g. to resubscribe.
pub type AfterReconnectHook = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Configuration for [`crate::reconnect::ReconnectingConnector`].
#[derive(Clone)]
pub struct ReconnectConfig {
    /// Attempts per outage before giving up.
    pub max_attempts: u32,
    pub delay_strategy: RetryDelayStrategy,
    pub after_reconnect: Option<AfterReconnectHook>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_strategy: RetryDelayStrategy::ExponentialBackoff {
                initial: Duration::from_millis(500),
                factor: 2.0,
            },
            after_reconnect: None,
        }
    }
}

impl ReconnectConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn delay_strategy(mut self, strategy: RetryDelayStrategy) -> Self {
        self.delay_strategy = strategy;
        self
    }

    pub fn after_reconnect<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.after_reconnect = Some(Arc::new(move || Box::pin(hook())));
        self
    }
}

impl fmt::Debug for ReconnectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectConfig")
            .field("max_attempts", &self.max_attempts)
            .field("delay_strategy", &self.delay_strategy)
            .field("after_reconnect", &self.after_reconnect.is_some())
            .finish()
    }
}
