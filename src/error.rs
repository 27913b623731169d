//! Error types used by the bus runtime, channels, state and config.
//!
//! - [`BusError`] errors raised by the bus runtime itself (build, startup, shutdown).
//! - [`ChannelError`] errors returned by channel handlers.
//! - [`StateError`] errors from the shared [`StateStore`](crate::StateStore).
//! - [`ConfigError`] errors from the global [`GlobalConfig`](crate::GlobalConfig).
//!
//! Every enum provides `as_label` (stable snake_case for logs/metrics).

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the bus runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BusError {
    /// Two registered channels share a name.
    #[error("duplicate channel name: {name}")]
    DuplicateChannel {
        /// The conflicting channel name.
        name: String,
    },

    /// The global config record is invalid.
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    /// The initial state record is invalid.
    #[error("invalid state: {0}")]
    State(#[from] StateError),

    /// A channel could not be initialized; startup was aborted.
    #[error("channel {channel} failed to initialize: {error}")]
    ChannelInit {
        /// Name of the failing channel.
        channel: String,
        /// Last error returned by `on_init`.
        error: ChannelError,
    },

    /// Shutdown grace period was exceeded; some channels did not stop in time.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}; forcing termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Channels whose workers had not exited.
        stuck: Vec<String>,
    },

    /// The background run task ended abnormally (panic or abort).
    #[error("bus runtime task ended abnormally: {reason}")]
    Join {
        /// Join error description.
        reason: String,
    },
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use tickbus::BusError;
    /// use std::time::Duration;
    ///
    /// let err = BusError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "bus_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::DuplicateChannel { .. } => "bus_duplicate_channel",
            BusError::Config(_) => "bus_invalid_config",
            BusError::State(_) => "bus_invalid_state",
            BusError::ChannelInit { .. } => "bus_channel_init",
            BusError::GraceExceeded { .. } => "bus_grace_exceeded",
            BusError::Join { .. } => "bus_join",
        }
    }
}

/// # Errors returned by channel handlers.
///
/// `Fail` and `Timeout` are retryable during initialization; `Fatal` detaches
/// the channel from the bus.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Handler exceeded its timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// Non-recoverable error; the channel is detached.
    #[error("fatal error (channel detached): {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Handler failed but the channel keeps receiving events.
    #[error("handler failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Handler observed cancellation and stopped early.
    #[error("context cancelled")]
    Canceled,
}

impl ChannelError {
    /// Shorthand for [`ChannelError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        ChannelError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`ChannelError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        ChannelError::Fatal {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use tickbus::ChannelError;
    /// use std::time::Duration;
    ///
    /// let err = ChannelError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "channel_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ChannelError::Timeout { .. } => "channel_timeout",
            ChannelError::Fatal { .. } => "channel_fatal",
            ChannelError::Fail { .. } => "channel_failed",
            ChannelError::Canceled => "channel_canceled",
        }
    }

    /// Indicates whether the error type is safe to retry.
    ///
    /// Returns `true` for [`ChannelError::Fail`] and [`ChannelError::Timeout`].
    ///
    /// # Example
    /// ```
    /// use tickbus::ChannelError;
    ///
    /// assert!(ChannelError::fail("boom").is_retryable());
    /// assert!(!ChannelError::fatal("nope").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChannelError::Fail { .. } | ChannelError::Timeout { .. })
    }
}

/// # Errors produced by the shared state store.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StateError {
    /// State (or a merge patch) must be a JSON object.
    #[error("state must be a JSON object, got {found}")]
    NotAnObject {
        /// JSON type that was supplied instead.
        found: &'static str,
    },

    /// `append` targeted a key that does not hold an array.
    #[error("state key {key:?} does not hold an array")]
    NotAnArray {
        /// The offending key.
        key: String,
    },

    /// Value could not be converted to or from JSON.
    #[error("state key {key:?}: {source}")]
    Serde {
        /// Key being read or written.
        key: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

impl StateError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StateError::NotAnObject { .. } => "state_not_an_object",
            StateError::NotAnArray { .. } => "state_not_an_array",
            StateError::Serde { .. } => "state_serde",
        }
    }
}

/// # Errors produced by the global config.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config must be a JSON object (or TOML table).
    #[error("config must be an object, got {found}")]
    NotAnObject {
        /// JSON type that was supplied instead.
        found: &'static str,
    },

    /// A required key is absent.
    #[error("missing config key {key:?}")]
    Missing {
        /// The missing key.
        key: String,
    },

    /// A key is present but has the wrong shape.
    #[error("invalid config key {key:?}: {source}")]
    Invalid {
        /// The offending key (`"*"` for whole-record views).
        key: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// TOML document could not be parsed.
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::NotAnObject { .. } => "config_not_an_object",
            ConfigError::Missing { .. } => "config_missing",
            ConfigError::Invalid { .. } => "config_invalid",
            ConfigError::Toml(_) => "config_toml",
        }
    }
}

/// Returns the JSON type name of a value (for error messages).
pub(crate) fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_error_labels_and_retry() {
        let t = ChannelError::Timeout {
            timeout: Duration::from_millis(5),
        };
        assert!(t.is_retryable());
        assert_eq!(ChannelError::Canceled.as_label(), "channel_canceled");
        assert!(!ChannelError::Canceled.is_retryable());
    }

    #[test]
    fn bus_error_wraps_config_error() {
        let err: BusError = ConfigError::NotAnObject { found: "array" }.into();
        assert_eq!(err.as_label(), "bus_invalid_config");
        assert!(err.to_string().contains("array"));
    }
}
