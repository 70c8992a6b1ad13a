//! Error types used by the agent runtime, its configuration and its tasks.
//!
//! - [`ConfigError`] loading, addressing and coercing configuration values.
//! - [`SecurityError`] credential validation and request signing.
//! - [`AgentError`] fatal startup errors; the process exits before any task runs.
//! - [`RuntimeError`] errors raised by the supervisor itself during shutdown.
//! - [`TaskError`] errors raised by one unit of work; contained by the task runner.
//!
//! Every enum provides `as_label` for stable snake_case labels in logs.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced by the configuration store.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file is missing or unreadable.
    #[error("cannot read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration document is not valid TOML.
    #[error("malformed configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The document contains a value kind the store does not model (arrays).
    #[error("unsupported {kind} value at `{key}`")]
    Unsupported { key: String, kind: &'static str },

    /// A present value cannot be coerced to the requested type.
    #[error("value at `{key}` is not a valid {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    /// A dot-path is empty or contains an empty segment.
    #[error("invalid configuration key `{key}`")]
    InvalidPath { key: String },

    /// The document could not be rendered back to TOML.
    #[error("cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The configuration file could not be written.
    #[error("cannot write configuration file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "config_read",
            ConfigError::Parse { .. } => "config_parse",
            ConfigError::Unsupported { .. } => "config_unsupported",
            ConfigError::TypeMismatch { .. } => "config_type_mismatch",
            ConfigError::InvalidPath { .. } => "config_invalid_path",
            ConfigError::Serialize(_) => "config_serialize",
            ConfigError::Write { .. } => "config_write",
        }
    }
}

/// # Errors produced while building or using the security context.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SecurityError {
    /// One of the three required credentials is empty.
    #[error("missing credential: {field} is empty")]
    MissingCredential { field: &'static str },

    /// The client secret is not a base64 encoded PEM private key.
    #[error("invalid client secret: {reason}")]
    InvalidSecret { reason: String },
}

impl SecurityError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SecurityError::MissingCredential { .. } => "security_missing_credential",
            SecurityError::InvalidSecret { .. } => "security_invalid_secret",
        }
    }
}

/// # Fatal startup errors.
///
/// Any of these aborts the agent before a single task is spawned.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Security(#[from] SecurityError),

    /// An enabled service has no `url` (or an empty one).
    #[error("service `{service}` is enabled but `{key}` is missing or empty")]
    MissingUrl { service: &'static str, key: String },

    /// A setting is present but outside its accepted range or vocabulary.
    #[error("invalid setting `{key}`: {reason}")]
    InvalidSetting { key: String, reason: String },

    /// The logging sink could not be installed.
    #[error("cannot initialize logging: {reason}")]
    Logging { reason: String },

    /// A service could not be constructed.
    #[error("cannot start service `{service}`: {reason}")]
    Service { service: &'static str, reason: String },
}

impl AgentError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            AgentError::Config(e) => e.as_label(),
            AgentError::Security(e) => e.as_label(),
            AgentError::MissingUrl { .. } => "agent_missing_url",
            AgentError::InvalidSetting { .. } => "agent_invalid_setting",
            AgentError::Logging { .. } => "agent_logging",
            AgentError::Service { .. } => "agent_service",
        }
    }
}

/// # Errors produced by the supervisor runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some runners were still alive.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of the tasks that did not stop in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use iq_agent::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }
}

/// # Errors produced by one unit of work.
///
/// The task runner records these and carries on with its normal cadence.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// A request or external command outlived its time limit.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// The unit of work failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The unit of work observed cancellation and stopped early.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Wraps any displayable error into [`TaskError::Fail`].
    pub fn fail(error: impl std::fmt::Display) -> Self {
        TaskError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use iq_agent::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
        }
    }
}

impl From<reqwest::Error> for TaskError {
    fn from(err: reqwest::Error) -> Self {
        TaskError::fail(err)
    }
}

impl From<std::io::Error> for TaskError {
    fn from(err: std::io::Error) -> Self {
        TaskError::fail(err)
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(err: serde_json::Error) -> Self {
        TaskError::fail(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_error_label_delegates_to_source() {
        let err = AgentError::from(SecurityError::MissingCredential {
            field: "client_id",
        });
        assert_eq!(err.as_label(), "security_missing_credential");
        assert_eq!(err.to_string(), "missing credential: client_id is empty");
    }

    #[test]
    fn missing_url_names_the_key() {
        let err = AgentError::MissingUrl {
            service: "vitals",
            key: "agent.monitors.vitals.url".into(),
        };
        assert!(err.to_string().contains("agent.monitors.vitals.url"));
    }

    #[test]
    fn fail_wraps_display() {
        let err = TaskError::fail("connection refused");
        assert_eq!(err.to_string(), "execution failed: connection refused");
        assert_eq!(err.as_label(), "task_failed");
    }
}
