//! # Typed views over the `agent` configuration root.
//!
//! Turns raw dot-path lookups into the descriptors the agent runs on:
//! - [`ServiceKind`] the three services and their key prefixes;
//! - [`TaskDescriptor`] per-service `enabled`/`interval`/`url` plus [`ServiceParams`];
//! - [`Credentials`] the three raw credential strings;
//! - [`LoggingSettings`] `agent.logging.*`.
//!
//! Absent optional keys fall back to defaults; present keys of the wrong kind
//! are errors. A missing `url` only matters when the service is enabled.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::store::Configuration;
use crate::error::AgentError;

/// Default seconds between two cycles of a service.
pub const DEFAULT_INTERVAL_SECS: u64 = 60;
/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
/// Default number of delivery attempts.
pub const DEFAULT_RETRIES: u32 = 3;

/// The services the agent knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Vitals,
    Journald,
    Shell,
}

impl ServiceKind {
    /// All services in startup order.
    pub const ALL: [ServiceKind; 3] = [ServiceKind::Vitals, ServiceKind::Journald, ServiceKind::Shell];

    /// Stable task name.
    pub fn name(&self) -> &'static str {
        match self {
            ServiceKind::Vitals => "vitals",
            ServiceKind::Journald => "journald",
            ServiceKind::Shell => "shell",
        }
    }

    /// Dot-path of the service's configuration table.
    pub fn prefix(&self) -> &'static str {
        match self {
            ServiceKind::Vitals => "agent.monitors.vitals",
            ServiceKind::Journald => "agent.monitors.journald",
            ServiceKind::Shell => "agent.executors.shell",
        }
    }

    /// Full key of a setting of this service.
    pub fn key(&self, setting: &str) -> String {
        format!("{}.{setting}", self.prefix())
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Service-specific parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceParams {
    Vitals {
        timeout: Duration,
    },
    Journald {
        retries: u32,
        timeout: Duration,
    },
    Shell {
        poll_timeout: Duration,
        reply_timeout: Duration,
        reply_retries: u32,
    },
}

/// Everything needed to build and schedule one enabled service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDescriptor {
    pub kind: ServiceKind,
    pub interval: Duration,
    pub url: String,
    pub params: ServiceParams,
}

impl TaskDescriptor {
    /// Reads the descriptor of `kind`.
    ///
    /// Returns `Ok(None)` when the service is disabled (or `enabled` is absent),
    /// and [`AgentError::MissingUrl`] when it is enabled without a usable URL.
    pub fn read(cfg: &Configuration, kind: ServiceKind) -> Result<Option<Self>, AgentError> {
        if !cfg.get_bool(&kind.key("enabled"))?.unwrap_or(false) {
            return Ok(None);
        }

        let url_key = kind.key("url");
        let url = cfg
            .get_str(&url_key)?
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| AgentError::MissingUrl {
                service: kind.name(),
                key: url_key.clone(),
            })?;

        let interval = read_secs(cfg, &kind.key("interval"), DEFAULT_INTERVAL_SECS)?;
        if interval.is_zero() {
            return Err(AgentError::InvalidSetting {
                key: kind.key("interval"),
                reason: "must be greater than zero".into(),
            });
        }

        let params = match kind {
            ServiceKind::Vitals => ServiceParams::Vitals {
                timeout: read_secs(cfg, &kind.key("timeout"), DEFAULT_TIMEOUT_SECS)?,
            },
            ServiceKind::Journald => ServiceParams::Journald {
                retries: read_count(cfg, &kind.key("retries"), DEFAULT_RETRIES)?,
                timeout: read_secs(cfg, &kind.key("timeout"), DEFAULT_TIMEOUT_SECS)?,
            },
            ServiceKind::Shell => ServiceParams::Shell {
                poll_timeout: read_secs(cfg, &kind.key("poll_timeout"), DEFAULT_TIMEOUT_SECS)?,
                reply_timeout: read_secs(cfg, &kind.key("reply_timeout"), DEFAULT_TIMEOUT_SECS)?,
                reply_retries: read_count(cfg, &kind.key("reply_retries"), DEFAULT_RETRIES)?,
            },
        };

        Ok(Some(Self {
            kind,
            interval,
            url,
            params,
        }))
    }

    /// Reads the descriptors of every enabled service.
    ///
    /// Fails on the first invalid service, so either all enabled services are
    /// valid or none is returned.
    pub fn read_enabled(cfg: &Configuration) -> Result<Vec<Self>, AgentError> {
        let mut out = Vec::with_capacity(ServiceKind::ALL.len());
        for kind in ServiceKind::ALL {
            if let Some(descriptor) = Self::read(cfg, kind)? {
                out.push(descriptor);
            }
        }
        Ok(out)
    }
}

/// Raw credential strings; validated by [`SecurityContext::build`](crate::SecurityContext::build).
#[derive(Clone, Default)]
pub struct Credentials {
    pub access_token: String,
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    /// Reads `agent.access_token`, `agent.client_id` and `agent.client_secret`.
    /// Absent keys read as empty strings.
    pub fn read(cfg: &Configuration) -> Result<Self, AgentError> {
        let read = |key: &str| -> Result<String, AgentError> {
            Ok(cfg.get_str(key)?.unwrap_or_default())
        };
        Ok(Self {
            access_token: read("agent.access_token")?,
            client_id: read("agent.client_id")?,
            client_secret: read("agent.client_secret")?,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Output layout of log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
    Json,
}

/// `agent.logging.*` settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Filter directive, e.g. `info` or `iq_agent=debug`.
    pub level: String,
    pub format: LogFormat,
    /// Append to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Full,
            file: None,
        }
    }
}

impl LoggingSettings {
    pub fn read(cfg: &Configuration) -> Result<Self, AgentError> {
        let defaults = Self::default();

        if let Some(encoding) = cfg.get_str("agent.logging.encoding")? {
            let normalized = encoding.trim().to_ascii_lowercase();
            if normalized != "utf-8" && normalized != "utf8" {
                return Err(AgentError::InvalidSetting {
                    key: "agent.logging.encoding".into(),
                    reason: format!("unsupported encoding `{encoding}` (only utf-8)"),
                });
            }
        }

        let format = match cfg.get_str("agent.logging.format")? {
            None => defaults.format,
            Some(f) => match f.trim().to_ascii_lowercase().as_str() {
                "full" | "text" => LogFormat::Full,
                "compact" => LogFormat::Compact,
                "json" => LogFormat::Json,
                other => {
                    return Err(AgentError::InvalidSetting {
                        key: "agent.logging.format".into(),
                        reason: format!("unknown format `{other}` (full, compact, json)"),
                    });
                }
            },
        };

        let level = cfg
            .get_str("agent.logging.level")?
            .map(|l| l.trim().to_ascii_lowercase())
            .filter(|l| !l.is_empty())
            .unwrap_or(defaults.level);

        let file = cfg
            .get_str("agent.logging.file")?
            .filter(|f| !f.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            level,
            format,
            file,
        })
    }
}

/// Reads a non-negative number of seconds.
pub(crate) fn read_secs(
    cfg: &Configuration,
    key: &str,
    default: u64,
) -> Result<Duration, AgentError> {
    match cfg.get_int(key)? {
        None => Ok(Duration::from_secs(default)),
        Some(n) => u64::try_from(n)
            .map(Duration::from_secs)
            .map_err(|_| AgentError::InvalidSetting {
                key: key.to_string(),
                reason: format!("expected a non-negative number of seconds, got {n}"),
            }),
    }
}

/// Reads a count of at least one.
pub(crate) fn read_count(cfg: &Configuration, key: &str, default: u32) -> Result<u32, AgentError> {
    match cfg.get_int(key)? {
        None => Ok(default),
        Some(n) => u32::try_from(n)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| AgentError::InvalidSetting {
                key: key.to_string(),
                reason: format!("expected a count of at least 1, got {n}"),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(text: &str) -> Configuration {
        Configuration::from_toml_str(text).unwrap()
    }

    #[test]
    fn disabled_or_absent_services_have_no_descriptor() {
        let c = cfg("[agent.monitors.vitals]\nenabled = false\n");
        assert_eq!(TaskDescriptor::read(&c, ServiceKind::Vitals).unwrap(), None);
        assert_eq!(TaskDescriptor::read(&c, ServiceKind::Shell).unwrap(), None);
    }

    #[test]
    fn enabled_service_without_url_is_fatal() {
        let c = cfg("[agent.monitors.journald]\nenabled = true\nurl = \"  \"\n");
        let err = TaskDescriptor::read(&c, ServiceKind::Journald).unwrap_err();
        assert!(matches!(err, AgentError::MissingUrl { service: "journald", .. }));
    }

    #[test]
    fn defaults_fill_absent_parameters() {
        let c = cfg("[agent.executors.shell]\nenabled = true\nurl = \"https://svc/commands/\"\n");
        let d = TaskDescriptor::read(&c, ServiceKind::Shell).unwrap().unwrap();
        assert_eq!(d.interval, Duration::from_secs(DEFAULT_INTERVAL_SECS));
        assert_eq!(
            d.params,
            ServiceParams::Shell {
                poll_timeout: Duration::from_secs(300),
                reply_timeout: Duration::from_secs(300),
                reply_retries: 3,
            }
        );
    }

    #[test]
    fn explicit_parameters_are_read() {
        let c = cfg(
            "[agent.monitors.vitals]\nenabled = true\nurl = \"https://svc/vitals\"\ninterval = 15\ntimeout = 30\n",
        );
        let d = TaskDescriptor::read(&c, ServiceKind::Vitals).unwrap().unwrap();
        assert_eq!(d.url, "https://svc/vitals");
        assert_eq!(d.interval, Duration::from_secs(15));
        assert_eq!(d.params, ServiceParams::Vitals { timeout: Duration::from_secs(30) });
    }

    #[test]
    fn zero_interval_and_zero_retries_are_rejected() {
        let c = cfg("[agent.monitors.vitals]\nenabled = true\nurl = \"u\"\ninterval = 0\n");
        assert!(matches!(
            TaskDescriptor::read(&c, ServiceKind::Vitals),
            Err(AgentError::InvalidSetting { .. })
        ));

        let c = cfg("[agent.monitors.journald]\nenabled = true\nurl = \"u\"\nretries = 0\n");
        assert!(matches!(
            TaskDescriptor::read(&c, ServiceKind::Journald),
            Err(AgentError::InvalidSetting { .. })
        ));
    }

    #[test]
    fn type_mismatch_surfaces() {
        let c = cfg("[agent.monitors.vitals]\nenabled = true\nurl = \"u\"\ninterval = \"soon\"\n");
        let err = TaskDescriptor::read(&c, ServiceKind::Vitals).unwrap_err();
        assert_eq!(err.as_label(), "config_type_mismatch");
    }

    #[test]
    fn logging_settings() {
        let s = LoggingSettings::read(&Configuration::new()).unwrap();
        assert_eq!(s, LoggingSettings::default());

        let c = cfg("[agent.logging]\nlevel = \"DEBUG\"\nformat = \"json\"\nfile = \"/var/log/iq.log\"\nencoding = \"UTF-8\"\n");
        let s = LoggingSettings::read(&c).unwrap();
        assert_eq!(s.level, "debug");
        assert_eq!(s.format, LogFormat::Json);
        assert_eq!(s.file, Some(PathBuf::from("/var/log/iq.log")));

        let c = cfg("[agent.logging]\nencoding = \"latin-1\"\n");
        assert!(LoggingSettings::read(&c).is_err());
    }

    #[test]
    fn credentials_debug_hides_secrets() {
        let c = Credentials {
            access_token: "tok".into(),
            client_id: "id".into(),
            client_secret: "sec".into(),
        };
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("tok"));
        assert!(!dbg.contains("sec"));
    }
}
