//! Process-wide `tracing` setup.
//!
//! `RUST_LOG`, when set, wins over `agent.logging.level`. Output goes to stderr
//! unless `agent.logging.file` names a file to append to (no ANSI colors there).

use std::fs::OpenOptions;
use std::io;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::config::{LogFormat, LoggingSettings};
use crate::error::AgentError;

/// Installs the global subscriber.
///
/// Fails instead of panicking when a global subscriber already exists.
pub fn init(settings: &LoggingSettings) -> Result<(), AgentError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.level).map_err(|e| AgentError::InvalidSetting {
            key: "agent.logging.level".to_string(),
            reason: e.to_string(),
        })?,
    };

    let (writer, ansi) = match &settings.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| AgentError::Logging {
                    reason: format!("cannot open {}: {e}", path.display()),
                })?;
            (BoxMakeWriter::new(Arc::new(file)), false)
        }
        None => (BoxMakeWriter::new(io::stderr), true),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(false);

    let installed = match settings.format {
        LogFormat::Full => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| AgentError::Logging {
        reason: e.to_string(),
    })
}
