//! Agent configuration.
//!
//! - [`Configuration`] dot-path addressed store loaded from TOML;
//! - [`ConfigValue`] tagged node type with explicit coercions;
//! - [`TaskDescriptor`], [`Credentials`], [`LoggingSettings`] typed views over `agent.*`.

mod agent;
mod store;
mod value;

pub use agent::{
    Credentials, DEFAULT_INTERVAL_SECS, DEFAULT_RETRIES, DEFAULT_TIMEOUT_SECS, LogFormat,
    LoggingSettings, ServiceKind, ServiceParams, TaskDescriptor,
};
pub(crate) use agent::{read_count, read_secs};
pub use store::Configuration;
pub use value::{ConfigValue, Table};
