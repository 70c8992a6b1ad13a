//! Concrete services run by the agent.
//!
//! - [`VitalsMonitor`] posts a host snapshot;
//! - [`JournaldMonitor`] forwards new error-level journal entries;
//! - [`ShellExecutor`] runs remote-issued commands and replies with results;
//! - [`ServiceFactory`] builds them from configuration.

mod factory;
mod http;
mod journald;
pub mod models;
mod shell;
mod vitals;

pub use factory::{HttpServiceFactory, ServiceFactory};
pub use http::{ServiceClient, SignedPayload, expect_status};
pub use journald::JournaldMonitor;
pub use shell::{ShellExecutor, execute};
pub use vitals::{VitalsMonitor, collect_packages, collect_vitals, human_size};
