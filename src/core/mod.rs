//! Runtime core: orchestration and lifecycle.
//!
//! - [`runner`]: one cycle of a task with event publishing;
//! - [`actor`]: the fixed-interval loop around one task;
//! - [`supervisor`]: spawns actors, handles shutdown and grace;
//! - [`alive`]: tracks which actors are alive;
//! - [`shutdown`]: OS termination signals;
//! - [`config`]: supervisor runtime settings.

mod actor;
mod alive;
mod builder;
mod config;
mod runner;
mod shutdown;
mod supervisor;

pub use alive::AliveTracker;
pub use builder::SupervisorBuilder;
pub use config::SupervisorConfig;
pub use supervisor::Supervisor;
