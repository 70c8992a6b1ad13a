//! # iq-agent
//!
//! A host-resident agent that reports vitals and error-level journal entries
//! to a management service and runs the shell commands that service queues
//! for this host.
//!
//! The core is a small supervisor: configuration becomes a set of
//! independently scheduled, authenticated tasks which run for the lifetime of
//! the process, survive each other's failures, and stop together.
//!
//! ## Architecture
//! ```text
//!   agent.toml ──► Configuration ──► Agent::builder(..).build()
//!                                       │
//!              ┌────────────────────────┼────────────────────────┐
//!              ▼                        ▼                        ▼
//!       SecurityContext          TaskDescriptor ×N        SupervisorConfig
//!              └──────────► ServiceFactory ◄┘                    │
//!                                 │                              │
//!                                 ▼                              ▼
//!                       Vec<TaskSpec{task, interval}> ──► Supervisor::run
//!                                                                │
//!          ┌─────────────────────────────┬───────────────────────┤
//!          ▼                             ▼                       ▼
//!   ┌──────────────┐             ┌──────────────┐        ┌──────────────┐
//!   │  TaskActor   │             │  TaskActor   │        │  TaskActor   │
//!   │   vitals     │             │   journald   │        │    shell     │
//!   └──────┬───────┘             └──────┬───────┘        └──────┬───────┘
//!          │  run_once → sleep(interval) → check running flag   │
//!          └──────────────── publish(Event) ────────────────────┘
//!                                 ▼
//!                     Bus ──► AliveTracker, SubscriberSet ──► LogWriter
//! ```
//!
//! ### One runner
//! ```text
//! while running {
//!   ├─► CycleStarting
//!   ├─► task.run(child token)  ── Ok ─► CycleCompleted
//!   │                          └─ Err ─► CycleFailed (logged, no retry)
//!   ├─► CycleScheduled
//!   └─► sleep(interval)
//! }
//! ```
//!
//! ## Example
//! ```rust
//! use iq_agent::{Agent, Configuration};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Configuration::from_toml_str(
//!         r#"
//!         [agent]
//!         access_token = "token"
//!         client_id = "host-01"
//!         client_secret = "c2VjcmV0"
//!
//!         [agent.monitors.vitals]
//!         enabled = false
//!         url = "https://iq.example/api/vitals/"
//!         "#,
//!     )?;
//!
//!     let agent = Agent::builder(&cfg).handle_signals(false).build()?;
//!     assert!(agent.task_names().is_empty());
//!
//!     // Nothing is enabled, so every runner has already exited.
//!     agent.run().await?;
//!     Ok(())
//! }
//! ```

mod agent;
pub mod config;
mod core;
mod error;
mod events;
pub mod logging;
mod policies;
mod security;
pub mod services;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use agent::{Agent, AgentBuilder};
pub use config::{ConfigValue, Configuration};
pub use core::{AliveTracker, Supervisor, SupervisorBuilder, SupervisorConfig};
pub use error::{AgentError, ConfigError, RuntimeError, SecurityError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffPolicy, JitterPolicy, RetryPolicy};
pub use security::{PayloadSigner, SecurityContext};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use tasks::{Task, TaskFn, TaskRef, TaskSpec};
