//! # Task abstractions.
//!
//! - [`Task`] one pollable unit of work (async, cancelable)
//! - [`TaskFn`] closure-backed task
//! - [`TaskRef`] shared handle (`Arc<dyn Task>`)
//! - [`TaskSpec`] task plus polling interval

mod spec;
mod task;
mod task_fn;

pub use spec::TaskSpec;
pub use task::{Task, TaskRef};
pub use task_fn::TaskFn;
