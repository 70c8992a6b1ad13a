//! # Task plus polling interval.
//!
//! [`TaskSpec`] pairs a task with the fixed interval its runner sleeps between
//! cycles. The agent builds one spec per enabled service and hands the list to
//! [`Supervisor::run`](crate::Supervisor::run).

use std::time::Duration;

use crate::tasks::task::TaskRef;

/// A task plus its polling interval.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// use iq_agent::{TaskSpec, TaskFn, TaskRef, TaskError};
///
/// let demo: TaskRef = TaskFn::arc("demo", |_ctx: CancellationToken| async move {
///     Ok::<(), TaskError>(())
/// });
///
/// let spec = TaskSpec::new(demo, Duration::from_secs(60));
/// assert_eq!(spec.name(), "demo");
/// assert_eq!(spec.interval(), Duration::from_secs(60));
/// ```
#[derive(Clone)]
pub struct TaskSpec {
    task: TaskRef,
    interval: Duration,
}

impl TaskSpec {
    pub fn new(task: TaskRef, interval: Duration) -> Self {
        Self { task, interval }
    }

    pub fn task(&self) -> &TaskRef {
        &self.task
    }

    /// Convenience: returns the task name.
    pub fn name(&self) -> &str {
        self.task.name()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns a new spec with an updated interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}
