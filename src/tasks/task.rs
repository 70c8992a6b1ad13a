//! # Pollable unit of work.
//!
//! [`Task`] is what a runner invokes once per cycle: one poll, one report, one
//! batch of commands. It neither loops nor swallows its own errors; the runner
//! owns scheduling and failure reporting. [`TaskRef`] is the shared handle
//! (`Arc<dyn Task>`) passed around the runtime.
//!
//! A task receives a [`CancellationToken`] for the current cycle. The token
//! is only cancelled when interruptible shutdown is configured, so long
//! operations (child processes, HTTP calls) should race against it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Shared handle to a task object.
pub type TaskRef = Arc<dyn Task>;

/// # Asynchronous, cancelable unit of work.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use async_trait::async_trait;
/// use iq_agent::{Task, TaskError};
///
/// struct Heartbeat;
///
/// #[async_trait]
/// impl Task for Heartbeat {
///     fn name(&self) -> &str { "heartbeat" }
///
///     async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError> {
///         if ctx.is_cancelled() {
///             return Err(TaskError::Canceled);
///         }
///         // send one heartbeat...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Returns a stable, human-readable task name.
    fn name(&self) -> &str;

    /// Performs exactly one unit of work.
    ///
    /// Returning [`TaskError::Canceled`] marks a cooperative stop and is not
    /// reported as a failure.
    async fn run(&self, ctx: CancellationToken) -> Result<(), TaskError>;
}
