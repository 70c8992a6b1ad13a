//! # One cycle of a task.
//!
//! [`run_once`] invokes [`Task::run`] once with a child of the runner's token
//! and reports the outcome on the [`Bus`].
//!
//! ```text
//! CycleStarting ──► task.run(child) ──┬─ Ok(())          ──► CycleCompleted
//!                                     ├─ Err(Canceled)   ──► (nothing, graceful)
//!                                     └─ Err(e)          ──► CycleFailed{reason=e}
//! ```
//!
//! ## Rules
//! - Errors are reported, never retried here; the runner keeps its cadence.
//! - The child token only fires when the runner's token is cancelled, which
//!   happens for interruptible shutdown.

use tokio_util::sync::CancellationToken;

use crate::{
    error::TaskError,
    events::{Bus, Event, EventKind},
    tasks::Task,
};

/// Runs cycle number `cycle` of `task`, publishing its events to `bus`.
pub async fn run_once<T: Task + ?Sized>(
    task: &T,
    parent: &CancellationToken,
    cycle: u64,
    bus: &Bus,
) -> Result<(), TaskError> {
    let child = parent.child_token();
    bus.publish(
        Event::new(EventKind::CycleStarting)
            .with_task(task.name())
            .with_cycle(cycle),
    );

    let res = task.run(child).await;
    match &res {
        Ok(()) => bus.publish(
            Event::new(EventKind::CycleCompleted)
                .with_task(task.name())
                .with_cycle(cycle),
        ),
        Err(TaskError::Canceled) => {}
        Err(e) => bus.publish(
            Event::new(EventKind::CycleFailed)
                .with_task(task.name())
                .with_cycle(cycle)
                .with_reason(e.to_string()),
        ),
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskFn;

    #[tokio::test]
    async fn failure_is_published_with_reason() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let task = TaskFn::new("vitals", |_ctx: CancellationToken| async {
            Err::<(), _>(TaskError::fail("HTTP 500"))
        });

        let res = run_once(&task, &CancellationToken::new(), 4, &bus).await;
        assert!(res.is_err());

        let starting = rx.recv().await.unwrap();
        assert_eq!(starting.kind, EventKind::CycleStarting);
        let failed = rx.recv().await.unwrap();
        assert_eq!(failed.kind, EventKind::CycleFailed);
        assert_eq!(failed.cycle, Some(4));
        assert_eq!(failed.reason.as_deref(), Some("execution failed: HTTP 500"));
    }

    #[tokio::test]
    async fn cancellation_is_not_a_failure() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let parent = CancellationToken::new();
        parent.cancel();
        let task = TaskFn::new("shell", |ctx: CancellationToken| async move {
            ctx.cancelled().await;
            Err::<(), _>(TaskError::Canceled)
        });

        let res = run_once(&task, &parent, 1, &bus).await;
        assert!(matches!(res, Err(TaskError::Canceled)));
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::CycleStarting);
        assert!(rx.try_recv().is_err());
    }
}
