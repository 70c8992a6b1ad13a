//! # TaskActor: the fixed-interval loop around one task.
//!
//! ```text
//! ActorStarted
//! while running {
//!   ├─► run_once(cycle) ──► CycleStarting → task.run() → CycleCompleted | CycleFailed
//!   ├─► CycleScheduled{delay = interval}
//!   └─► sleep(interval)          (interruptible: select! against the runtime token)
//! }
//! ActorStopped{cycle = cycles run}
//! ```
//!
//! ## Rules
//! - Cycles run **sequentially** within one actor.
//! - The interval is slept after every cycle, successful or not; there is no
//!   immediate retry.
//! - The running flag is read once per iteration, before a cycle starts.
//! - Without interruptible shutdown, the cycle gets a token detached from the
//!   runtime token, so a stop request never cancels work in flight.

use std::time::Duration;

use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::{
    core::runner::run_once,
    error::TaskError,
    events::{Bus, Event, EventKind},
    tasks::TaskRef,
};

/// Drives one task for the lifetime of the process.
pub struct TaskActor {
    pub task: TaskRef,
    pub interval: Duration,
    pub interruptible: bool,
    pub bus: Bus,
}

impl TaskActor {
    pub fn new(task: TaskRef, interval: Duration, interruptible: bool, bus: Bus) -> Self {
        Self {
            task,
            interval,
            interruptible,
            bus,
        }
    }

    /// Runs cycles until `runtime_token` is cancelled.
    pub async fn run(self, runtime_token: CancellationToken) {
        let name = self.task.name().to_string();
        self.bus.publish(
            Event::new(EventKind::ActorStarted)
                .with_task(name.as_str())
                .with_delay(self.interval),
        );

        let cycle_parent = if self.interruptible {
            runtime_token.clone()
        } else {
            CancellationToken::new()
        };

        let mut cycle: u64 = 0;
        while !runtime_token.is_cancelled() {
            cycle += 1;
            let res = run_once(self.task.as_ref(), &cycle_parent, cycle, &self.bus).await;
            if matches!(res, Err(TaskError::Canceled)) && runtime_token.is_cancelled() {
                break;
            }

            self.bus.publish(
                Event::new(EventKind::CycleScheduled)
                    .with_task(name.as_str())
                    .with_cycle(cycle)
                    .with_delay(self.interval),
            );

            if self.interruptible {
                select! {
                    _ = time::sleep(self.interval) => {}
                    _ = runtime_token.cancelled() => break,
                }
            } else {
                time::sleep(self.interval).await;
            }
        }

        self.bus.publish(
            Event::new(EventKind::ActorStopped)
                .with_task(name)
                .with_cycle(cycle),
        );
    }
}
