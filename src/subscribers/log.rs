//! # Logging subscriber.
//!
//! [`LogWriter`] turns runtime events into `tracing` records so every cycle,
//! failure and shutdown milestone ends up in the agent log.
//!
//! ## Levels
//! ```text
//! CycleFailed, ActorDead, GraceExceeded, SubscriberPanicked  → error
//! SubscriberOverflow                                         → warn
//! ActorStarted, ActorStopped, ShutdownRequested, AllStopped  → info
//! CycleStarting, CycleCompleted, CycleScheduled              → debug
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Forwards runtime events to `tracing`.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        let cycle = e.cycle.unwrap_or(0);

        match e.kind {
            EventKind::CycleStarting => debug!(task, cycle, "cycle starting"),
            EventKind::CycleCompleted => debug!(task, cycle, "cycle completed"),
            EventKind::CycleScheduled => {
                debug!(task, cycle, delay_ms = e.delay_ms.unwrap_or(0), "next cycle scheduled")
            }
            EventKind::CycleFailed => error!(task, cycle, error = reason, "cycle failed"),
            EventKind::ActorStarted => {
                info!(task, interval_ms = e.delay_ms.unwrap_or(0), "task runner started")
            }
            EventKind::ActorStopped => info!(task, cycles = cycle, "task runner stopped"),
            EventKind::ActorDead => error!(task, error = reason, "task runner died"),
            EventKind::ShutdownRequested => info!("shutdown requested"),
            EventKind::AllStopped => info!("all task runners stopped"),
            EventKind::GraceExceeded => error!(stuck = reason, "shutdown grace period exceeded"),
            EventKind::SubscriberOverflow => {
                warn!(subscriber = task, reason, "subscriber dropped an event")
            }
            EventKind::SubscriberPanicked => {
                error!(subscriber = task, panic = reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
