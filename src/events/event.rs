//! # Runtime events emitted by the supervisor and task runners.
//!
//! The [`EventKind`] enum classifies events across three groups:
//! - **Cycle events**: one unit of work (starting, completed, failed, next cycle scheduled)
//! - **Runner events**: a runner's lifetime (started, stopped, dead)
//! - **Shutdown events**: supervisor-level milestones
//!
//! The [`Event`] struct carries optional metadata (task name, cycle number,
//! reason, delay).
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use iq_agent::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::CycleFailed)
//!     .with_task("vitals")
//!     .with_reason("connection refused")
//!     .with_cycle(3);
//!
//! assert_eq!(ev.kind, EventKind::CycleFailed);
//! assert_eq!(ev.task.as_deref(), Some("vitals"));
//! assert_eq!(ev.cycle, Some(3));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `task` (subscriber name), `reason` (panic info).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `task` (subscriber name), `reason`.
    SubscriberOverflow,

    // === Shutdown events ===
    /// Shutdown requested (OS signal or explicit stop).
    ShutdownRequested,

    /// All runners stopped (within the grace period, if one is configured).
    AllStopped,

    /// Grace period exceeded; some runners did not stop in time.
    ///
    /// Sets: `reason` (names of stuck tasks).
    GraceExceeded,

    // === Runner events ===
    /// A runner was spawned for a task.
    ///
    /// Sets: `task`, `delay_ms` (the task's interval).
    ActorStarted,

    /// A runner observed the shutdown signal and exited.
    ///
    /// Sets: `task`, `cycle` (number of cycles run).
    ActorStopped,

    /// A runner terminated abnormally (panic).
    ///
    /// Sets: `task` when known, `reason`.
    ActorDead,

    // === Cycle events ===
    /// A unit of work is starting.
    ///
    /// Sets: `task`, `cycle` (1-based, per runner).
    CycleStarting,

    /// A unit of work finished successfully.
    ///
    /// Sets: `task`, `cycle`.
    CycleCompleted,

    /// A unit of work failed. The runner carries on.
    ///
    /// Sets: `task`, `cycle`, `reason`.
    CycleFailed,

    /// The next cycle was scheduled after the fixed interval.
    ///
    /// Sets: `task`, `cycle` (the cycle just finished), `delay_ms`.
    CycleScheduled,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the task, if applicable.
    pub task: Option<Arc<str>>,
    /// Cycle number (starting from 1).
    pub cycle: Option<u64>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            cycle: None,
            reason: None,
            delay_ms: None,
        }
    }

    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    #[inline]
    pub fn with_cycle(mut self, n: u64) -> Self {
        self.cycle = Some(n);
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    /// True for events raised by subscriber workers themselves.
    #[inline]
    pub fn is_subscriber_event(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::CycleStarting);
        let b = Event::new(EventKind::CycleCompleted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn delay_is_stored_in_millis() {
        let ev = Event::new(EventKind::CycleScheduled).with_delay(Duration::from_secs(60));
        assert_eq!(ev.delay_ms, Some(60_000));
    }
}
