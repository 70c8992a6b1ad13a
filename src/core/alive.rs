//! # Runner liveness tracker.
//!
//! Keeps the set of task runners that have started and not yet stopped, so
//! that a shutdown which overruns its grace period can name the culprits.
//!
//! ```text
//! Bus ──► supervisor listener ──► AliveTracker::update(&Event)
//!                                        │
//!                                        ▼
//!                          HashMap<task, {last_seq, alive}>
//! ```
//!
//! ## Rules
//! - `ActorStarted` marks a runner alive; `ActorStopped` / `ActorDead` mark it gone.
//! - Other events only advance the per-task sequence number.
//! - Events with `seq <= last_seq` are stale and ignored.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::events::{Event, EventKind};

#[derive(Debug, Clone, Copy)]
struct RunnerState {
    last_seq: u64,
    alive: bool,
}

/// Thread-safe set of alive runners.
#[derive(Default)]
pub struct AliveTracker {
    state: RwLock<HashMap<String, RunnerState>>,
}

impl AliveTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `ev` if it is newer than the last event seen for its task.
    ///
    /// Returns `true` when the alive status was set by this event.
    pub async fn update(&self, ev: &Event) -> bool {
        let Some(name) = ev.task.as_deref() else {
            return false;
        };
        if ev.is_subscriber_event() {
            return false;
        }

        let mut state = self.state.write().await;
        let entry = state.entry(name.to_string()).or_insert(RunnerState {
            last_seq: 0,
            alive: false,
        });
        if ev.seq <= entry.last_seq {
            return false;
        }
        entry.last_seq = ev.seq;

        match ev.kind {
            EventKind::ActorStarted => {
                entry.alive = true;
                true
            }
            EventKind::ActorStopped | EventKind::ActorDead => {
                entry.alive = false;
                true
            }
            _ => false,
        }
    }

    /// Sorted names of runners currently alive.
    pub async fn snapshot(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut alive: Vec<String> = state
            .iter()
            .filter(|(_, s)| s.alive)
            .map(|(name, _)| name.clone())
            .collect();
        alive.sort_unstable();
        alive
    }

    pub async fn is_alive(&self, name: &str) -> bool {
        self.state
            .read()
            .await
            .get(name)
            .is_some_and(|s| s.alive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracks_start_and_stop() {
        let tracker = AliveTracker::new();
        let started = Event::new(EventKind::ActorStarted).with_task("vitals");
        let cycle = Event::new(EventKind::CycleCompleted).with_task("vitals");
        let stopped = Event::new(EventKind::ActorStopped).with_task("vitals");

        assert!(tracker.update(&started).await);
        assert!(!tracker.update(&cycle).await);
        assert!(tracker.is_alive("vitals").await);
        assert_eq!(tracker.snapshot().await, vec!["vitals".to_string()]);

        assert!(tracker.update(&stopped).await);
        assert!(!tracker.is_alive("vitals").await);
        assert!(tracker.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn stale_events_are_ignored() {
        let tracker = AliveTracker::new();
        let started = Event::new(EventKind::ActorStarted).with_task("shell");
        let dead = Event::new(EventKind::ActorDead).with_task("shell");

        assert!(tracker.update(&dead).await);
        assert!(!tracker.update(&started).await);
        assert!(!tracker.is_alive("shell").await);
    }
}
