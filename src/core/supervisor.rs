//! # Supervisor: runs one actor per task and shuts them down together.
//!
//! The [`Supervisor`] owns the event bus, the subscribers, the liveness
//! tracker and the runtime token (the process-wide running flag).
//!
//! ```text
//! Supervisor::run(Vec<TaskSpec>)
//!   ├─► subscriber_listener():  Bus ──► AliveTracker::update + SubscriberSet::emit
//!   ├─► spawn_task_actors():    one TaskActor per spec into a JoinSet
//!   │                           (child of the runtime token)
//!   └─► drive_shutdown():
//!         select! {
//!           OS signal           ─► stop()
//!           stop() from caller  ─► ShutdownRequested, runtime_token.cancel()
//!           every actor exited  ─► AllStopped
//!         }
//!         then wait_all_with_grace(cfg.grace):
//!           ├─ all joined   → AllStopped
//!           └─ grace spent  → GraceExceeded (AliveTracker::snapshot() names the stuck ones)
//! ```
//!
//! A panicking actor is reaped from the `JoinSet` and reported as `ActorDead`;
//! the other actors keep running.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use iq_agent::{Supervisor, SupervisorConfig, TaskError, TaskFn, TaskRef, TaskSpec};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = SupervisorConfig {
//!         interruptible: true,
//!         handle_signals: false,
//!         ..SupervisorConfig::default()
//!     };
//!     let sup = Supervisor::builder(cfg).build();
//!
//!     let ping: TaskRef = TaskFn::arc("ping", |_ctx: CancellationToken| async move {
//!         Ok::<(), TaskError>(())
//!     });
//!
//!     let stopper = sup.clone();
//!     tokio::spawn(async move {
//!         tokio::time::sleep(Duration::from_millis(50)).await;
//!         stopper.stop();
//!     });
//!
//!     sup.run(vec![TaskSpec::new(ping, Duration::from_secs(1))]).await?;
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::{Id, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::{actor::TaskActor, alive::AliveTracker, builder::SupervisorBuilder, config::SupervisorConfig, shutdown};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::tasks::TaskSpec;

/// Coordinates task actors, event delivery and graceful shutdown.
pub struct Supervisor {
    pub(crate) cfg: SupervisorConfig,
    pub(crate) bus: Bus,
    pub(crate) subscribers: Vec<Arc<dyn Subscribe>>,
    pub(crate) alive: Arc<AliveTracker>,
    pub(crate) runtime_token: CancellationToken,
}

impl Supervisor {
    pub fn builder(cfg: SupervisorConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: SupervisorConfig,
        bus: Bus,
        subscribers: Vec<Arc<dyn Subscribe>>,
        alive: Arc<AliveTracker>,
        runtime_token: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            bus,
            subscribers,
            alive,
            runtime_token,
        }
    }

    /// Event bus shared with every actor.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Names of the runners currently alive.
    pub async fn alive_tasks(&self) -> Vec<String> {
        self.alive.snapshot().await
    }

    /// True once shutdown has been requested.
    pub fn is_stopping(&self) -> bool {
        self.runtime_token.is_cancelled()
    }

    /// Requests shutdown: clears the running flag for every actor.
    ///
    /// Idempotent; only the first call publishes `ShutdownRequested`.
    pub fn stop(&self) {
        if !self.runtime_token.is_cancelled() {
            self.bus.publish(Event::new(EventKind::ShutdownRequested));
            self.runtime_token.cancel();
        }
    }

    /// Runs the given specs until every actor has exited.
    ///
    /// Actors only exit after [`stop`](Self::stop) or an OS termination signal
    /// (or by panicking), so this normally blocks for the process lifetime.
    pub async fn run(&self, tasks: Vec<TaskSpec>) -> Result<(), RuntimeError> {
        let listener_done = CancellationToken::new();
        let listener = self.subscriber_listener(listener_done.clone());

        let mut set = JoinSet::new();
        let names = self.spawn_task_actors(&mut set, tasks);
        let res = self.drive_shutdown(&mut set, &names).await;

        listener_done.cancel();
        if let Err(e) = listener.await {
            warn!(error = %e, "event listener terminated abnormally");
        }
        res
    }

    /// Forwards bus events to the liveness tracker and the subscribers.
    ///
    /// On `done`, events already queued on the bus are still delivered and the
    /// subscriber queues are drained before the listener returns.
    fn subscriber_listener(&self, done: CancellationToken) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        let set = SubscriberSet::new(self.subscribers.clone(), self.bus.clone());
        let alive = Arc::clone(&self.alive);

        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    biased;
                    r = rx.recv() => r,
                    _ = done.cancelled() => break,
                };
                match next {
                    Ok(ev) => {
                        alive.update(&ev).await;
                        set.emit(&ev);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "event listener lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            while let Ok(ev) = rx.try_recv() {
                alive.update(&ev).await;
                set.emit(&ev);
            }
            set.shutdown().await;
        })
    }

    /// Spawns one actor per spec; returns the task name for each join id.
    fn spawn_task_actors(
        &self,
        set: &mut JoinSet<()>,
        tasks: Vec<TaskSpec>,
    ) -> HashMap<Id, String> {
        let mut names = HashMap::with_capacity(tasks.len());
        for spec in tasks {
            let actor = TaskActor::new(
                Arc::clone(spec.task()),
                spec.interval(),
                self.cfg.interruptible,
                self.bus.clone(),
            );
            let child = self.runtime_token.child_token();
            let handle = set.spawn(actor.run(child));
            names.insert(handle.id(), spec.name().to_string());
        }
        names
    }

    /// Waits until either every actor has finished or shutdown is requested.
    async fn drive_shutdown(
        &self,
        set: &mut JoinSet<()>,
        names: &HashMap<Id, String>,
    ) -> Result<(), RuntimeError> {
        let signal = async {
            if !self.cfg.handle_signals {
                return std::future::pending::<()>().await;
            }
            match shutdown::wait_for_shutdown_signal().await {
                Ok(name) => info!(signal = name, "termination signal received"),
                Err(e) => {
                    warn!(error = %e, "cannot listen for termination signals");
                    std::future::pending::<()>().await;
                }
            }
        };

        tokio::select! {
            _ = signal => {
                self.stop();
                self.wait_all_with_grace(set, names).await
            }
            _ = self.runtime_token.cancelled() => {
                self.wait_all_with_grace(set, names).await
            }
            _ = self.join_all(set, names) => {
                self.bus.publish(Event::new(EventKind::AllStopped));
                Ok(())
            }
        }
    }

    /// Reaps every actor; a join error becomes `ActorDead`.
    async fn join_all(&self, set: &mut JoinSet<()>, names: &HashMap<Id, String>) {
        while let Some(res) = set.join_next().await {
            if let Err(e) = res {
                let mut ev = Event::new(EventKind::ActorDead).with_reason(e.to_string());
                if let Some(name) = names.get(&e.id()) {
                    ev = ev.with_task(name.as_str());
                }
                self.bus.publish(ev);
            }
        }
    }

    /// Waits for every actor, bounded by the grace period when one is set.
    async fn wait_all_with_grace(
        &self,
        set: &mut JoinSet<()>,
        names: &HashMap<Id, String>,
    ) -> Result<(), RuntimeError> {
        let Some(grace) = self.cfg.grace_limit() else {
            self.join_all(set, names).await;
            self.bus.publish(Event::new(EventKind::AllStopped));
            return Ok(());
        };

        match tokio::time::timeout(grace, self.join_all(set, names)).await {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllStopped));
                Ok(())
            }
            Err(_) => {
                let stuck = self.alive.snapshot().await;
                self.bus
                    .publish(Event::new(EventKind::GraceExceeded).with_reason(stuck.join(", ")));
                set.abort_all();
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }
}
