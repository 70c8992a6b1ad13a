//! # Agent bootstrap.
//!
//! Turns a loaded [`Configuration`] into a running set of tasks:
//!
//! ```text
//! Configuration
//!   ├─► Credentials ──► SecurityContext (fatal if a field is empty)
//!   ├─► SupervisorConfig
//!   ├─► TaskDescriptor per enabled service (fatal on a missing URL)
//!   └─► ServiceFactory::build per descriptor (fatal on an unusable secret)
//!                │
//!                ▼
//!        Vec<TaskSpec> ──► Supervisor::run
//! ```
//!
//! Every step completes before the first task is spawned: a startup error
//! leaves nothing running.

use std::sync::Arc;

use tracing::info;

use crate::config::{Configuration, Credentials, TaskDescriptor};
use crate::core::{Supervisor, SupervisorConfig};
use crate::error::{AgentError, RuntimeError};
use crate::security::SecurityContext;
use crate::services::{HttpServiceFactory, ServiceFactory};
use crate::subscribers::{LogWriter, Subscribe};
use crate::tasks::TaskSpec;

/// A fully validated agent, ready to run.
pub struct Agent {
    supervisor: Arc<Supervisor>,
    specs: Vec<TaskSpec>,
}

impl Agent {
    /// Builds the agent with the HTTP services and the log subscriber.
    pub fn from_configuration(cfg: &Configuration) -> Result<Self, AgentError> {
        Self::builder(cfg).build()
    }

    pub fn builder(cfg: &Configuration) -> AgentBuilder<'_> {
        AgentBuilder {
            cfg,
            factory: None,
            subscribers: Vec::new(),
            handle_signals: true,
        }
    }

    /// Names of the tasks that will run, in startup order.
    pub fn task_names(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    /// Runs every task until shutdown; see [`Supervisor::run`].
    pub async fn run(self) -> Result<(), RuntimeError> {
        info!(tasks = ?self.task_names(), "agent starting");
        let res = self.supervisor.run(self.specs).await;
        info!("agent stopped");
        res
    }
}

/// Options for [`Agent`] construction.
pub struct AgentBuilder<'a> {
    cfg: &'a Configuration,
    factory: Option<&'a dyn ServiceFactory>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    handle_signals: bool,
}

impl<'a> AgentBuilder<'a> {
    /// Uses `factory` instead of [`HttpServiceFactory`].
    pub fn factory(mut self, factory: &'a dyn ServiceFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Adds an event subscriber next to the log writer.
    pub fn subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Whether the supervisor listens for OS termination signals (default on).
    pub fn handle_signals(mut self, on: bool) -> Self {
        self.handle_signals = on;
        self
    }

    pub fn build(self) -> Result<Agent, AgentError> {
        let security = Arc::new(SecurityContext::from_credentials(Credentials::read(
            self.cfg,
        )?)?);

        let mut sup_cfg = SupervisorConfig::from_configuration(self.cfg)?;
        sup_cfg.handle_signals = self.handle_signals;

        let descriptors = TaskDescriptor::read_enabled(self.cfg)?;
        let default_factory = HttpServiceFactory::default();
        let factory: &dyn ServiceFactory = self.factory.unwrap_or(&default_factory);

        let specs = descriptors
            .iter()
            .map(|d| Ok(TaskSpec::new(factory.build(d, &security)?, d.interval)))
            .collect::<Result<Vec<_>, AgentError>>()?;

        let mut subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
        subscribers.extend(self.subscribers);
        let supervisor = Supervisor::builder(sup_cfg)
            .with_subscribers(subscribers)
            .build();

        Ok(Agent { supervisor, specs })
    }
}
