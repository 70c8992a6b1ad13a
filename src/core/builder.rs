use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{alive::AliveTracker, config::SupervisorConfig, supervisor::Supervisor};
use crate::{events::Bus, subscribers::Subscribe};

/// Builder for a [`Supervisor`].
pub struct SupervisorBuilder {
    cfg: SupervisorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    pub fn new(cfg: SupervisorConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive runtime events through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one subscriber.
    pub fn subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        Arc::new(Supervisor::new_internal(
            self.cfg,
            bus,
            self.subscribers,
            Arc::new(AliveTracker::new()),
            CancellationToken::new(),
        ))
    }
}
