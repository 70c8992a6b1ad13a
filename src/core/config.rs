//! # Supervisor runtime configuration.
//!
//! [`SupervisorConfig`] is read from `agent.supervisor.*`:
//!
//! | key                            | default | meaning                                           |
//! |--------------------------------|---------|---------------------------------------------------|
//! | `agent.supervisor.grace`       | `0`     | seconds to wait for runners after stop; 0 = no limit |
//! | `agent.supervisor.interruptible` | `false` | stop interrupts sleeps and cancels the cycle token |
//! | `agent.supervisor.bus_capacity`  | `1024`  | event bus ring buffer size (min 1)                 |
//!
//! `handle_signals` is code-only; tests turn it off.

use std::time::Duration;

use crate::config::{Configuration, read_secs};
use crate::error::AgentError;

const GRACE_KEY: &str = "agent.supervisor.grace";
const INTERRUPTIBLE_KEY: &str = "agent.supervisor.interruptible";
const BUS_CAPACITY_KEY: &str = "agent.supervisor.bus_capacity";

/// Runtime knobs for the [`Supervisor`](crate::Supervisor).
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// How long to wait for runners once shutdown is requested.
    ///
    /// `Duration::ZERO` waits without limit.
    pub grace: Duration,

    /// When set, shutdown wakes sleeping runners and cancels the token handed
    /// to the in-flight cycle. Otherwise the current cycle and its sleep finish
    /// before the runner notices.
    pub interruptible: bool,

    /// Capacity of the event bus. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,

    /// Listen for SIGINT / SIGTERM / SIGQUIT (Ctrl-C elsewhere).
    pub handle_signals: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            grace: Duration::ZERO,
            interruptible: false,
            bus_capacity: 1024,
            handle_signals: true,
        }
    }
}

impl SupervisorConfig {
    /// Reads `agent.supervisor.*`, falling back to defaults for absent keys.
    pub fn from_configuration(cfg: &Configuration) -> Result<Self, AgentError> {
        let defaults = Self::default();
        let grace = read_secs(cfg, GRACE_KEY, 0)?;
        let interruptible = cfg
            .get_bool(INTERRUPTIBLE_KEY)?
            .unwrap_or(defaults.interruptible);
        let bus_capacity = match cfg.get_int(BUS_CAPACITY_KEY)? {
            None => defaults.bus_capacity,
            Some(n) => usize::try_from(n)
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| AgentError::InvalidSetting {
                    key: BUS_CAPACITY_KEY.to_string(),
                    reason: format!("expected a capacity of at least 1, got {n}"),
                })?,
        };

        Ok(Self {
            grace,
            interruptible,
            bus_capacity,
            handle_signals: defaults.handle_signals,
        })
    }

    /// Grace period as an `Option` (`None` = wait without limit).
    #[inline]
    pub fn grace_limit(&self) -> Option<Duration> {
        (self.grace > Duration::ZERO).then_some(self.grace)
    }

    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}
