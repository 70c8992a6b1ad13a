//! # Building services from descriptors.
//!
//! [`ServiceFactory`] is the seam between configuration and task bodies: the
//! agent hands it each enabled [`TaskDescriptor`] and gets a [`TaskRef`] back.
//! [`HttpServiceFactory`] builds the real services; tests substitute their own.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{ServiceKind, ServiceParams, TaskDescriptor};
use crate::error::AgentError;
use crate::policies::{BackoffPolicy, JitterPolicy, RetryPolicy};
use crate::security::SecurityContext;
use crate::services::{JournaldMonitor, ServiceClient, ShellExecutor, VitalsMonitor};
use crate::tasks::TaskRef;

/// Constructs the task body for one enabled service.
pub trait ServiceFactory: Send + Sync {
    fn build(
        &self,
        descriptor: &TaskDescriptor,
        security: &Arc<SecurityContext>,
    ) -> Result<TaskRef, AgentError>;
}

/// Builds the HTTP-backed services.
#[derive(Debug, Clone, Copy)]
pub struct HttpServiceFactory {
    /// Delay schedule between delivery attempts.
    pub backoff: BackoffPolicy,
}

impl Default for HttpServiceFactory {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy {
                first: Duration::from_secs(1),
                max: Duration::from_secs(30),
                factor: 2.0,
                jitter: JitterPolicy::Equal,
            },
        }
    }
}

impl ServiceFactory for HttpServiceFactory {
    fn build(
        &self,
        descriptor: &TaskDescriptor,
        security: &Arc<SecurityContext>,
    ) -> Result<TaskRef, AgentError> {
        let client = ServiceClient::new(
            descriptor.kind.name(),
            descriptor.url.clone(),
            Arc::clone(security),
        )?;

        let task: TaskRef = match (descriptor.kind, descriptor.params) {
            (ServiceKind::Vitals, ServiceParams::Vitals { timeout }) => {
                Arc::new(VitalsMonitor::new(client, timeout))
            }
            (ServiceKind::Journald, ServiceParams::Journald { retries, timeout }) => Arc::new(
                JournaldMonitor::new(client, RetryPolicy::new(retries, self.backoff), timeout),
            ),
            (
                ServiceKind::Shell,
                ServiceParams::Shell {
                    poll_timeout,
                    reply_timeout,
                    reply_retries,
                },
            ) => Arc::new(ShellExecutor::new(
                client,
                poll_timeout,
                reply_timeout,
                RetryPolicy::new(reply_retries, self.backoff),
            )),
            (kind, _) => {
                return Err(AgentError::InvalidSetting {
                    key: kind.prefix().to_string(),
                    reason: "parameters do not match the service".into(),
                });
            }
        };
        Ok(task)
    }
}
