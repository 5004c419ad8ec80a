//! Execution context threaded through every provisioning step

use super::errors::{ProvisionError, ProvisionResult};
use crate::metrics::{record_counter, PROVISION_CANCELLED};
use crate::shutdown::{ShutdownCoordinator, ShutdownSignal};
use crate::tracing::TraceContext;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Trace ids, cancellation and per-step timeout for one provisioning flow
#[derive(Clone, Default)]
pub struct ProvisionContext {
    trace: TraceContext,
    shutdown: Option<Arc<ShutdownCoordinator>>,
    step_timeout: Option<Duration>,
}

impl ProvisionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shutdown(mut self, shutdown: Arc<ShutdownCoordinator>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    pub fn trace(&self) -> &TraceContext {
        &self.trace
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout
    }

    /// Fail with `Cancelled` if shutdown has already begun
    pub async fn check_cancelled(&self, step: &'static str) -> ProvisionResult<()> {
        match &self.shutdown {
            Some(shutdown) if shutdown.is_shutting_down().await => Err(self.cancelled(step)),
            _ => Ok(()),
        }
    }

    /// Run a suspension point, racing it against shutdown and the step timeout.
    /// A step is never started once shutdown has begun. An immediate shutdown
    /// drops an in-flight step at once; a graceful one drops it only if it is
    /// still running when the grace period ends.
    pub async fn guard<T, F>(&self, step: &'static str, fut: F) -> ProvisionResult<T>
    where
        F: Future<Output = ProvisionResult<T>>,
    {
        let bounded = async {
            match self.step_timeout {
                Some(limit) => match tokio::time::timeout(limit, fut).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(step, timeout = ?limit, "Provisioning step timed out");
                        Err(ProvisionError::TimedOut { step, timeout: limit })
                    }
                },
                None => fut.await,
            }
        };

        let Some(shutdown) = &self.shutdown else {
            return bounded.await;
        };
        if shutdown.is_shutting_down().await {
            return Err(self.cancelled(step));
        }
        tokio::pin!(bounded);

        let signal = tokio::select! {
            biased;
            signal = shutdown.cancelled() => signal,
            result = &mut bounded => return result,
        };

        // A graceful shutdown lets the in-flight step finish within the grace period
        if signal == ShutdownSignal::Graceful {
            tokio::select! {
                biased;
                _ = shutdown.terminated() => {}
                result = &mut bounded => return result,
            }
        }
        Err(self.cancelled(step))
    }

    fn cancelled(&self, step: &'static str) -> ProvisionError {
        warn!(step, trace_id = %self.trace.trace_id, "Provisioning step cancelled");
        record_counter(PROVISION_CANCELLED, 1);
        ProvisionError::Cancelled { step }
    }
}
