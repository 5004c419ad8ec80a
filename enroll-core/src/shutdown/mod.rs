//! Shutdown coordination
//!
//! Long-running flows race their suspension points against
//! [`ShutdownCoordinator::cancelled`]. State lives in a `watch` channel, so a
//! waiter that subscribes after shutdown began still sees it.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// How a flow was asked to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// In-flight work gets the grace period
    Graceful,
    Immediate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    ShuttingDown,
    Shutdown,
}

pub struct ShutdownCoordinator {
    state: watch::Sender<ShutdownState>,
    grace_period: Duration,
}

impl ShutdownCoordinator {
    pub fn new(grace_period: Duration) -> Self {
        let (state, _) = watch::channel(ShutdownState::Running);
        Self {
            state,
            grace_period,
        }
    }

    /// Begin a graceful shutdown and return once the grace period is over
    pub async fn shutdown(&self) {
        let started = self.state.send_if_modified(|state| {
            if *state == ShutdownState::Running {
                *state = ShutdownState::ShuttingDown;
                true
            } else {
                false
            }
        });
        if !started {
            warn!("Shutdown already in progress");
            return;
        }

        info!(grace_period = ?self.grace_period, "Initiating graceful shutdown");
        tokio::time::sleep(self.grace_period).await;
        self.state.send_replace(ShutdownState::Shutdown);
        info!("Shutdown complete");
    }

    pub async fn shutdown_immediately(&self) {
        warn!("Initiating immediate shutdown");
        self.state.send_replace(ShutdownState::Shutdown);
    }

    pub async fn is_shutting_down(&self) -> bool {
        self.state().await != ShutdownState::Running
    }

    pub async fn state(&self) -> ShutdownState {
        *self.state.borrow()
    }

    /// Resolves once shutdown has been initiated, immediately if it already was
    pub async fn cancelled(&self) -> ShutdownSignal {
        let mut rx = self.state.subscribe();
        let state = match rx.wait_for(|s| *s != ShutdownState::Running).await {
            Ok(state) => *state,
            // unreachable while `self` holds the sender
            Err(_) => ShutdownState::Shutdown,
        };
        match state {
            ShutdownState::ShuttingDown => ShutdownSignal::Graceful,
            _ => ShutdownSignal::Immediate,
        }
    }

    /// Resolves once shutdown is complete: the grace period has ended or an
    /// immediate shutdown was requested
    pub async fn terminated(&self) {
        let mut rx = self.state.subscribe();
        // the sender lives in `self`, so this only returns once the state is reached
        let _ = rx.wait_for(|s| *s == ShutdownState::Shutdown).await;
    }
}

/// Shut `coordinator` down immediately on SIGTERM or SIGINT
#[cfg(unix)]
pub fn install_signal_handlers(coordinator: Arc<ShutdownCoordinator>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    error!("Failed to install signal handlers: {}", e);
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
        coordinator.shutdown_immediately().await;
    });
}

/// Shut `coordinator` down immediately on Ctrl+C
#[cfg(windows)]
pub fn install_signal_handlers(coordinator: Arc<ShutdownCoordinator>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            return;
        }
        info!("Received Ctrl+C");
        coordinator.shutdown_immediately().await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_graceful_shutdown_passes_through_shutting_down() {
        let coordinator = Arc::new(ShutdownCoordinator::new(Duration::from_millis(50)));
        assert_eq!(coordinator.state().await, ShutdownState::Running);
        assert!(!coordinator.is_shutting_down().await);

        let task = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.shutdown().await })
        };
        assert_eq!(coordinator.cancelled().await, ShutdownSignal::Graceful);
        assert!(coordinator.is_shutting_down().await);

        task.await.unwrap();
        assert_eq!(coordinator.state().await, ShutdownState::Shutdown);
    }

    #[tokio::test]
    async fn test_cancelled_after_shutdown_returns_immediately() {
        let coordinator = ShutdownCoordinator::new(Duration::from_millis(10));
        coordinator.shutdown_immediately().await;
        assert_eq!(coordinator.cancelled().await, ShutdownSignal::Immediate);
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let coordinator = Arc::new(ShutdownCoordinator::new(Duration::from_millis(10)));
        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.cancelled().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        coordinator.shutdown_immediately().await;

        assert_eq!(waiter.await.unwrap(), ShutdownSignal::Immediate);
    }

    #[tokio::test]
    async fn test_immediate_shutdown_ends_grace_period() {
        let coordinator = Arc::new(ShutdownCoordinator::new(Duration::from_secs(30)));
        let graceful = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.shutdown().await })
        };
        assert_eq!(coordinator.cancelled().await, ShutdownSignal::Graceful);

        coordinator.shutdown_immediately().await;
        tokio::time::timeout(Duration::from_secs(1), coordinator.terminated())
            .await
            .unwrap();
        graceful.abort();
    }
}
