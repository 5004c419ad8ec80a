//! Cancellation and step timeouts at the network suspension points

use super::helpers::*;
use crate::core_provision::*;
use crate::shutdown::ShutdownCoordinator;
use crate::test_utils::{assert_completes_within, assert_still_pending, DEFAULT_TEST_TIMEOUT};
use std::sync::Arc;
use std::time::Duration;

fn shutdown_after(coordinator: Arc<ShutdownCoordinator>, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        coordinator.shutdown_immediately().await;
    });
}

#[tokio::test]
async fn test_cancel_during_push_keeps_keys() {
    let user = fresh_user();
    let (mut provisioner, doubles) = eldest_provisioner(&user);
    doubles.keygen.delay_push(Duration::from_secs(30));
    let shutdown = Arc::new(ShutdownCoordinator::new(Duration::from_millis(10)));
    let ctx = ProvisionContext::new().with_shutdown(shutdown.clone());
    shutdown_after(shutdown, Duration::from_millis(20));

    let err = assert_completes_within(DEFAULT_TEST_TIMEOUT, provisioner.run(&ctx))
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Cancelled { step: STEP_PUSH_KEYS }));
    assert!(err.keys_retained());
    assert!(provisioner.keys_generated());
    assert!(provisioner.signing_key().is_some());
    assert!(doubles.registry.current().is_none());
}

#[tokio::test]
async fn test_shutdown_before_run_allocates_nothing() {
    let user = fresh_user();
    let (mut provisioner, doubles) = eldest_provisioner(&user);
    let shutdown = Arc::new(ShutdownCoordinator::new(Duration::from_millis(10)));
    shutdown.shutdown_immediately().await;
    let ctx = ProvisionContext::new().with_shutdown(shutdown);

    let err = provisioner.run(&ctx).await.unwrap_err();

    assert!(matches!(err, ProvisionError::Cancelled { step: STEP_REGISTER }));
    assert_eq!(doubles.total_calls(), 0);
    assert!(provisioner.device_id().is_none());
}

#[tokio::test]
async fn test_cancel_during_secret_sync_after_swap() {
    let user = fresh_user();
    let (mut provisioner, doubles) = eldest_provisioner(&user);
    let shutdown = Arc::new(ShutdownCoordinator::new(Duration::from_millis(10)));
    let ctx = ProvisionContext::new().with_shutdown(shutdown.clone());
    provisioner.run(&ctx).await.unwrap();

    doubles.secrets.delay_sync(Duration::from_secs(30));
    shutdown_after(shutdown, Duration::from_millis(20));
    let err = assert_completes_within(
        DEFAULT_TEST_TIMEOUT,
        provisioner.switch_config_and_active_device(&ctx),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ProvisionError::Cancelled { step: STEP_SYNC }));
    // The swap itself completed before the sync started
    let current = doubles.registry.current().unwrap();
    assert_eq!(Some(current.device_id()), provisioner.device_id());
}

#[tokio::test]
async fn test_push_timeout_then_retry() {
    let user = fresh_user();
    let (mut provisioner, doubles) = eldest_provisioner(&user);
    doubles.keygen.delay_push(Duration::from_secs(30));
    let ctx = ProvisionContext::new().with_step_timeout(Duration::from_millis(20));

    let err = provisioner.run(&ctx).await.unwrap_err();
    assert!(matches!(err, ProvisionError::TimedOut { step: STEP_PUSH_KEYS, .. }));
    assert!(err.keys_retained());

    doubles.keygen.delay_push(Duration::ZERO);
    provisioner.push_keys(&ctx).await.unwrap();
    assert_eq!(doubles.keygen.generate_calls(), 1);
    assert_eq!(provisioner.state(), &KeygenState::Pushed);
}

#[tokio::test]
async fn test_push_without_step_timeout_waits_for_service() {
    let user = fresh_user();
    let (mut provisioner, doubles) = eldest_provisioner(&user);
    doubles.keygen.delay_push(Duration::from_secs(30));
    let ctx = ProvisionContext::new();

    assert_still_pending(Duration::from_millis(50), provisioner.run(&ctx)).await;

    assert_eq!(doubles.keygen.push_calls(), 1);
    assert_eq!(provisioner.state(), &KeygenState::Generated);
}

#[tokio::test]
async fn test_graceful_shutdown_lets_push_finish() {
    let user = fresh_user();
    let (mut provisioner, doubles) = eldest_provisioner(&user);
    doubles.keygen.delay_push(Duration::from_millis(100));
    let shutdown = Arc::new(ShutdownCoordinator::new(Duration::from_secs(5)));
    let ctx = ProvisionContext::new().with_shutdown(shutdown.clone());
    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.shutdown().await;
    });

    assert_completes_within(DEFAULT_TEST_TIMEOUT, provisioner.run(&ctx))
        .await
        .unwrap();
    trigger.abort();

    assert_eq!(provisioner.state(), &KeygenState::Pushed);
    assert_eq!(doubles.keygen.push_calls(), 1);
    // Later steps do not start once shutdown has begun
    let err = provisioner.switch_config_and_active_device(&ctx).await.unwrap_err();
    assert!(matches!(err, ProvisionError::Cancelled { .. }));
}

#[tokio::test]
async fn test_graceful_shutdown_cancels_push_after_grace_period() {
    let user = fresh_user();
    let (mut provisioner, doubles) = eldest_provisioner(&user);
    doubles.keygen.delay_push(Duration::from_secs(30));
    let shutdown = Arc::new(ShutdownCoordinator::new(Duration::from_millis(30)));
    let ctx = ProvisionContext::new().with_shutdown(shutdown.clone());
    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.shutdown().await;
    });

    let err = assert_completes_within(DEFAULT_TEST_TIMEOUT, provisioner.run(&ctx))
        .await
        .unwrap_err();
    trigger.await.unwrap();

    assert!(matches!(err, ProvisionError::Cancelled { step: STEP_PUSH_KEYS }));
    assert!(err.keys_retained());
}
