//! End-to-end provisioning scenarios against scripted collaborators

use super::helpers::*;
use crate::core_provision::*;
use crate::test_utils::{rotated_salt, test_switch};
use crate::core_identity::UserSnapshot;
use std::sync::Arc;

#[tokio::test]
async fn test_eldest_device_on_fresh_identity() {
    let user = fresh_user();
    let (mut provisioner, doubles) = eldest_provisioner(&user);
    let ctx = ProvisionContext::new();

    provisioner.run(&ctx).await.unwrap();

    assert!(provisioner.device_id().is_some());
    assert!(provisioner.keys_generated());
    assert_eq!(provisioner.state(), &KeygenState::Pushed);
    assert_eq!(
        provisioner.signing_key().unwrap().kid(),
        &doubles.keygen.expected_signing_kid()
    );
    assert_eq!(
        provisioner.encryption_key().unwrap().kid(),
        &doubles.keygen.expected_encryption_kid()
    );
    assert_eq!(doubles.secrets.generate_calls(), 1);
    assert_eq!(doubles.keygen.generate_calls(), 1);
    assert_eq!(doubles.keygen.push_calls(), 1);
    assert_eq!(doubles.keygen.last_push_signer(), None);

    // run() never activates the device
    assert!(doubles.registry.current().is_none());
    assert_eq!(doubles.secrets.sync_calls(), 0);
}

#[tokio::test]
async fn test_eldest_switch_refreshes_and_activates() {
    let user = fresh_user();
    let (mut provisioner, doubles) = eldest_provisioner(&user);
    let ctx = ProvisionContext::new();
    provisioner.run(&ctx).await.unwrap();

    let active = provisioner.switch_config_and_active_device(&ctx).await.unwrap();

    assert_eq!(doubles.loader.calls(), 1);
    assert_eq!(Some(active.device_id()), provisioner.device_id());
    assert_eq!(active.device_name(), "new laptop");
    assert_eq!(active.normalized_name(), "alice");
    assert_eq!(active.uid(), user.snapshot.uid());
    assert_eq!(active.signing_key().kid(), &doubles.keygen.expected_signing_kid());

    let current = doubles.registry.current().unwrap();
    assert!(Arc::ptr_eq(&current, &active));
    assert_eq!(doubles.registry.persisted().unwrap(), Some(active.user_config()));
    assert_eq!(doubles.secrets.sync_calls(), 1);
    assert_eq!(doubles.secrets.synced(), vec![active.user_config()]);
}

#[tokio::test]
async fn test_refreshed_snapshot_is_used_for_swap() {
    let user = fresh_user();
    let (mut provisioner, doubles) = eldest_provisioner(&user);
    let ctx = ProvisionContext::new();
    provisioner.run(&ctx).await.unwrap();

    doubles
        .loader
        .set_snapshot(UserSnapshot::new("alice", rotated_salt()));
    let active = provisioner.switch_config_and_active_device(&ctx).await.unwrap();

    assert_eq!(active.salt(), rotated_salt().as_slice());
    assert_eq!(provisioner.me().salt().unwrap(), rotated_salt().as_slice());
}

#[tokio::test]
async fn test_new_device_reuses_cached_snapshot() {
    let user = user_on_other_device();
    let (mut provisioner, doubles) = sibling_provisioner(&user, false);
    let ctx = ProvisionContext::new();

    provisioner.run(&ctx).await.unwrap();
    assert_eq!(
        doubles.keygen.last_push_signer().as_ref(),
        Some(user.eldest_key().kid())
    );

    let active = provisioner.switch_config_and_active_device(&ctx).await.unwrap();
    assert_eq!(doubles.loader.calls(), 0);
    assert_eq!(provisioner.me(), &user.snapshot);
    assert_eq!(active.user_version(), user.snapshot.user_version());
}

#[tokio::test]
async fn test_already_provisioned_touches_nothing() {
    let user = registered_user();
    let (mut provisioner, doubles) = sibling_provisioner(&user, false);

    let err = provisioner.run(&ProvisionContext::new()).await.unwrap_err();

    assert!(matches!(err, ProvisionError::AlreadyProvisioned { .. }));
    assert_eq!(doubles.total_calls(), 0);
    assert!(provisioner.device_id().is_none());
    assert!(provisioner.signing_key().is_none());
    assert!(!provisioner.keys_generated());
    assert_eq!(provisioner.state(), &KeygenState::NotStarted);
}

#[tokio::test]
async fn test_self_provision_on_registered_device() {
    let user = registered_user();
    let (mut provisioner, doubles) = sibling_provisioner(&user, true);
    let ctx = ProvisionContext::new();

    provisioner.run(&ctx).await.unwrap();
    assert!(provisioner.keys_generated());
    assert_eq!(
        doubles.keygen.last_push_signer().as_ref(),
        Some(user.eldest_key().kid())
    );

    let active = provisioner.switch_config_and_active_device(&ctx).await.unwrap();
    assert_eq!(doubles.loader.calls(), 1);
    assert_eq!(Some(active.device_id()), provisioner.device_id());
    assert_ne!(Some(active.device_id()), user.snapshot.installed_device());
}

#[tokio::test]
async fn test_switch_replaces_previous_active_device() {
    let user = user_on_other_device();
    let (mut provisioner, doubles) = sibling_provisioner(&user, false);
    let previous = doubles.registry.swap(test_switch("alice", "old laptop")).unwrap();
    let ctx = ProvisionContext::new();

    provisioner.run(&ctx).await.unwrap();
    let active = provisioner.switch_config_and_active_device(&ctx).await.unwrap();

    assert_ne!(previous.device_id(), active.device_id());
    assert_eq!(doubles.registry.current().unwrap().device_name(), "new phone");
}

#[tokio::test]
async fn test_secret_sync_can_be_disabled() {
    let user = fresh_user();
    let (provisioner, doubles) = eldest_provisioner(&user);
    let mut provisioner = provisioner.with_secret_sync(false);
    let ctx = ProvisionContext::new();

    provisioner.run(&ctx).await.unwrap();
    provisioner.switch_config_and_active_device(&ctx).await.unwrap();
    assert_eq!(doubles.secrets.sync_calls(), 0);
}
