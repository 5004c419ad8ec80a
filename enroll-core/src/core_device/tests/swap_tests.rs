//! Concurrent readers against the active device swap

use crate::core_device::*;
use crate::test_utils::fixtures::test_switch;
use crate::test_utils::mocks::FailingConfigStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn test_readers_never_observe_mixed_device() {
    let registry = Arc::new(ActiveDeviceRegistry::new(Arc::new(MemoryUserConfigStore::new())));
    let switches: Vec<DeviceSwitch> = ["laptop", "phone", "backup"]
        .iter()
        .map(|name| test_switch("alice", name))
        .collect();
    let expected: HashMap<_, _> = switches
        .iter()
        .map(|s| (s.device_id, (s.device_name.clone(), s.signing_key.kid().clone())))
        .collect();
    let expected = Arc::new(expected);
    registry.swap(switches[0].clone()).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let registry = registry.clone();
            let expected = expected.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut observed = 0usize;
                loop {
                    let active = registry.current().unwrap();
                    let (name, kid) = &expected[&active.device_id()];
                    assert_eq!(active.device_name(), name);
                    assert_eq!(active.signing_key().kid(), kid);
                    observed += 1;
                    if done.load(Ordering::Relaxed) {
                        break;
                    }
                }
                observed
            })
        })
        .collect();

    for i in 0..300 {
        registry.swap(switches[i % switches.len()].clone()).unwrap();
    }
    done.store(true, Ordering::Relaxed);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
}

#[test]
fn test_failed_swaps_under_contention_keep_last_good_device() {
    let store = Arc::new(FailingConfigStore::new());
    let registry = Arc::new(ActiveDeviceRegistry::new(store.clone()));
    let good = registry.swap(test_switch("alice", "laptop")).unwrap();

    store.fail_all_saves(true);
    let writers: Vec<_> = (0..4)
        .map(|i| {
            let registry = registry.clone();
            thread::spawn(move || {
                registry
                    .swap(test_switch("alice", &format!("phone {}", i)))
                    .is_err()
            })
        })
        .collect();
    for writer in writers {
        assert!(writer.join().unwrap());
    }

    let current = registry.current().unwrap();
    assert!(Arc::ptr_eq(&good, &current));
    assert_eq!(registry.persisted().unwrap(), Some(good.user_config()));
}

#[test]
fn test_swap_to_other_user() {
    let registry = ActiveDeviceRegistry::new(Arc::new(MemoryUserConfigStore::new()));
    registry.swap(test_switch("alice", "laptop")).unwrap();
    let bob = registry.swap(test_switch("bob", "laptop")).unwrap();

    let current = registry.current().unwrap();
    assert_eq!(current.normalized_name(), "bob");
    assert_eq!(current.uid(), bob.uid());
}
