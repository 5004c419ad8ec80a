//! Test fixtures for creating common test objects
//!
//! Provides builder patterns and factory functions for users, devices and
//! key chains.

use super::deterministic_rng::deterministic_seed;
use crate::core_device::{ActiveDevice, DeviceSwitch};
use crate::core_identity::*;
use crate::core_provision::{DeviceKeygen, KeyMaterialGenerator, KeygenArgs, KeyringRefs, PushArgs};
use crate::core_secrets::{DeviceSecretStore, LocalKeySecurity, LocalSecretStore};
use crate::core_service::{IdentityService, LoopbackIdentityService, ServerHalf};
use std::sync::Arc;

/// Password salt used by fixture users
pub const TEST_SALT: &[u8] = b"0123456789abcdef";

/// Local key security with a fixed client half
pub fn test_lks() -> LocalKeySecurity {
    LocalKeySecurity::with_client_half(deterministic_seed(7))
}

pub fn test_secret_store(service: Arc<dyn IdentityService>) -> DeviceSecretStore {
    DeviceSecretStore::new(service, test_lks())
}

pub fn test_device(name: &str, device_type: DeviceType) -> DeviceIdentity {
    DeviceIdentity::new(
        DeviceId::generate().expect("device id"),
        name,
        device_type,
    )
    .expect("valid device name")
}

/// A device switch for `username` with fresh keys and a fresh device id
pub fn test_switch(username: &str, device_name: &str) -> DeviceSwitch {
    DeviceSwitch {
        user_version: UserVersion {
            uid: UserId::from_username(username),
            eldest_seqno: 1,
        },
        normalized_name: username.to_lowercase(),
        salt: TEST_SALT.to_vec(),
        device_id: DeviceId::generate().expect("device id"),
        device_name: device_name.to_string(),
        signing_key: SigningKey::generate().expect("signing key"),
        encryption_key: EncryptionKey::generate().expect("encryption key"),
    }
}

/// A device that is part of a fixture key chain
#[derive(Debug, Clone)]
pub struct TestDevice {
    pub device: DeviceIdentity,
    pub signing_key: SigningKey,
    pub encryption_key: EncryptionKey,
}

/// A fixture user with its key chain and device keys
#[derive(Debug, Clone)]
pub struct TestUser {
    pub snapshot: UserSnapshot,
    pub devices: Vec<TestDevice>,
}

impl TestUser {
    /// The eldest device's signing key
    pub fn eldest_key(&self) -> &SigningKey {
        &self.devices[0].signing_key
    }
}

/// Builder for user snapshots with a populated key chain
pub struct TestUserBuilder {
    username: String,
    salt: Vec<u8>,
    devices: usize,
    installed: Option<usize>,
}

impl TestUserBuilder {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            salt: TEST_SALT.to_vec(),
            devices: 0,
            installed: None,
        }
    }

    pub fn with_salt(mut self, salt: &[u8]) -> Self {
        self.salt = salt.to_vec();
        self
    }

    /// Number of provisioned devices in the key chain
    pub fn with_devices(mut self, count: usize) -> Self {
        self.devices = count;
        self
    }

    /// Mark device `index` as the one this install runs as
    pub fn installed_on(mut self, index: usize) -> Self {
        self.installed = Some(index);
        self
    }

    pub fn build(self) -> TestUser {
        let uid = UserId::from_username(&self.username);
        let mut chain = KeyChain::new();
        let mut devices: Vec<TestDevice> = Vec::new();

        for i in 0..self.devices {
            let device = TestDevice {
                device: test_device(&format!("device {}", i + 1), DeviceType::Desktop),
                signing_key: SigningKey::generate().expect("signing key"),
                encryption_key: EncryptionKey::generate().expect("encryption key"),
            };
            let (kind, signer, reverse) = match devices.first() {
                None => (DelegationKind::Eldest, &device.signing_key, None),
                Some(eldest) => (
                    DelegationKind::Sibkey,
                    &eldest.signing_key,
                    Some(&device.signing_key),
                ),
            };
            let eldest_kid = devices
                .first()
                .map_or(device.signing_key.kid(), |d| d.signing_key.kid())
                .clone();

            let sibkey = DelegationBody {
                kind,
                uid,
                username: self.username.clone(),
                seqno: chain.seqno() + 1,
                eldest_kid: eldest_kid.clone(),
                signer_kid: signer.kid().clone(),
                delegated_kid: device.signing_key.kid().clone(),
                device: Some(device.device.clone()),
                ctime: unix_now(),
            };
            chain
                .apply(&SignedDelegation::sign(sibkey, signer, reverse).expect("sign"))
                .expect("apply signing key");

            let subkey = DelegationBody {
                kind: DelegationKind::Subkey,
                uid,
                username: self.username.clone(),
                seqno: chain.seqno() + 1,
                eldest_kid,
                signer_kid: device.signing_key.kid().clone(),
                delegated_kid: device.encryption_key.kid().clone(),
                device: Some(device.device.clone()),
                ctime: unix_now(),
            };
            chain
                .apply(&SignedDelegation::sign(subkey, &device.signing_key, None).expect("sign"))
                .expect("apply encryption key");
            devices.push(device);
        }

        let installed = self
            .installed
            .and_then(|i| devices.get(i))
            .map(|d| d.device.id());
        let snapshot = UserSnapshot::new(self.username, self.salt)
            .with_key_chain(chain)
            .with_installed_device(installed);
        TestUser { snapshot, devices }
    }
}

/// Register `alice` on `service` with one pushed eldest device. Returns the
/// device as an active device record and the server half uploaded for it.
pub async fn provisioned_user(service: &Arc<LoopbackIdentityService>) -> (ActiveDevice, ServerHalf) {
    let me = service
        .register_user("alice", TEST_SALT.to_vec())
        .await
        .expect("register alice");
    let secrets = test_secret_store(service.clone());
    let secret = secrets.generate_server_half().expect("server half");
    let keygen = DeviceKeygen::new(service.clone());

    let keys = keygen
        .generate(&KeygenArgs {
            me: me.clone(),
            device: test_device("first laptop", DeviceType::Desktop),
            secret: secret.clone(),
            is_eldest: true,
            is_self_provision: false,
            keyring: KeyringRefs::default(),
        })
        .expect("generate");
    keygen
        .push(&keys, PushArgs { signer: None, eldest_kid: None })
        .await
        .expect("push");

    let me = service.load_user(&me.uid()).await.expect("load alice");
    let active = ActiveDevice::from(DeviceSwitch {
        user_version: me.user_version(),
        normalized_name: me.normalized_name(),
        salt: TEST_SALT.to_vec(),
        device_id: keys.device.id(),
        device_name: keys.device.name().to_string(),
        signing_key: keys.signing_key,
        encryption_key: keys.encryption_key,
    });
    (active, secret.server_half)
}
