//! Scripted collaborator doubles
//!
//! Each double counts its calls and can be told to fail or stall, so tests can
//! assert exactly which collaborators a provisioning step touched.

use super::deterministic_rng::{deterministic_encryption_key, deterministic_signing_key};
use super::fixtures::TEST_SALT;
use crate::core_device::{
    ActiveDevice, ActiveDeviceRegistry, MemoryUserConfigStore, SwapError, UserConfig,
    UserConfigStore, UserLoader,
};
use crate::core_identity::{KeyId, UserId, UserSnapshot};
use crate::core_provision::{
    GeneratedKeys, KeyMaterialGenerator, KeygenArgs, KeygenError, ProvisionDeps, PushArgs,
};
use crate::core_secrets::{LocalSecretStore, SecretError, SecretHandle};
use crate::core_service::{PushAck, ServerHalf, ServiceError, ServiceResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Key generator returning fixed keys derived from a seed
pub struct ScriptedKeygen {
    seed: u64,
    generate_calls: AtomicUsize,
    push_calls: AtomicUsize,
    fail_generate: AtomicBool,
    failing_pushes: AtomicUsize,
    push_delay: Mutex<Option<Duration>>,
    last_push_signer: Mutex<Option<KeyId>>,
}

impl ScriptedKeygen {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            generate_calls: AtomicUsize::new(0),
            push_calls: AtomicUsize::new(0),
            fail_generate: AtomicBool::new(false),
            failing_pushes: AtomicUsize::new(0),
            push_delay: Mutex::new(None),
            last_push_signer: Mutex::new(None),
        }
    }

    /// The signing key every `generate` call returns
    pub fn expected_signing_kid(&self) -> KeyId {
        deterministic_signing_key(self.seed).kid().clone()
    }

    pub fn expected_encryption_kid(&self) -> KeyId {
        deterministic_encryption_key(self.seed + 1).kid().clone()
    }

    pub fn fail_generate(&self) {
        self.fail_generate.store(true, Ordering::SeqCst);
    }

    /// Fail the next `count` pushes with a network error
    pub fn fail_pushes(&self, count: usize) {
        self.failing_pushes.store(count, Ordering::SeqCst);
    }

    pub fn delay_push(&self, delay: Duration) {
        *self.push_delay.lock().unwrap() = Some(delay);
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn push_calls(&self) -> usize {
        self.push_calls.load(Ordering::SeqCst)
    }

    pub fn last_push_signer(&self) -> Option<KeyId> {
        self.last_push_signer.lock().unwrap().clone()
    }
}

#[async_trait]
impl KeyMaterialGenerator for ScriptedKeygen {
    fn generate(&self, args: &KeygenArgs) -> Result<GeneratedKeys, KeygenError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_generate.load(Ordering::SeqCst) {
            return Err(KeygenError::Identity(
                crate::core_identity::IdentityError::Entropy("scripted failure".to_string()),
            ));
        }
        Ok(GeneratedKeys {
            uid: args.me.uid(),
            username: args.me.username().to_string(),
            base_seqno: args.me.key_chain().seqno(),
            device: args.device.clone(),
            is_eldest: args.is_eldest,
            signing_key: deterministic_signing_key(self.seed),
            encryption_key: deterministic_encryption_key(self.seed + 1),
            secret: args.secret.clone(),
        })
    }

    async fn push(&self, keys: &GeneratedKeys, args: PushArgs<'_>) -> Result<PushAck, KeygenError> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_push_signer.lock().unwrap() = args.signer.map(|s| s.kid().clone());

        let delay = *self.push_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self.failing_pushes.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_pushes.store(failing - 1, Ordering::SeqCst);
            return Err(KeygenError::Service(ServiceError::Unavailable(
                "connection reset".to_string(),
            )));
        }
        Ok(PushAck {
            seqno: keys.base_seqno + 2,
        })
    }
}

/// Secret store handing out fixed server halves
#[derive(Default)]
pub struct ScriptedSecretStore {
    generate_calls: AtomicUsize,
    sync_calls: AtomicUsize,
    fail_generate: AtomicBool,
    fail_sync: AtomicBool,
    sync_delay: Mutex<Option<Duration>>,
    synced: Mutex<Vec<UserConfig>>,
}

impl ScriptedSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_generate(&self) {
        self.fail_generate.store(true, Ordering::SeqCst);
    }

    pub fn fail_sync(&self) {
        self.fail_sync.store(true, Ordering::SeqCst);
    }

    pub fn delay_sync(&self, delay: Duration) {
        *self.sync_delay.lock().unwrap() = Some(delay);
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn sync_calls(&self) -> usize {
        self.sync_calls.load(Ordering::SeqCst)
    }

    /// Devices whose secrets were synced successfully
    pub fn synced(&self) -> Vec<UserConfig> {
        self.synced.lock().unwrap().clone()
    }
}

#[async_trait]
impl LocalSecretStore for ScriptedSecretStore {
    fn generate_server_half(&self) -> Result<SecretHandle, SecretError> {
        let n = self.generate_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_generate.load(Ordering::SeqCst) {
            return Err(SecretError::Entropy("scripted failure".to_string()));
        }
        Ok(SecretHandle {
            server_half: ServerHalf::new(vec![n as u8; 32]),
            generation: n as u32,
        })
    }

    async fn sync_secrets(&self, device: &ActiveDevice) -> Result<(), SecretError> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.sync_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_sync.load(Ordering::SeqCst) {
            return Err(SecretError::Sync(ServiceError::Unavailable(
                "secret store offline".to_string(),
            )));
        }
        self.synced.lock().unwrap().push(device.user_config());
        Ok(())
    }
}

/// User loader returning a configurable snapshot
pub struct CountingUserLoader {
    snapshot: Mutex<UserSnapshot>,
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl CountingUserLoader {
    pub fn new(snapshot: UserSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn set_snapshot(&self, snapshot: UserSnapshot) {
        *self.snapshot.lock().unwrap() = snapshot;
    }

    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserLoader for CountingUserLoader {
    async fn load(&self, uid: &UserId) -> ServiceResult<UserSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::Unavailable("loader offline".to_string()));
        }
        let snapshot = self.snapshot.lock().unwrap().clone();
        if snapshot.uid() != *uid {
            return Err(ServiceError::UserNotFound(*uid));
        }
        Ok(snapshot)
    }
}

/// User config store that can be told to fail saves
#[derive(Default)]
pub struct FailingConfigStore {
    inner: MemoryUserConfigStore,
    fail_next: AtomicBool,
    fail_all: AtomicBool,
    saves: AtomicUsize,
}

impl FailingConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_save(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn fail_all_saves(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl UserConfigStore for FailingConfigStore {
    fn load(&self) -> Result<Option<UserConfig>, SwapError> {
        self.inner.load()
    }

    fn save(&self, config: &UserConfig) -> Result<(), SwapError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) || self.fail_all.load(Ordering::SeqCst) {
            return Err(SwapError::Persist("disk full".to_string()));
        }
        self.inner.save(config)
    }
}

/// All provisioning collaborators as scripted doubles
pub struct ScriptedDeps {
    pub keygen: Arc<ScriptedKeygen>,
    pub secrets: Arc<ScriptedSecretStore>,
    pub loader: Arc<CountingUserLoader>,
    pub config_store: Arc<FailingConfigStore>,
    pub registry: Arc<ActiveDeviceRegistry>,
}

impl ScriptedDeps {
    /// Doubles whose loader serves `me`
    pub fn new(me: &UserSnapshot) -> Self {
        let config_store = Arc::new(FailingConfigStore::new());
        Self {
            keygen: Arc::new(ScriptedKeygen::new(1)),
            secrets: Arc::new(ScriptedSecretStore::new()),
            loader: Arc::new(CountingUserLoader::new(me.clone())),
            registry: Arc::new(ActiveDeviceRegistry::new(config_store.clone())),
            config_store,
        }
    }

    pub fn deps(&self) -> ProvisionDeps {
        ProvisionDeps {
            keygen: self.keygen.clone(),
            secrets: self.secrets.clone(),
            loader: self.loader.clone(),
            registry: self.registry.clone(),
        }
    }

    /// Calls made to any collaborator
    pub fn total_calls(&self) -> usize {
        self.keygen.generate_calls()
            + self.keygen.push_calls()
            + self.secrets.generate_calls()
            + self.secrets.sync_calls()
            + self.loader.calls()
            + self.config_store.saves()
    }
}

/// Salt used when a test needs a snapshot that differs only in salt
pub fn rotated_salt() -> Vec<u8> {
    let mut salt = TEST_SALT.to_vec();
    salt.reverse();
    salt
}
