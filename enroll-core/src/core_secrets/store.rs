//! Device secret store
//!
//! Hands out server halves during provisioning and, once a device is active,
//! mirrors the service-held half into an offline cache so the device can be
//! unlocked without a round trip.

use super::errors::SecretError;
use super::lksec::LocalKeySecurity;
use crate::core_device::ActiveDevice;
use crate::core_identity::DeviceId;
use crate::core_service::{DeviceSecrets, IdentityService, ServerHalf};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::debug;

/// Freshly generated server half, ready to be uploaded with the device's delegations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretHandle {
    pub server_half: ServerHalf,
    pub generation: u32,
}

#[async_trait]
pub trait LocalSecretStore: Send + Sync {
    /// Generate the server half of the local key security secret
    fn generate_server_half(&self) -> Result<SecretHandle, SecretError>;

    /// Download secrets for the active device for later offline use
    async fn sync_secrets(&self, device: &ActiveDevice) -> Result<(), SecretError>;
}

pub struct DeviceSecretStore {
    service: Arc<dyn IdentityService>,
    lks: Mutex<LocalKeySecurity>,
    offline: RwLock<HashMap<DeviceId, DeviceSecrets>>,
}

impl DeviceSecretStore {
    pub fn new(service: Arc<dyn IdentityService>, lks: LocalKeySecurity) -> Self {
        Self {
            service,
            lks: Mutex::new(lks),
            offline: RwLock::new(HashMap::new()),
        }
    }

    /// Secrets cached by the last successful sync for `device_id`
    pub async fn cached(&self, device_id: &DeviceId) -> Option<DeviceSecrets> {
        self.offline.read().await.get(device_id).cloned()
    }

    /// Encrypt with the current local key security secret
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, SecretError> {
        self.with_lks(|lks| lks.encrypt(plaintext))
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, SecretError> {
        self.with_lks(|lks| lks.decrypt(data))
    }

    fn with_lks<T>(
        &self,
        f: impl FnOnce(&mut LocalKeySecurity) -> Result<T, SecretError>,
    ) -> Result<T, SecretError> {
        // Halves are replaced whole, so a poisoned lock still holds a consistent value
        let mut lks = self.lks.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut lks)
    }
}

#[async_trait]
impl LocalSecretStore for DeviceSecretStore {
    fn generate_server_half(&self) -> Result<SecretHandle, SecretError> {
        self.with_lks(|lks| {
            let server_half = lks.generate_server_half()?;
            Ok(SecretHandle {
                server_half,
                generation: lks.generation(),
            })
        })
    }

    async fn sync_secrets(&self, device: &ActiveDevice) -> Result<(), SecretError> {
        let secrets = self
            .service
            .fetch_device_secrets(&device.uid(), &device.device_id())
            .await?;

        self.with_lks(|lks| {
            lks.set_server_half(secrets.server_half.clone(), secrets.generation);
            Ok(())
        })?;
        debug!(
            device_id = %device.device_id(),
            generation = secrets.generation,
            "Synced device secrets"
        );
        self.offline.write().await.insert(device.device_id(), secrets);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_service::LoopbackIdentityService;
    use crate::test_utils::fixtures::{provisioned_user, test_lks};

    #[test]
    fn test_generate_server_half_handle() {
        let service = Arc::new(LoopbackIdentityService::new());
        let store = DeviceSecretStore::new(service, test_lks());
        let first = store.generate_server_half().unwrap();
        let second = store.generate_server_half().unwrap();
        assert_eq!(first.generation, 1);
        assert_eq!(second.generation, 2);
        assert_ne!(first.server_half, second.server_half);
    }

    #[test]
    fn test_generate_server_half_without_client_half() {
        let service = Arc::new(LoopbackIdentityService::new());
        let store = DeviceSecretStore::new(service, LocalKeySecurity::new());
        assert!(matches!(
            store.generate_server_half(),
            Err(SecretError::MissingClientHalf)
        ));
    }

    #[tokio::test]
    async fn test_sync_caches_server_half() {
        let service = Arc::new(LoopbackIdentityService::new());
        let (active, half) = provisioned_user(&service).await;
        let store = DeviceSecretStore::new(service.clone(), test_lks());

        store.sync_secrets(&active).await.unwrap();

        let cached = store.cached(&active.device_id()).await.unwrap();
        assert_eq!(cached.server_half, half);
        let ct = store.encrypt(b"cached credentials").unwrap();
        assert_eq!(store.decrypt(&ct).unwrap(), b"cached credentials");
    }

    #[tokio::test]
    async fn test_sync_unknown_device_fails() {
        let service = Arc::new(LoopbackIdentityService::new());
        let (active, _) = provisioned_user(&service).await;
        let other = LoopbackIdentityService::new();
        let store = DeviceSecretStore::new(Arc::new(other), test_lks());

        assert!(matches!(
            store.sync_secrets(&active).await,
            Err(SecretError::Sync(_))
        ));
        assert!(store.cached(&active.device_id()).await.is_none());
    }
}
