//! In-process identity service
//!
//! Keeps every user's key chain in memory and enforces the same rules the remote
//! service does: signatures, signer authority, seqno ordering. Used by the CLI in
//! offline mode and by tests.

use super::errors::{ServiceError, ServiceResult};
use super::types::{DelegationBatch, DeviceSecrets, PushAck};
use super::IdentityService;
use crate::core_identity::{DeviceId, UserId, UserSnapshot};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct UserRecord {
    snapshot: UserSnapshot,
    secrets: HashMap<DeviceId, DeviceSecrets>,
}

/// In-memory identity service
#[derive(Debug, Default)]
pub struct LoopbackIdentityService {
    users: RwLock<HashMap<UserId, UserRecord>>,
}

impl LoopbackIdentityService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an account with an empty key chain (the signup step)
    pub async fn register_user(&self, username: &str, salt: Vec<u8>) -> ServiceResult<UserSnapshot> {
        let snapshot = UserSnapshot::new(username, salt);
        let mut users = self.users.write().await;
        if users.contains_key(&snapshot.uid()) {
            return Err(ServiceError::UserExists(username.to_string()));
        }
        info!(uid = %snapshot.uid(), username = %username, "Registered user");
        users.insert(
            snapshot.uid(),
            UserRecord {
                snapshot: snapshot.clone(),
                secrets: HashMap::new(),
            },
        );
        Ok(snapshot)
    }
}

#[async_trait]
impl IdentityService for LoopbackIdentityService {
    async fn post_delegations(&self, batch: &DelegationBatch) -> ServiceResult<PushAck> {
        let mut users = self.users.write().await;
        let record = users
            .get_mut(&batch.uid)
            .ok_or(ServiceError::UserNotFound(batch.uid))?;

        if batch.links.iter().any(|l| l.body.uid != batch.uid) {
            return Err(ServiceError::Rejected("link for another user".to_string()));
        }

        let mut chain = record.snapshot.key_chain().clone();
        for link in &batch.links {
            chain.apply(link).map_err(|e| {
                warn!(uid = %batch.uid, seqno = link.body.seqno, error = %e, "Rejected delegation");
                ServiceError::from(e)
            })?;
        }

        if let Some(upload) = &batch.lks_server_half {
            if !chain.has_active_device(&upload.device_id) {
                return Err(ServiceError::Rejected(format!(
                    "server half for unknown device {}",
                    upload.device_id
                )));
            }
            record.secrets.insert(
                upload.device_id,
                DeviceSecrets {
                    device_id: upload.device_id,
                    server_half: upload.server_half.clone(),
                    generation: upload.generation,
                },
            );
        }

        let seqno = chain.seqno();
        record.snapshot = record.snapshot.clone().with_key_chain(chain);
        debug!(uid = %batch.uid, seqno, links = batch.links.len(), "Applied delegation batch");
        Ok(PushAck { seqno })
    }

    async fn load_user(&self, uid: &UserId) -> ServiceResult<UserSnapshot> {
        self.users
            .read()
            .await
            .get(uid)
            .map(|r| r.snapshot.clone())
            .ok_or(ServiceError::UserNotFound(*uid))
    }

    async fn fetch_device_secrets(
        &self,
        uid: &UserId,
        device_id: &DeviceId,
    ) -> ServiceResult<DeviceSecrets> {
        let users = self.users.read().await;
        let record = users.get(uid).ok_or(ServiceError::UserNotFound(*uid))?;
        record
            .secrets
            .get(device_id)
            .cloned()
            .ok_or_else(|| ServiceError::SecretsNotFound(device_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_identity::{
        unix_now, DelegationBody, DelegationKind, DeviceIdentity, DeviceType, SignedDelegation,
        SigningKey,
    };
    use crate::core_service::{ServerHalf, ServerHalfUpload};

    fn eldest_batch(uid: UserId, key: &SigningKey, device: &DeviceIdentity) -> DelegationBatch {
        let body = DelegationBody {
            kind: DelegationKind::Eldest,
            uid,
            username: "alice".to_string(),
            seqno: 1,
            eldest_kid: key.kid().clone(),
            signer_kid: key.kid().clone(),
            delegated_kid: key.kid().clone(),
            device: Some(device.clone()),
            ctime: unix_now(),
        };
        DelegationBatch {
            uid,
            links: vec![SignedDelegation::sign(body, key, None).unwrap()],
            lks_server_half: Some(ServerHalfUpload {
                device_id: device.id(),
                server_half: ServerHalf::new(vec![1u8; 32]),
                generation: 1,
            }),
        }
    }

    #[tokio::test]
    async fn test_register_and_load() {
        let service = LoopbackIdentityService::new();
        let me = service.register_user("alice", b"salt".to_vec()).await.unwrap();
        let loaded = service.load_user(&me.uid()).await.unwrap();
        assert_eq!(loaded, me);
        assert!(service.register_user("Alice", vec![1]).await.is_err());
    }

    #[tokio::test]
    async fn test_post_eldest_stores_server_half() {
        let service = LoopbackIdentityService::new();
        let me = service.register_user("alice", b"salt".to_vec()).await.unwrap();
        let key = SigningKey::generate().unwrap();
        let device =
            DeviceIdentity::new(DeviceId::generate().unwrap(), "laptop", DeviceType::Desktop)
                .unwrap();

        let ack = service
            .post_delegations(&eldest_batch(me.uid(), &key, &device))
            .await
            .unwrap();
        assert_eq!(ack.seqno, 1);

        let loaded = service.load_user(&me.uid()).await.unwrap();
        assert_eq!(loaded.key_chain().eldest_kid(), Some(key.kid()));

        let secrets = service.fetch_device_secrets(&me.uid(), &device.id()).await.unwrap();
        assert_eq!(secrets.server_half.as_bytes(), &[1u8; 32]);
    }

    #[tokio::test]
    async fn test_rejected_batch_changes_nothing() {
        let service = LoopbackIdentityService::new();
        let me = service.register_user("alice", b"salt".to_vec()).await.unwrap();
        let key = SigningKey::generate().unwrap();
        let device =
            DeviceIdentity::new(DeviceId::generate().unwrap(), "laptop", DeviceType::Desktop)
                .unwrap();
        let mut batch = eldest_batch(me.uid(), &key, &device);
        batch.links[0].body.seqno = 5;

        assert!(matches!(
            service.post_delegations(&batch).await,
            Err(ServiceError::Rejected(_))
        ));
        let loaded = service.load_user(&me.uid()).await.unwrap();
        assert!(loaded.key_chain().is_empty());
        assert!(service.fetch_device_secrets(&me.uid(), &device.id()).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let service = LoopbackIdentityService::new();
        let uid = UserId::from_username("nobody");
        assert!(matches!(
            service.load_user(&uid).await,
            Err(ServiceError::UserNotFound(_))
        ));
    }
}
