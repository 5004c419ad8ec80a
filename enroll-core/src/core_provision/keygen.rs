//! Device key generation and delegation
//!
//! [`KeyMaterialGenerator`] is the narrow capability the provisioner depends
//! on. [`DeviceKeygen`] is the production implementation: it creates an
//! Ed25519 signing key and an X25519 encryption key, and on push signs the
//! delegations binding both into the user's key chain.
//!
//! Links posted for a device, in order:
//! - eldest device: `eldest` (self-signed), then `subkey` signed by the new signing key
//! - other devices: `sibkey` signed by the existing signer and reverse-signed
//!   by the new key, then `subkey` signed by the new signing key

use super::args::KeyringRefs;
use crate::core_identity::{
    unix_now, DelegationBody, DelegationKind, DeviceIdentity, EncryptionKey, IdentityError, KeyId,
    SignedDelegation, SigningKey, UserId, UserSnapshot,
};
use crate::core_secrets::SecretHandle;
use crate::core_service::{
    DelegationBatch, IdentityService, PushAck, ServerHalfUpload, ServiceError,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum KeygenError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("No keys have been generated")]
    NotGenerated,

    #[error("Invalid push arguments: {0}")]
    InvalidPush(String),
}

/// Everything the generator needs to create a device's keys
#[derive(Debug, Clone)]
pub struct KeygenArgs {
    pub me: UserSnapshot,
    pub device: DeviceIdentity,
    pub secret: SecretHandle,
    pub is_eldest: bool,
    pub is_self_provision: bool,
    pub keyring: KeyringRefs,
}

/// Authorization for a push
#[derive(Debug, Clone, Copy)]
pub struct PushArgs<'a> {
    pub signer: Option<&'a SigningKey>,
    pub eldest_kid: Option<&'a KeyId>,
}

/// Keys produced by [`KeyMaterialGenerator::generate`] together with the
/// context needed to delegate them
#[derive(Debug, Clone)]
pub struct GeneratedKeys {
    pub uid: UserId,
    pub username: String,
    /// Key chain seqno the delegations build on
    pub base_seqno: u64,
    pub device: DeviceIdentity,
    pub is_eldest: bool,
    pub signing_key: SigningKey,
    pub encryption_key: EncryptionKey,
    pub secret: SecretHandle,
}

#[async_trait]
pub trait KeyMaterialGenerator: Send + Sync {
    /// Create the device's key pairs. Local only.
    fn generate(&self, args: &KeygenArgs) -> Result<GeneratedKeys, KeygenError>;

    /// Delegate previously generated keys on the identity service
    async fn push(&self, keys: &GeneratedKeys, args: PushArgs<'_>) -> Result<PushAck, KeygenError>;
}

/// Holds no key material: generated keys are owned by the caller
pub struct DeviceKeygen {
    service: Arc<dyn IdentityService>,
}

impl DeviceKeygen {
    pub fn new(service: Arc<dyn IdentityService>) -> Self {
        Self { service }
    }

    /// Sign all links for `keys`
    pub fn build_batch(
        &self,
        keys: &GeneratedKeys,
        args: PushArgs<'_>,
    ) -> Result<DelegationBatch, KeygenError> {
        let new_kid = keys.signing_key.kid();
        let body = |kind, seqno, eldest_kid: &KeyId, signer_kid: &KeyId, delegated_kid: &KeyId| {
            DelegationBody {
                kind,
                uid: keys.uid,
                username: keys.username.clone(),
                seqno,
                eldest_kid: eldest_kid.clone(),
                signer_kid: signer_kid.clone(),
                delegated_kid: delegated_kid.clone(),
                device: Some(keys.device.clone()),
                ctime: unix_now(),
            }
        };

        let (signing_link, eldest_kid) = if keys.is_eldest {
            let link = SignedDelegation::sign(
                body(DelegationKind::Eldest, keys.base_seqno + 1, new_kid, new_kid, new_kid),
                &keys.signing_key,
                None,
            )?;
            (link, new_kid.clone())
        } else {
            let signer = args.signer.ok_or_else(|| {
                KeygenError::InvalidPush("signer required for a sibkey".to_string())
            })?;
            let eldest_kid = args.eldest_kid.ok_or_else(|| {
                KeygenError::InvalidPush("eldest kid required for a sibkey".to_string())
            })?;
            let link = SignedDelegation::sign(
                body(DelegationKind::Sibkey, keys.base_seqno + 1, eldest_kid, signer.kid(), new_kid),
                signer,
                Some(&keys.signing_key),
            )?;
            (link, eldest_kid.clone())
        };

        let encryption_link = SignedDelegation::sign(
            body(
                DelegationKind::Subkey,
                keys.base_seqno + 2,
                &eldest_kid,
                new_kid,
                keys.encryption_key.kid(),
            ),
            &keys.signing_key,
            None,
        )?;

        Ok(DelegationBatch {
            uid: keys.uid,
            links: vec![signing_link, encryption_link],
            lks_server_half: Some(ServerHalfUpload {
                device_id: keys.device.id(),
                server_half: keys.secret.server_half.clone(),
                generation: keys.secret.generation,
            }),
        })
    }
}

#[async_trait]
impl KeyMaterialGenerator for DeviceKeygen {
    fn generate(&self, args: &KeygenArgs) -> Result<GeneratedKeys, KeygenError> {
        let keys = GeneratedKeys {
            uid: args.me.uid(),
            username: args.me.username().to_string(),
            base_seqno: args.me.key_chain().seqno(),
            device: args.device.clone(),
            is_eldest: args.is_eldest,
            signing_key: SigningKey::generate()?,
            encryption_key: EncryptionKey::generate()?,
            secret: args.secret.clone(),
        };
        debug!(
            device_id = %keys.device.id(),
            signing_kid = %keys.signing_key.kid(),
            encryption_kid = %keys.encryption_key.kid(),
            self_provision = args.is_self_provision,
            per_user_keyring = ?args.keyring.per_user_keyring,
            "Generated device keys"
        );
        Ok(keys)
    }

    async fn push(&self, keys: &GeneratedKeys, args: PushArgs<'_>) -> Result<PushAck, KeygenError> {
        let batch = self.build_batch(keys, args)?;
        Ok(self.service.post_delegations(&batch).await?)
    }
}
