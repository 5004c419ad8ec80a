//! Device Provisioner - orchestrates adding a device to a user's identity
//!
//! # Flow
//!
//! ```text
//! run():     eligibility -> device id -> server half -> generate keys -> push
//! switch:    refresh snapshot (eldest / self-provision only) -> swap -> sync secrets
//! ```
//!
//! One instance is one attempt. Key material and the device id, once set,
//! are never replaced. When the push fails the keys stay available and
//! [`DeviceProvisioner::push_keys`] retries only the push.

use super::args::ProvisionArgs;
use super::context::ProvisionContext;
use super::errors::{ProvisionError, ProvisionResult};
use super::keygen::{GeneratedKeys, KeyMaterialGenerator, KeygenArgs, PushArgs};
use super::state::{KeygenFailure, KeygenState};
use super::{STEP_PUSH_KEYS, STEP_REFRESH, STEP_REGISTER, STEP_SWAP, STEP_SYNC};
use crate::core_device::{ActiveDevice, ActiveDeviceRegistry, DeviceSwitch, SwapError, UserLoader};
use crate::core_identity::{DeviceId, DeviceIdentity, EncryptionKey, SigningKey, UserSnapshot};
use crate::core_secrets::{LocalSecretStore, SecretHandle};
use crate::metrics::{self, record_counter, Timer};
use crate::tracing::provision::{trace_keygen, trace_push, trace_step};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Collaborators of the provisioning flow
#[derive(Clone)]
pub struct ProvisionDeps {
    pub keygen: Arc<dyn KeyMaterialGenerator>,
    pub secrets: Arc<dyn LocalSecretStore>,
    pub loader: Arc<dyn UserLoader>,
    pub registry: Arc<ActiveDeviceRegistry>,
}

pub struct DeviceProvisioner {
    args: ProvisionArgs,
    deps: ProvisionDeps,
    sync_secrets_after_switch: bool,

    device_id: Option<DeviceId>,
    secret: Option<SecretHandle>,
    keys: Option<GeneratedKeys>,
    state: KeygenState,
}

impl DeviceProvisioner {
    pub fn new(args: ProvisionArgs, deps: ProvisionDeps) -> Self {
        Self {
            args,
            deps,
            sync_secrets_after_switch: true,
            device_id: None,
            secret: None,
            keys: None,
            state: KeygenState::NotStarted,
        }
    }

    /// Skip the best-effort secret sync after a switch
    pub fn with_secret_sync(mut self, enabled: bool) -> Self {
        self.sync_secrets_after_switch = enabled;
        self
    }

    pub fn device_id(&self) -> Option<DeviceId> {
        self.device_id
    }

    pub fn signing_key(&self) -> Option<&SigningKey> {
        self.keys.as_ref().map(|k| &k.signing_key)
    }

    pub fn encryption_key(&self) -> Option<&EncryptionKey> {
        self.keys.as_ref().map(|k| &k.encryption_key)
    }

    pub fn keys_generated(&self) -> bool {
        self.state.keys_generated()
    }

    pub fn state(&self) -> &KeygenState {
        &self.state
    }

    pub fn me(&self) -> &UserSnapshot {
        &self.args.me
    }

    /// Register the device and generate and push its keys. Does not switch
    /// the active device.
    pub async fn run(&mut self, ctx: &ProvisionContext) -> ProvisionResult<()> {
        if self.device_id.is_some() {
            return Err(ProvisionError::InvalidState(
                "provisioner already ran; use push_keys to retry".to_string(),
            ));
        }
        record_counter(metrics::PROVISION_ATTEMPTS, 1);
        let timer = Timer::new(metrics::PROVISION_RUN_DURATION);

        let op = trace_step("provision.run", ctx.trace());
        let result = self.register_and_generate(ctx).await;
        op.finish(&result);
        timer.stop();
        result
    }

    async fn register_and_generate(&mut self, ctx: &ProvisionContext) -> ProvisionResult<()> {
        ctx.check_cancelled(STEP_REGISTER).await?;
        self.register_device(ctx)?;
        self.generate_and_push_keys(ctx).await
    }

    /// Refuse to provision over a live device unless this is a self-provision
    pub fn check_eligibility(&self) -> ProvisionResult<()> {
        check_eligibility(&self.args.me, self.args.is_self_provision)
    }

    fn register_device(&mut self, ctx: &ProvisionContext) -> ProvisionResult<()> {
        let op = trace_step("provision.register_device", ctx.trace());
        let result = self
            .check_eligibility()
            .and_then(|_| self.args.validate())
            .and_then(|_| self.allocate_device_id())
            .and_then(|_| self.generate_local_secret());
        op.finish(&result);
        result
    }

    fn allocate_device_id(&mut self) -> ProvisionResult<DeviceId> {
        let id = DeviceId::generate()
            .map_err(|e| ProvisionError::Allocation(format!("device id: {}", e)))?;
        self.device_id = Some(id);
        debug!(device_id = %id, "Allocated device id");
        Ok(id)
    }

    fn generate_local_secret(&mut self) -> ProvisionResult<()> {
        let handle = self
            .deps
            .secrets
            .generate_server_half()
            .map_err(|e| ProvisionError::Allocation(format!("local secret: {}", e)))?;
        self.secret = Some(handle);
        Ok(())
    }

    /// Generate the device keys, then push them. Keys and the generated state
    /// are recorded before the push so a push failure never loses them.
    pub async fn generate_and_push_keys(&mut self, ctx: &ProvisionContext) -> ProvisionResult<()> {
        if self.state.keys_generated() {
            return Err(ProvisionError::InvalidState(
                "keys already generated; use push_keys to retry".to_string(),
            ));
        }
        let (device_id, secret) = match (self.device_id, self.secret.clone()) {
            (Some(id), Some(secret)) => (id, secret),
            _ => {
                return Err(ProvisionError::InvalidState(
                    "device must be registered before key generation".to_string(),
                ))
            }
        };

        let op = trace_keygen(ctx.trace(), &device_id, self.args.is_eldest);
        let generated = self.generate_keys(device_id, secret);
        op.finish(&generated);
        self.keys = Some(generated?);
        self.state = KeygenState::Generated;
        record_counter(metrics::PROVISION_KEYS_GENERATED, 1);

        self.push_keys(ctx).await
    }

    fn generate_keys(
        &mut self,
        device_id: DeviceId,
        secret: SecretHandle,
    ) -> ProvisionResult<GeneratedKeys> {
        let device = DeviceIdentity::new(device_id, self.args.device_name.clone(), self.args.device_type)
            .map_err(|e| ProvisionError::InvalidArgs(e.to_string()))?;
        let keygen_args = KeygenArgs {
            me: self.args.me.clone(),
            device,
            secret,
            is_eldest: self.args.is_eldest,
            is_self_provision: self.args.is_self_provision,
            keyring: self.args.keyring.clone(),
        };
        self.deps.keygen.generate(&keygen_args).map_err(|e| {
            self.state = KeygenState::Failed(KeygenFailure::Generation(e.to_string()));
            ProvisionError::KeyGeneration(e)
        })
    }

    /// Push already generated keys. Safe to call again after a failed push.
    pub async fn push_keys(&mut self, ctx: &ProvisionContext) -> ProvisionResult<()> {
        let keys = match (&self.keys, &self.state) {
            (Some(keys), state) if state.needs_push() => keys,
            (_, KeygenState::Pushed) => {
                return Err(ProvisionError::InvalidState("keys already pushed".to_string()))
            }
            _ => {
                return Err(ProvisionError::InvalidState(
                    "no generated keys to push".to_string(),
                ))
            }
        };

        let op = trace_push(
            ctx.trace(),
            &keys.device.id(),
            self.args.signer.as_ref().map(|s| s.kid()),
        );
        let timer = Timer::new(metrics::PROVISION_PUSH_DURATION);
        let push_args = PushArgs {
            signer: self.args.signer.as_ref(),
            eldest_kid: self.args.eldest_kid.as_ref(),
        };
        let keygen = &self.deps.keygen;
        let result = ctx
            .guard(STEP_PUSH_KEYS, async {
                keygen
                    .push(keys, push_args)
                    .await
                    .map_err(ProvisionError::DelegationPush)
            })
            .await;
        timer.stop();
        op.finish(&result);

        match result {
            Ok(ack) => {
                self.state = KeygenState::Pushed;
                record_counter(metrics::PROVISION_PUSH_SUCCESS, 1);
                info!(seqno = ack.seqno, "Device keys pushed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to push device keys; keys are kept for retry");
                record_counter(metrics::PROVISION_PUSH_FAILED, 1);
                self.state = KeygenState::Failed(KeygenFailure::Push(e.to_string()));
                Err(e)
            }
        }
    }

    /// Reload the user snapshot when the cached one is known to be stale
    /// (eldest or self-provision); otherwise keep it
    pub async fn refresh_user_snapshot(&mut self, ctx: &ProvisionContext) -> ProvisionResult<()> {
        if !(self.args.is_eldest || self.args.is_self_provision) {
            debug!("Reusing cached user snapshot");
            return Ok(());
        }

        let op = trace_step("provision.refresh_user", ctx.trace());
        let uid = self.args.me.uid();
        let loader = &self.deps.loader;
        let result = ctx
            .guard(STEP_REFRESH, async {
                loader
                    .load(&uid)
                    .await
                    .map_err(ProvisionError::SnapshotRefresh)
            })
            .await;
        op.finish(&result);

        self.args.me = result?;
        record_counter(metrics::PROVISION_SNAPSHOT_REFRESHES, 1);
        Ok(())
    }

    /// Make the new device the active one, then best-effort sync its secrets
    pub async fn switch_config_and_active_device(
        &mut self,
        ctx: &ProvisionContext,
    ) -> ProvisionResult<Arc<ActiveDevice>> {
        let (device_id, signing_key, encryption_key) = match (self.device_id, &self.keys) {
            (Some(id), Some(keys)) if self.state.is_pushed() => {
                (id, keys.signing_key.clone(), keys.encryption_key.clone())
            }
            _ => {
                return Err(ProvisionError::InvalidState(format!(
                    "cannot activate device with keys {}",
                    self.state
                )))
            }
        };

        self.refresh_user_snapshot(ctx).await?;
        ctx.check_cancelled(STEP_SWAP).await?;

        let op = trace_step("provision.swap_active_device", ctx.trace());
        let result = self.swap_active_device(device_id, signing_key, encryption_key);
        op.finish(&result);
        let active = result?;

        if self.sync_secrets_after_switch {
            self.sync_secrets(ctx, &active).await?;
        }
        Ok(active)
    }

    fn swap_active_device(
        &self,
        device_id: DeviceId,
        signing_key: SigningKey,
        encryption_key: EncryptionKey,
    ) -> ProvisionResult<Arc<ActiveDevice>> {
        let me = &self.args.me;
        let salt = me.salt().map_err(|e| SwapError::Invalid(e.to_string()))?;
        let switch = DeviceSwitch {
            user_version: me.user_version(),
            normalized_name: me.normalized_name(),
            salt: salt.to_vec(),
            device_id,
            device_name: self.args.device_name.clone(),
            signing_key,
            encryption_key,
        };
        match self.deps.registry.swap(switch) {
            Ok(active) => {
                record_counter(metrics::PROVISION_SWAPS, 1);
                Ok(active)
            }
            Err(e) => {
                record_counter(metrics::PROVISION_SWAP_FAILED, 1);
                Err(e.into())
            }
        }
    }

    /// Failures are logged and swallowed; only cancellation propagates
    async fn sync_secrets(
        &self,
        ctx: &ProvisionContext,
        active: &ActiveDevice,
    ) -> ProvisionResult<()> {
        let op = trace_step("provision.sync_secrets", ctx.trace());
        let secrets = &self.deps.secrets;
        let result = ctx
            .guard(STEP_SYNC, async {
                secrets
                    .sync_secrets(active)
                    .await
                    .map_err(ProvisionError::SecretSync)
            })
            .await;
        op.finish(&result);

        match result {
            Ok(()) => Ok(()),
            Err(e @ ProvisionError::Cancelled { .. }) => Err(e),
            Err(e) => {
                warn!(error = %e, "Failed to sync secrets after device switch");
                record_counter(metrics::PROVISION_SECRET_SYNC_FAILED, 1);
                Ok(())
            }
        }
    }
}

/// Eligibility guard shared by [`DeviceProvisioner::run`] and callers that
/// want to check before building a provisioner
pub fn check_eligibility(me: &UserSnapshot, is_self_provision: bool) -> ProvisionResult<()> {
    if me.has_current_device_in_current_install() && !is_self_provision {
        record_counter(metrics::PROVISION_ALREADY_PROVISIONED, 1);
        return Err(ProvisionError::AlreadyProvisioned {
            username: me.username().to_string(),
        });
    }
    Ok(())
}
