//! Provisioning arguments

use super::errors::{ProvisionError, ProvisionResult};
use crate::core_identity::{validate_device_name, DeviceType, KeyId, SigningKey, UserSnapshot};

/// Opaque references handed to the key generator untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyringRefs {
    pub per_user_keyring: Option<String>,
    pub ephemeral_rebox: Option<String>,
}

/// Inputs of one provisioning attempt
#[derive(Debug, Clone)]
pub struct ProvisionArgs {
    pub me: UserSnapshot,
    pub device_name: String,
    pub device_type: DeviceType,
    /// First device of a brand new identity
    pub is_eldest: bool,
    /// An existing device re-establishing its own keys
    pub is_self_provision: bool,
    /// Existing key that signs the new device's delegation; absent only for eldest
    pub signer: Option<SigningKey>,
    pub eldest_kid: Option<KeyId>,
    pub keyring: KeyringRefs,
}

impl ProvisionArgs {
    pub fn builder(me: UserSnapshot, device_name: impl Into<String>) -> ProvisionArgsBuilder {
        ProvisionArgsBuilder {
            args: ProvisionArgs {
                me,
                device_name: device_name.into(),
                device_type: DeviceType::default(),
                is_eldest: false,
                is_self_provision: false,
                signer: None,
                eldest_kid: None,
                keyring: KeyringRefs::default(),
            },
        }
    }

    pub fn validate(&self) -> ProvisionResult<()> {
        validate_device_name(&self.device_name)
            .map_err(|e| ProvisionError::InvalidArgs(e.to_string()))?;

        if self.is_eldest {
            if self.is_self_provision {
                return Err(ProvisionError::InvalidArgs(
                    "an eldest device cannot self-provision".to_string(),
                ));
            }
            if self.signer.is_some() {
                return Err(ProvisionError::InvalidArgs(
                    "eldest device is self-signed, no signer allowed".to_string(),
                ));
            }
            return Ok(());
        }

        if self.signer.is_none() {
            return Err(ProvisionError::InvalidArgs(
                "signer required for a non-eldest device".to_string(),
            ));
        }
        if self.eldest_kid.is_none() {
            return Err(ProvisionError::InvalidArgs(
                "eldest kid required for a non-eldest device".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct ProvisionArgsBuilder {
    args: ProvisionArgs,
}

impl ProvisionArgsBuilder {
    pub fn device_type(mut self, device_type: DeviceType) -> Self {
        self.args.device_type = device_type;
        self
    }

    pub fn eldest(mut self) -> Self {
        self.args.is_eldest = true;
        self
    }

    pub fn self_provision(mut self) -> Self {
        self.args.is_self_provision = true;
        self
    }

    pub fn signer(mut self, signer: SigningKey) -> Self {
        self.args.signer = Some(signer);
        self
    }

    pub fn eldest_kid(mut self, kid: KeyId) -> Self {
        self.args.eldest_kid = Some(kid);
        self
    }

    pub fn keyring(mut self, keyring: KeyringRefs) -> Self {
        self.args.keyring = keyring;
        self
    }

    /// Validate and build
    pub fn build(self) -> ProvisionResult<ProvisionArgs> {
        self.args.validate()?;
        Ok(self.args)
    }
}
