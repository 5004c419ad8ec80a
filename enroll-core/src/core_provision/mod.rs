//! Device provisioning
//!
//! [`DeviceProvisioner`] adds a new device to a user's identity: it allocates
//! a device id and local secret, generates the device's signing and
//! encryption keys, delegates them on the identity service, and finally makes
//! the device the process-wide active device.
//!
//! Collaborators are injected as trait objects ([`ProvisionDeps`]) so tests
//! can script them.

mod args;
mod context;
mod errors;
mod keygen;
mod provisioner;
mod state;

pub use args::{KeyringRefs, ProvisionArgs, ProvisionArgsBuilder};
pub use context::ProvisionContext;
pub use errors::{ProvisionError, ProvisionResult};
pub use keygen::{
    DeviceKeygen, GeneratedKeys, KeyMaterialGenerator, KeygenArgs, KeygenError, PushArgs,
};
pub use provisioner::{check_eligibility, DeviceProvisioner, ProvisionDeps};
pub use state::{KeygenFailure, KeygenState};

/// Step names used for tracing and cancellation errors
pub const STEP_REGISTER: &str = "register_device";
pub const STEP_PUSH_KEYS: &str = "push_keys";
pub const STEP_REFRESH: &str = "refresh_user";
pub const STEP_SWAP: &str = "swap_active_device";
pub const STEP_SYNC: &str = "sync_secrets";

#[cfg(test)]
mod tests;
