//! Identity management module
//!
//! Value types for users, devices and device keys, and the key chain that binds
//! them together:
//! - [`DeviceId`], [`DeviceIdentity`], [`DeviceType`]: who a device is
//! - [`SigningKey`], [`EncryptionKey`], [`KeyId`]: what a device holds
//! - [`SignedDelegation`], [`KeyChain`]: how keys are authorized
//! - [`UserSnapshot`]: the client's copy of a user

mod delegation;
mod device;
mod device_id;
mod error;
mod key_chain;
mod key_id;
mod keypair;
mod keys;
mod user;
mod user_id;

pub use delegation::{unix_now, DelegationBody, DelegationKind, SignedDelegation};
pub(crate) use delegation::hex_bytes;
pub use device::{validate_device_name, DeviceIdentity, DeviceType};
pub use device_id::{DeviceId, DEVICE_ID_LEN, DEVICE_ID_SUFFIX};
pub use error::IdentityError;
pub use key_chain::{DeviceRecord, KeyChain};
pub use key_id::KeyId;
pub use keypair::{KeyType, Keypair};
pub use keys::{verify_with_kid, EncryptionKey, SigningKey};
pub use user::{UserSnapshot, UserVersion};
pub use user_id::UserId;

#[cfg(test)]
mod tests;
