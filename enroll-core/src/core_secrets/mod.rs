//! Local secret store
//!
//! [`LocalKeySecurity`] splits a device secret between this install and the
//! identity service. [`DeviceSecretStore`] is the [`LocalSecretStore`] used by
//! the provisioning flow.

mod errors;
mod lksec;
mod store;

pub use errors::SecretError;
pub use lksec::{LocalKeySecurity, LKS_SECRET_LEN};
pub use store::{DeviceSecretStore, LocalSecretStore, SecretHandle};
