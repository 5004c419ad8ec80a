//! Active device management
//!
//! The [`ActiveDeviceRegistry`] is the single place the running client asks
//! "which device am I?". It is backed by a persisted [`UserConfig`].

mod active;
mod config_store;
mod errors;
mod loader;
mod registry;

pub use active::{ActiveDevice, DeviceSwitch, UserConfig};
pub use config_store::{FileUserConfigStore, MemoryUserConfigStore, UserConfigStore};
pub use errors::SwapError;
pub use loader::{ServiceUserLoader, UserLoader};
pub use registry::ActiveDeviceRegistry;

#[cfg(test)]
mod tests;
