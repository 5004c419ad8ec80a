//! Device enrollment for a key-chain based identity system.
//!
//! [`core_provision::DeviceProvisioner`] registers a new device for a user,
//! delegates fresh signing and encryption keys to it through the identity
//! service and switches the process-wide active device over to it.

pub mod config;
pub mod core_device;
pub mod core_identity;
pub mod core_provision;
pub mod core_secrets;
pub mod core_service;
pub mod logging;
pub mod metrics;
pub mod shutdown;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod tracing;

pub use crate::config::Config;
pub use crate::core_device::{ActiveDevice, ActiveDeviceRegistry};
pub use crate::core_provision::{
    DeviceProvisioner, ProvisionArgs, ProvisionContext, ProvisionDeps, ProvisionError,
    ProvisionResult,
};
pub use crate::logging::{init_logging, LogLevel};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        // Ensure the main exports are accessible
        let _ = LogLevel::Info;
        let _ = Config::default();
        let _ = ProvisionContext::default();
    }
}
