//! Process-wide active device registry
//!
//! Readers take a snapshot `Arc` of the active device; [`ActiveDeviceRegistry::swap`]
//! is the only mutator. A swap validates the new record, persists the user
//! config, and only then publishes the new pointer, so readers observe either
//! the old device or the new one and a failed swap changes nothing.

use super::active::{ActiveDevice, DeviceSwitch, UserConfig};
use super::config_store::UserConfigStore;
use super::errors::SwapError;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info};

pub struct ActiveDeviceRegistry {
    current: RwLock<Option<Arc<ActiveDevice>>>,
    /// Serializes swaps; held across persist + publish
    writer: Mutex<()>,
    store: Arc<dyn UserConfigStore>,
}

impl ActiveDeviceRegistry {
    pub fn new(store: Arc<dyn UserConfigStore>) -> Self {
        Self {
            current: RwLock::new(None),
            writer: Mutex::new(()),
            store,
        }
    }

    /// The active device, if any
    pub fn current(&self) -> Option<Arc<ActiveDevice>> {
        self.current
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// The user config persisted by the last successful swap (possibly by an
    /// earlier process)
    pub fn persisted(&self) -> Result<Option<UserConfig>, SwapError> {
        self.store.load()
    }

    /// Atomically make `switch` the active device
    pub fn swap(&self, switch: DeviceSwitch) -> Result<Arc<ActiveDevice>, SwapError> {
        switch.validate()?;
        let next = Arc::new(ActiveDevice::from(switch));

        let _writer = self.writer.lock().unwrap_or_else(|p| p.into_inner());
        self.store.save(&next.user_config())?;

        let previous = {
            let mut current = self.current.write().unwrap_or_else(|p| p.into_inner());
            std::mem::replace(&mut *current, Some(next.clone()))
        };

        if let Some(prev) = previous {
            debug!(device_id = %prev.device_id(), "Replaced active device");
        }
        info!(
            uid = %next.uid(),
            device_id = %next.device_id(),
            device_name = %next.device_name(),
            "Switched active device"
        );
        Ok(next)
    }
}
