//! Persisted user config stores

use super::active::UserConfig;
use super::errors::SwapError;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Storage for the persisted [`UserConfig`]. `save` must replace the
/// previous config entirely or leave it untouched.
pub trait UserConfigStore: Send + Sync {
    fn load(&self) -> Result<Option<UserConfig>, SwapError>;
    fn save(&self, config: &UserConfig) -> Result<(), SwapError>;
}

/// JSON file store
pub struct FileUserConfigStore {
    path: PathBuf,
}

impl FileUserConfigStore {
    /// Store at `dir/file_name`, creating `dir` if needed
    pub fn new(dir: impl AsRef<Path>, file_name: &str) -> Result<Self, SwapError> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            path: dir.as_ref().join(file_name),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write file atomically: the temp file is flushed to disk before it
    /// replaces the target, so a crash leaves either the old or the new config
    fn write_atomic(&self, data: &[u8]) -> Result<(), SwapError> {
        let temp_path = self.path.with_extension("tmp");
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;

        // Persist the directory entry too
        #[cfg(unix)]
        {
            if let Some(dir) = self.path.parent().and_then(|p| File::open(p).ok()) {
                let _ = dir.sync_all();
            }
        }
        Ok(())
    }
}

impl UserConfigStore for FileUserConfigStore {
    fn load(&self) -> Result<Option<UserConfig>, SwapError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = fs::read(&self.path)?;
        Ok(Some(serde_json::from_slice(&data)?))
    }

    fn save(&self, config: &UserConfig) -> Result<(), SwapError> {
        let data = serde_json::to_vec_pretty(config)?;
        self.write_atomic(&data)
    }
}

/// In-memory store
#[derive(Default)]
pub struct MemoryUserConfigStore {
    config: Mutex<Option<UserConfig>>,
}

impl MemoryUserConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserConfigStore for MemoryUserConfigStore {
    fn load(&self) -> Result<Option<UserConfig>, SwapError> {
        let config = self.config.lock().unwrap_or_else(|p| p.into_inner());
        Ok(config.clone())
    }

    fn save(&self, config: &UserConfig) -> Result<(), SwapError> {
        *self.config.lock().unwrap_or_else(|p| p.into_inner()) = Some(config.clone());
        Ok(())
    }
}
