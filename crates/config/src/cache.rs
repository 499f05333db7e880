//! Reloadable configuration cache.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use crate::{AppConfig, ConfigError};

/// Caches the parsed configuration for one file path.
///
/// `get(false)` returns the cached value when present; `get(true)` re-reads
/// the file (plus environment overrides) and replaces the cached value only
/// if the new one is valid.
#[derive(Debug)]
pub struct ConfigCache {
    path: PathBuf,
    apply_env: bool,
    current: Mutex<Option<Arc<AppConfig>>>,
}

impl ConfigCache {
    /// Cache for `path` with environment overrides applied on every load.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            apply_env: true,
            current: Mutex::new(None),
        }
    }

    /// Cache that reads the file only, ignoring the process environment.
    pub fn file_only(path: impl Into<PathBuf>) -> Self {
        Self {
            apply_env: false,
            ..Self::new(path)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<AppConfig>>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, force_reload: bool) -> Result<Arc<AppConfig>, ConfigError> {
        let mut slot = self.slot();
        if !force_reload {
            if let Some(config) = slot.as_ref() {
                return Ok(Arc::clone(config));
            }
        }

        let loaded = if self.apply_env {
            AppConfig::load_with_env(&self.path)?
        } else {
            AppConfig::load_from(&self.path)?
        };
        let loaded = Arc::new(loaded);
        *slot = Some(Arc::clone(&loaded));
        tracing::debug!(path = %self.path.display(), force_reload, "Configuration loaded");
        Ok(loaded)
    }

    /// Drop the cached value; the next `get` reloads from disk.
    pub fn invalidate(&self) {
        self.slot().take();
    }

    pub fn is_loaded(&self) -> bool {
        self.slot().is_some()
    }
}
