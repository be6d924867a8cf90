//! Config loading, validation, and store construction.

use super::model::StoreConfig;
use crate::backends::{FileBackend, MemoryBackend, RedisBackend, TextBackend, compressed};
use crate::error::{MapError, Result};
use crate::locks::LockSettings;
use crate::map::{BackendKind, Map, StorageBackend};
use crate::queue::Queue;
use std::path::{Path, PathBuf};
use std::time::Duration;

impl StoreConfig {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    /// Relative `path` values are resolved against the file's directory.
    ///
    /// # Returns
    ///
    /// * `Ok(StoreConfig)` - Successfully loaded and validated config
    /// * `Err(MapError::UserError)` - Read error, parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            MapError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let mut config = Self::from_yaml(&content)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Parse config from a YAML string.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: StoreConfig = serde_yaml::from_str(yaml)
            .map_err(|e| MapError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| MapError::UserError(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `name` must be non-empty and contain no whitespace or `:`
    /// - `lock_timeout_ms` and `poll_interval_ms` must be positive
    /// - `poll_interval_ms` must not exceed `lock_timeout_ms`
    /// - `compression_level` must be within 1..=22
    /// - `path` must be non-empty for filesystem backends
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> {
            Err(MapError::UserError(format!("config validation failed: {}", msg)))
        };

        if self.name.is_empty() {
            return invalid("name must be non-empty".to_string());
        }
        if self.name.contains(|c: char| c.is_whitespace() || c == ':') {
            return invalid(format!(
                "name '{}' must not contain whitespace or ':'",
                self.name
            ));
        }

        if self.lock_timeout_ms == 0 {
            return invalid("lock_timeout_ms must be greater than 0".to_string());
        }
        if self.poll_interval_ms == 0 {
            return invalid("poll_interval_ms must be greater than 0".to_string());
        }
        if self.poll_interval_ms > self.lock_timeout_ms {
            return invalid(format!(
                "poll_interval_ms ({}) must not exceed lock_timeout_ms ({})",
                self.poll_interval_ms, self.lock_timeout_ms
            ));
        }

        if !compressed::is_valid_level(self.compression_level) {
            return invalid(format!(
                "compression_level must be between {} and {} (found {})",
                compressed::MIN_LEVEL,
                compressed::MAX_LEVEL,
                self.compression_level
            ));
        }

        if self.backend.is_shared() && self.backend != BackendKind::Redis && self.path.is_empty() {
            return invalid(format!("path is required for the {} backend", self.backend));
        }

        Ok(())
    }

    /// Lock timing derived from the config.
    pub fn lock_settings(&self) -> LockSettings {
        LockSettings {
            timeout: Duration::from_millis(self.lock_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            stale_after: (self.lock_stale_minutes > 0)
                .then(|| Duration::from_secs(u64::from(self.lock_stale_minutes) * 60)),
        }
    }

    /// Storage directory with relative paths resolved.
    pub fn store_dir(&self) -> PathBuf {
        let path = PathBuf::from(&self.path);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }

    /// Build the configured backend. Nothing is touched until the map connects.
    pub fn open_backend(&self) -> Result<Box<dyn StorageBackend>> {
        let backend: Box<dyn StorageBackend> = match self.backend {
            BackendKind::Memory => Box::new(MemoryBackend::new()),
            BackendKind::File => Box::new(FileBackend::new(self.store_dir())),
            BackendKind::Compressed => {
                Box::new(FileBackend::compressed(self.store_dir(), self.compression_level))
            }
            BackendKind::Text => Box::new(TextBackend::new(self.store_dir())),
            BackendKind::Redis => Box::new(RedisBackend::new(&self.redis_url, &self.name)?),
        };
        Ok(backend)
    }

    /// Build the configured map, optionally with a fixed owner id.
    pub fn open_map(&self, owner: Option<&str>) -> Result<Map> {
        let mut builder =
            Map::builder(&self.name, self.open_backend()?).settings(self.lock_settings());
        if let Some(owner) = owner {
            builder = builder.owner(owner);
        }
        Ok(builder.build())
    }

    /// Build the configured queue.
    pub fn open_queue(&self, owner: Option<&str>) -> Result<Queue> {
        Ok(Queue::new(self.open_map(owner)?))
    }
}
