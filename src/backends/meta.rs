//! Named counters for directory-based backends, kept in `<dir>/.meta.json`.

use crate::error::{MapError, Result};
use crate::fs::{atomic_write, read_optional};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name of the counter store inside a backend directory.
pub const META_FILE: &str = ".meta.json";

#[derive(Debug, Clone)]
pub(crate) struct MetaFile {
    path: PathBuf,
}

impl MetaFile {
    pub(crate) fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(META_FILE),
        }
    }

    fn load(&self) -> Result<BTreeMap<String, u64>> {
        match read_optional(&self.path)? {
            None => Ok(BTreeMap::new()),
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                MapError::Serialization(format!(
                    "failed to parse counters '{}': {}",
                    self.path.display(),
                    e
                ))
            }),
        }
    }

    pub(crate) fn read(&self, name: &str) -> Result<u64> {
        Ok(self.load()?.get(name).copied().unwrap_or(0))
    }

    pub(crate) fn write(&self, name: &str, value: u64) -> Result<()> {
        let mut counters = self.load()?;
        counters.insert(name.to_string(), value);
        let json = serde_json::to_vec_pretty(&counters)?;
        atomic_write(&self.path, &json)
    }
}
