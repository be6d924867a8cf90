//! Whole map in one tab-delimited text file.
//!
//! `<dir>/table.tsv` holds one record per line:
//!
//! ```text
//! <timestamp RFC 3339>\t<key>\t<escaped JSON {signature, message, value}>
//! ```
//!
//! Backslash, tab, LF and CR inside the JSON field are escaped so a record
//! always stays on one line. Every mutation rewrites the table atomically.

use super::directory_lock;
use super::meta::MetaFile;
use crate::error::{MapError, Result};
use crate::fs::{atomic_write, read_optional};
use crate::locks::{ExclusiveLock, LockSettings};
use crate::map::{BackendKind, Record, RecordHeader, StorageBackend};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the table inside the backend directory.
pub const TABLE_FILE: &str = "table.tsv";

#[derive(Serialize, Deserialize)]
struct Payload {
    signature: String,
    #[serde(default)]
    message: String,
    value: Value,
}

/// Escape a field so it contains no tab or line break.
pub fn escape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Inverse of [`escape`]. Unknown escapes are kept verbatim.
pub fn unescape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn format_line(record: &Record) -> Result<String> {
    let payload = Payload {
        signature: record.signature.clone(),
        message: record.message.clone(),
        value: record.value.clone(),
    };
    Ok(format!(
        "{}\t{}\t{}",
        record.timestamp.to_rfc3339(),
        record.key,
        escape(&serde_json::to_string(&payload)?)
    ))
}

fn parse_line(line: &str) -> std::result::Result<Record, String> {
    let fields: Vec<&str> = line.split('\t').collect();
    let [timestamp, key, payload] = fields.as_slice() else {
        return Err(format!("expected 3 fields, found {}", fields.len()));
    };

    let timestamp = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|e| format!("bad timestamp '{}': {}", timestamp, e))?
        .with_timezone(&Utc);
    let payload: Payload = serde_json::from_str(&unescape(payload))
        .map_err(|e| format!("bad payload for '{}': {}", key, e))?;

    Ok(Record {
        key: key.to_string(),
        signature: payload.signature,
        value: payload.value,
        message: payload.message,
        timestamp,
    })
}

/// Backend keeping every record in `table.tsv`.
#[derive(Debug, Clone)]
pub struct TextBackend {
    dir: PathBuf,
}

impl TextBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn table_path(&self) -> PathBuf {
        self.dir.join(TABLE_FILE)
    }

    fn read_text(&self) -> Result<String> {
        let path = self.table_path();
        match read_optional(&path)? {
            None => Ok(String::new()),
            Some(bytes) => String::from_utf8(bytes).map_err(|e| {
                MapError::Serialization(format!("'{}' is not UTF-8: {}", path.display(), e))
            }),
        }
    }

    /// Parse the table; a damaged line is an error.
    fn load(&self) -> Result<BTreeMap<String, Record>> {
        let mut records = BTreeMap::new();
        for (number, line) in self.read_text()?.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            let record = parse_line(line).map_err(|detail| {
                MapError::Serialization(format!(
                    "{} line {}: {}",
                    self.table_path().display(),
                    number + 1,
                    detail
                ))
            })?;
            records.insert(record.key.clone(), record);
        }
        Ok(records)
    }

    fn store(&self, records: &BTreeMap<String, Record>) -> Result<()> {
        let mut text = String::new();
        for record in records.values() {
            text.push_str(&format_line(record)?);
            text.push('\n');
        }
        atomic_write(self.table_path(), text.as_bytes())?;
        debug!(path = %self.table_path().display(), records = records.len(), "rewrote table");
        Ok(())
    }
}

impl StorageBackend for TextBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Text
    }

    fn location(&self) -> String {
        self.table_path().display().to_string()
    }

    fn connect(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| MapError::io("create directory", &self.dir, e))
    }

    fn exists(&self) -> Result<bool> {
        Ok(self.dir.is_dir())
    }

    fn get_raw(&self, key: &str) -> Result<Option<Record>> {
        Ok(self.load()?.remove(key))
    }

    fn set_raw(&self, record: &Record) -> Result<()> {
        let mut records = self.load()?;
        records.insert(record.key.clone(), record.clone());
        self.store(&records)
    }

    fn remove_raw(&self, keys: &[String]) -> Result<()> {
        let mut records = self.load()?;
        let before = records.len();
        for key in keys {
            records.remove(key);
        }
        if records.len() == before {
            return Ok(());
        }
        self.store(&records)
    }

    fn list_keys_raw(&self) -> Result<Vec<RecordHeader>> {
        Ok(self.load()?.values().map(Record::header).collect())
    }

    fn validate_raw(&self) -> Result<Vec<String>> {
        let mut problems = Vec::new();
        let mut seen = BTreeMap::new();
        for (number, line) in self.read_text()?.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            match parse_line(line) {
                Ok(record) => {
                    if let Some(first) = seen.insert(record.key.clone(), number + 1) {
                        problems.push(format!(
                            "line {}: duplicate key '{}' (first on line {})",
                            number + 1,
                            record.key,
                            first
                        ));
                    }
                }
                Err(detail) => problems.push(format!("line {}: {}", number + 1, detail)),
            }
        }
        Ok(problems)
    }

    fn destroy_raw(&self) -> Result<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MapError::io("remove directory", &self.dir, e)),
        }
    }

    fn read_counter(&self, name: &str) -> Result<u64> {
        MetaFile::in_dir(&self.dir).read(name)
    }

    fn write_counter(&self, name: &str, value: u64) -> Result<()> {
        MetaFile::in_dir(&self.dir).write(name, value)
    }

    fn default_lock(&self, owner: &str, settings: &LockSettings) -> Box<dyn ExclusiveLock> {
        directory_lock(&self.dir, owner, settings)
    }
}
