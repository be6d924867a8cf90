//! One file per record.
//!
//! Each record lives in `<dir>/<key>.<ext>`:
//!
//! ```text
//! {"key":"job-1","signature":"9f86d0...","message":"","timestamp":"2026-01-01T00:00:00Z"}
//! <body>
//! ```
//!
//! The first line is the JSON header; the rest is the body, either plain
//! JSON (`.json`) or zstd-compressed JSON (`.zst`). Listing reads only the
//! header line of each file.

use super::compressed::{compress_value, decompress_value};
use super::meta::MetaFile;
use super::directory_lock;
use crate::error::{MapError, Result};
use crate::fs::{atomic_write, is_reserved_name, read_optional, remove_if_exists};
use crate::locks::{ExclusiveLock, LockSettings};
use crate::map::{BackendKind, Record, RecordHeader, StorageBackend};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::debug;

/// How record bodies are encoded on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyCodec {
    Json,
    Zstd { level: i32 },
}

impl BodyCodec {
    fn extension(&self) -> &'static str {
        match self {
            BodyCodec::Json => "json",
            BodyCodec::Zstd { .. } => "zst",
        }
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        match self {
            BodyCodec::Json => Ok(serde_json::to_vec(value)?),
            BodyCodec::Zstd { level } => compress_value(value, *level),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        match self {
            BodyCodec::Json => Ok(serde_json::from_slice(bytes)?),
            BodyCodec::Zstd { .. } => decompress_value(bytes),
        }
    }
}

/// Directory of per-key record files.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
    codec: BodyCodec,
}

impl FileBackend {
    /// Plain JSON bodies in `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            codec: BodyCodec::Json,
        }
    }

    /// zstd-compressed bodies in `dir`.
    pub fn compressed(dir: impl Into<PathBuf>, level: i32) -> Self {
        Self {
            dir: dir.into(),
            codec: BodyCodec::Zstd { level },
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn codec(&self) -> BodyCodec {
        self.codec
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, self.codec.extension()))
    }

    /// The key a file name encodes, if it is a record file of this codec.
    fn key_of(&self, file_name: &str) -> Option<String> {
        if is_reserved_name(file_name) {
            return None;
        }
        file_name
            .strip_suffix(self.codec.extension())
            .and_then(|stem| stem.strip_suffix('.'))
            .filter(|stem| !stem.is_empty())
            .map(str::to_string)
    }

    /// Every record file as `(key, path)`. A missing directory is empty.
    fn record_files(&self) -> Result<Vec<(String, PathBuf)>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MapError::io("list", &self.dir, e)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MapError::io("list", &self.dir, e))?;
            let name = entry.file_name();
            if let Some(key) = name.to_str().and_then(|n| self.key_of(n)) {
                files.push((key, entry.path()));
            }
        }
        Ok(files)
    }

    fn read_header(path: &Path) -> Result<Option<RecordHeader>> {
        let file = match File::open(path) {
            Ok(file) => file,
            // Removed between listing and reading.
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(MapError::io("open", path, e)),
        };

        let mut line = String::new();
        BufReader::new(file)
            .read_line(&mut line)
            .map_err(|e| MapError::io("read", path, e))?;
        parse_header(line.as_bytes(), path).map(Some)
    }

    fn decode_file(&self, bytes: &[u8], path: &Path) -> Result<Record> {
        let split = bytes.iter().position(|b| *b == b'\n').ok_or_else(|| {
            MapError::Serialization(format!("record file '{}' has no header line", path.display()))
        })?;
        let header = parse_header(&bytes[..split], path)?;
        let value = self.codec.decode(&bytes[split + 1..]).map_err(|e| {
            MapError::Serialization(format!("bad body in '{}': {}", path.display(), e))
        })?;
        Ok(Record::from_parts(header, value))
    }

    fn encode_file(&self, record: &Record) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec(&record.header())?;
        bytes.push(b'\n');
        bytes.extend(self.codec.encode(&record.value)?);
        Ok(bytes)
    }
}

fn parse_header(line: &[u8], path: &Path) -> Result<RecordHeader> {
    serde_json::from_slice(line).map_err(|e| {
        MapError::Serialization(format!("bad header in '{}': {}", path.display(), e))
    })
}

impl StorageBackend for FileBackend {
    fn kind(&self) -> BackendKind {
        match self.codec {
            BodyCodec::Json => BackendKind::File,
            BodyCodec::Zstd { .. } => BackendKind::Compressed,
        }
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }

    fn connect(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| MapError::io("create directory", &self.dir, e))
    }

    fn exists(&self) -> Result<bool> {
        Ok(self.dir.is_dir())
    }

    fn get_raw(&self, key: &str) -> Result<Option<Record>> {
        let path = self.record_path(key);
        read_optional(&path)?
            .map(|bytes| self.decode_file(&bytes, &path))
            .transpose()
    }

    fn set_raw(&self, record: &Record) -> Result<()> {
        let path = self.record_path(&record.key);
        atomic_write(&path, &self.encode_file(record)?)?;
        debug!(path = %path.display(), "wrote record file");
        Ok(())
    }

    fn remove_raw(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            remove_if_exists(&self.record_path(key))?;
        }
        Ok(())
    }

    fn list_keys_raw(&self) -> Result<Vec<RecordHeader>> {
        let mut headers = Vec::new();
        for (_, path) in self.record_files()? {
            if let Some(header) = Self::read_header(&path)? {
                headers.push(header);
            }
        }
        Ok(headers)
    }

    fn validate_raw(&self) -> Result<Vec<String>> {
        let mut problems = Vec::new();
        for (key, path) in self.record_files()? {
            let Some(bytes) = read_optional(&path)? else {
                continue;
            };
            match self.decode_file(&bytes, &path) {
                Ok(record) if record.key != key => problems.push(format!(
                    "'{}' holds record '{}'",
                    path.display(),
                    record.key
                )),
                Ok(_) => {}
                Err(e) => problems.push(e.to_string()),
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
