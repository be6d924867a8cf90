//! Redis backend and lock.
//!
//! A map named `jobs` uses these keys:
//!
//! | Key | Type | Content |
//! |---|---|---|
//! | `mapq:jobs:headers` | hash | key → header JSON |
//! | `mapq:jobs:values` | hash | key → value JSON |
//! | `mapq:jobs:meta` | hash | counter name → integer |
//! | `mapq:jobs:alive` | string | present while the map exists |
//! | `mapq:jobs:lock` | string | owner id while locked |
//!
//! The connection is opened lazily and dropped after a connection-level
//! error, so the next call reconnects.

use crate::error::{MapError, Result};
use crate::locks::{
    Attempt, ExclusiveLock, LockInfo, LockSettings, ThreadGate, poll_acquire,
};
use crate::map::{BackendKind, Record, RecordHeader, StorageBackend};
use redis::{Client, Connection, RedisError, Script};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Lazily opened, shared Redis connection.
pub struct RedisConnector {
    url: String,
    client: Client,
    connection: Mutex<Option<Connection>>,
    timeout: Duration,
}

impl RedisConnector {
    pub fn open(url: &str) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| MapError::UserError(format!("invalid redis url '{}': {}", url, e)))?;
        Ok(Self {
            url: url.to_string(),
            client,
            connection: Mutex::new(None),
            timeout: CONNECT_TIMEOUT,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Run `f` on the cached connection, opening one if needed.
    fn run<T>(&self, f: impl FnOnce(&mut Connection) -> redis::RedisResult<T>) -> Result<T> {
        let mut slot = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if slot.is_none() {
            let connection = self
                .client
                .get_connection_with_timeout(self.timeout)
                .and_then(|c| {
                    c.set_read_timeout(Some(self.timeout))?;
                    c.set_write_timeout(Some(self.timeout))?;
                    Ok(c)
                })
                .map_err(|e| self.unavailable(e))?;
            debug!(url = %self.url, "opened redis connection");
            *slot = Some(connection);
        }

        let Some(connection) = slot.as_mut() else {
            return Err(MapError::BackendUnavailable(format!("{}: not connected", self.url)));
        };
        f(connection).map_err(|e| {
            if is_connection_error(&e) {
                warn!(url = %self.url, error = %e, "dropping redis connection");
                *slot = None;
            }
            self.unavailable(e)
        })
    }

    fn unavailable(&self, err: RedisError) -> MapError {
        MapError::BackendUnavailable(format!("redis at {}: {}", self.url, err))
    }
}

impl fmt::Debug for RedisConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let connected = self
            .connection
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false);
        f.debug_struct("RedisConnector")
            .field("url", &self.url)
            .field("connected", &connected)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn is_connection_error(err: &RedisError) -> bool {
    err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout()
}

/// Backend storing a map in Redis hashes.
#[derive(Debug, Clone)]
pub struct RedisBackend {
    connector: Arc<RedisConnector>,
    prefix: String,
}

impl RedisBackend {
    /// Backend for map `name` on the server at `url`. Nothing connects yet.
    pub fn new(url: &str, name: &str) -> Result<Self> {
        Ok(Self {
            connector: Arc::new(RedisConnector::open(url)?),
            prefix: format!("mapq:{}", name),
        })
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.prefix, suffix)
    }

    fn decode_header(&self, field: &str, json: &str) -> Result<RecordHeader> {
        serde_json::from_str(json).map_err(|e| {
            MapError::Serialization(format!("bad header for '{}' in {}: {}", field, self.prefix, e))
        })
    }
}

impl StorageBackend for RedisBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Redis
    }

    fn location(&self) -> String {
        format!("{} ({})", self.connector.url(), self.prefix)
    }

    fn connect(&self) -> Result<()> {
        let alive = self.key("alive");
        self.connector
            .run(|con| redis::cmd("SET").arg(&alive).arg(1).query::<()>(con))
    }

    fn exists(&self) -> Result<bool> {
        let alive = self.key("alive");
        self.connector
            .run(|con| redis::cmd("EXISTS").arg(&alive).query::<bool>(con))
    }

    fn get_raw(&self, key: &str) -> Result<Option<Record>> {
        let (headers, values) = (self.key("headers"), self.key("values"));
        let (header, value): (Option<String>, Option<String>) = self.connector.run(|con| {
            redis::pipe()
                .cmd("HGET")
                .arg(&headers)
                .arg(key)
                .cmd("HGET")
                .arg(&values)
                .arg(key)
                .query(con)
        })?;

        match (header, value) {
            (Some(header), Some(value)) => {
                let header = self.decode_header(key, &header)?;
                Ok(Some(Record::from_parts(header, serde_json::from_str(&value)?)))
            }
            _ => Ok(None),
        }
    }

    fn set_raw(&self, record: &Record) -> Result<()> {
        let header = serde_json::to_string(&record.header())?;
        let value = serde_json::to_string(&record.value)?;
        let (headers, values) = (self.key("headers"), self.key("values"));
        self.connector.run(|con| {
            redis::pipe()
                .atomic()
                .cmd("HSET")
                .arg(&headers)
                .arg(&record.key)
                .arg(&header)
                .ignore()
                .cmd("HSET")
                .arg(&values)
                .arg(&record.key)
                .arg(&value)
                .ignore()
                .query::<()>(con)
        })
    }

    fn remove_raw(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let (headers, values) = (self.key("headers"), self.key("values"));
        self.connector.run(|con| {
            redis::pipe()
                .atomic()
                .cmd("HDEL")
                .arg(&headers)
                .arg(keys)
                .ignore()
                .cmd("HDEL")
                .arg(&values)
                .arg(keys)
                .ignore()
                .query::<()>(con)
        })
    }

    fn list_keys_raw(&self) -> Result<Vec<RecordHeader>> {
        let headers = self.key("headers");
        let all: HashMap<String, String> = self
            .connector
            .run(|con| redis::cmd("HGETALL").arg(&headers).query(con))?;
        all.iter()
            .map(|(field, json)| self.decode_header(field, json))
            .collect()
    }

    fn validate_raw(&self) -> Result<Vec<String>> {
        let (headers, values) = (self.key("headers"), self.key("values"));
        let (header_map, value_keys): (HashMap<String, String>, Vec<String>) =
            self.connector.run(|con| {
                redis::pipe()
                    .cmd("HGETALL")
                    .arg(&headers)
                    .cmd("HKEYS")
                    .arg(&values)
                    .query(con)
            })?;

        let mut problems = Vec::new();
        let header_keys: BTreeSet<&String> = header_map.keys().collect();
        let value_keys: BTreeSet<&String> = value_keys.iter().collect();
        for missing in header_keys.difference(&value_keys) {
            problems.push(format!("'{}' has a header but no value", missing));
        }
        for missing in value_keys.difference(&header_keys) {
            problems.push(format!("'{}' has a value but no header", missing));
        }
        for (field, json) in &header_map {
            match self.decode_header(field, json) {
                Ok(header) if header.key != *field => {
                    problems.push(format!("field '{}' holds record '{}'", field, header.key))
                }
                Ok(_) => {}
                Err(e) => problems.push(e.to_string()),
            }
        }
        Ok(problems)
    }

    fn destroy_raw(&self) -> Result<()> {
        let keys = [
            self.key("headers"),
            self.key("values"),
            self.key("meta"),
            self.key("alive"),
        ];
        self.connector
            .run(|con| redis::cmd("DEL").arg(&keys[..]).query::<()>(con))
    }

    fn read_counter(&self, name: &str) -> Result<u64> {
        let meta = self.key("meta");
        let value: Option<u64> = self
            .connector
            .run(|con| redis::cmd("HGET").arg(&meta).arg(name).query(con))?;
        Ok(value.unwrap_or(0))
    }

    fn write_counter(&self, name: &str, value: u64) -> Result<()> {
        let meta = self.key("meta");
        self.connector
            .run(|con| redis::cmd("HSET").arg(&meta).arg(name).arg(value).query::<()>(con))
    }

    fn default_lock(&self, owner: &str, settings: &LockSettings) -> Box<dyn ExclusiveLock> {
        Box::new(RedisLock {
            connector: Arc::clone(&self.connector),
            key: self.key("lock"),
            owner: owner.to_string(),
            ttl: settings.stale_after,
            gate: ThreadGate::new(),
        })
    }
}

/// Lock held as a Redis string key, optionally expiring after `ttl`.
#[derive(Debug)]
pub struct RedisLock {
    connector: Arc<RedisConnector>,
    key: String,
    owner: String,
    ttl: Option<Duration>,
    gate: ThreadGate,
}

impl RedisLock {
    fn try_take(&self) -> Result<Attempt> {
        let taken: Option<String> = self.connector.run(|con| {
            let mut set = redis::cmd("SET");
            set.arg(&self.key).arg(&self.owner).arg("NX");
            if let Some(ttl) = self.ttl {
                set.arg("PX").arg(ttl.as_millis() as u64);
            }
            set.query(con)
        })?;
        if taken.is_some() {
            return Ok(Attempt::Taken);
        }

        let holder: Option<String> = self
            .connector
            .run(|con| redis::cmd("GET").arg(&self.key).query(con))?;
        match holder {
            Some(holder) if holder == self.owner => Ok(Attempt::Taken),
            // Expired between SET and GET; try again next round.
            None => Ok(Attempt::Busy(None)),
            Some(holder) => Ok(Attempt::Busy(Some(holder))),
        }
    }
}

impl ExclusiveLock for RedisLock {
    fn owner(&self) -> &str {
        &self.owner
    }

    fn resource(&self) -> String {
        format!("{} ({})", self.key, self.connector.url())
    }

    fn acquire(&self, timeout: Duration, poll_interval: Duration) -> Result<()> {
        poll_acquire(
            &self.gate,
            &self.resource(),
            &self.owner,
            timeout,
            poll_interval,
            || self.try_take(),
        )
    }

    fn release(&self) -> Result<()> {
        self.gate.leave_with(|| {
            let script = Script::new(RELEASE_SCRIPT);
            self.connector
                .run(|con| script.key(&self.key).arg(&self.owner).invoke::<i64>(con))
                .map(|_| ())
        })?;
        Ok(())
    }

    fn inspect(&self) -> Result<Option<LockInfo>> {
        let holder: Option<String> = self
            .connector
            .run(|con| redis::cmd("GET").arg(&self.key).query(con))?;
        Ok(holder.map(|owner| LockInfo {
            resource: self.resource(),
            owner,
            acquired_at: None,
            is_stale: false,
        }))
    }

    fn clear(&self) -> Result<()> {
        self.connector
            .run(|con| redis::cmd("DEL").arg(&self.key).query::<()>(con))
    }

    fn destroy(&self) -> Result<()> {
        self.clear()
    }
}
