//! Map behaviour checked against every local backend.

use super::*;
use crate::backends::{FileBackend, MemoryBackend, MemoryHandle, TextBackend};
use crate::error::{InvalidReason, MapError};
use crate::locks::LockSettings;
use crate::signature;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const LOCAL: [BackendKind; 4] = [
    BackendKind::Memory,
    BackendKind::File,
    BackendKind::Compressed,
    BackendKind::Text,
];

/// One storage location that several map instances can open.
struct Store {
    kind: BackendKind,
    dir: TempDir,
    handle: MemoryHandle,
}

impl Store {
    fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            dir: TempDir::new().unwrap(),
            handle: MemoryHandle::new(),
        }
    }

    fn root(&self) -> std::path::PathBuf {
        self.dir.path().join("store")
    }

    fn backend(&self) -> Box<dyn StorageBackend> {
        match self.kind {
            BackendKind::Memory => Box::new(MemoryBackend::with_handle(self.handle.clone())),
            BackendKind::File => Box::new(FileBackend::new(self.root())),
            BackendKind::Compressed => Box::new(FileBackend::compressed(self.root(), 3)),
            BackendKind::Text => Box::new(TextBackend::new(self.root())),
            BackendKind::Redis => panic!("redis is not a local backend"),
        }
    }

    fn map(&self, owner: &str) -> Map {
        self.map_with_timeout(owner, Duration::from_secs(10))
    }

    fn map_with_timeout(&self, owner: &str, timeout: Duration) -> Map {
        Map::builder("test", self.backend())
            .owner(owner)
            .settings(LockSettings {
                timeout,
                poll_interval: Duration::from_millis(2),
                stale_after: None,
            })
            .build()
    }
}

fn each_backend(test: impl Fn(&Store)) {
    for kind in LOCAL {
        let store = Store::new(kind);
        test(&store);
    }
}

#[test]
fn test_set_get_overwrite() {
    each_backend(|store| {
        let map = store.map("alice");
        assert_eq!(map.get::<String>("k").unwrap(), None, "{}", store.kind);

        map.set("k", "first").unwrap();
        map.set("k", "second").unwrap();
        assert_eq!(map.get::<String>("k").unwrap().as_deref(), Some("second"));
        assert_eq!(map.size().unwrap(), 1);
        assert_eq!(map.get_or("missing", 7u32).unwrap(), 7);
    });
}

#[test]
fn test_set_returns_value_digest() {
    each_backend(|store| {
        let map = store.map("alice");
        let value = json!({ "a": [1, 2] });
        let sig = map.set("k", &value).unwrap();
        assert_eq!(sig, signature::digest(&value).unwrap());
        assert_eq!(map.get_record("k").unwrap().unwrap().signature, sig);
    });
}

#[test]
fn test_has_with_and_without_signature() {
    each_backend(|store| {
        let map = store.map("alice");
        let value = vec![1, 2, 3];
        map.set("plain", &value).unwrap();
        map.set_with_signature("signed", &"payload", &json!({ "input": 42 }))
            .unwrap();

        assert_eq!(
            map.has(&["plain", "signed", "absent"]).unwrap(),
            vec![true, true, false]
        );
        assert_eq!(map.has_with_signature(&["plain"], &value).unwrap(), vec![true]);
        assert_eq!(map.has_with_signature(&["plain"], &vec![9]).unwrap(), vec![false]);
        assert_eq!(
            map.has_with_signature(&["signed"], &json!({ "input": 42 })).unwrap(),
            vec![true]
        );
        assert_eq!(
            map.has_with_signature(&["signed"], &"payload").unwrap(),
            vec![false]
        );

        let encoded = signature::digest(&json!({ "input": 42 })).unwrap();
        assert_eq!(
            map.has_with_encoded_signature(&["signed", "plain"], &encoded).unwrap(),
            vec![true, false]
        );
    });
}

#[derive(serde::Serialize)]
struct Job {
    name: String,
    attempt: u32,
}

#[test]
fn test_has_with_signature_of_struct_value() {
    each_backend(|store| {
        let map = store.map("alice");
        let job = Job {
            name: "build".to_string(),
            attempt: 1,
        };
        let sig = map.set("job", &job).unwrap();

        assert_eq!(sig, signature::digest(&job).unwrap());
        assert_eq!(map.has_with_signature(&["job"], &job).unwrap(), vec![true], "{}", store.kind);

        map.set_with_signature("derived", &1, &job).unwrap();
        assert_eq!(map.has_with_signature(&["derived"], &job).unwrap(), vec![true]);
    });
}

#[test]
fn test_has_on_empty_map_is_all_false() {
    each_backend(|store| {
        let map = store.map("alice");
        assert_eq!(map.has(&["a", "b"]).unwrap(), vec![false, false]);
        assert!(map.has::<&str>(&[]).unwrap().is_empty());
    });
}

#[test]
fn test_remove_and_reset() {
    each_backend(|store| {
        let map = store.map("alice");
        map.mset([("a", 1), ("b", 2), ("c", 3)]).unwrap();
        map.increment_counter("total", 3).unwrap();

        map.remove(&["a", "missing"]).unwrap();
        assert_eq!(map.keys().unwrap(), vec!["b", "c"]);

        map.reset().unwrap();
        assert_eq!(map.size().unwrap(), 0);
        assert_eq!(map.counter("total").unwrap(), 3);
    });
}

#[test]
fn test_batch_helpers_and_listing() {
    each_backend(|store| {
        let map = store.map("alice");
        map.mset([("job-2", "b"), ("job-1", "a"), ("other", "c")])
            .unwrap();

        assert_eq!(map.keys().unwrap(), vec!["job-1", "job-2", "other"]);
        assert_eq!(map.keys_matching("job-*").unwrap(), vec!["job-1", "job-2"]);
        assert_eq!(
            map.mget::<_, String>(&["job-1", "nope", "other"]).unwrap(),
            vec![Some("a".to_string()), None, Some("c".to_string())]
        );

        let pairs = map.keys_with_signatures().unwrap();
        assert_eq!(pairs[0].0, "job-1");
        assert_eq!(pairs[0].1, signature::digest("a").unwrap());
    });
}

#[test]
fn test_invalid_keys_rejected() {
    each_backend(|store| {
        let map = store.map("alice");
        for key in ["", ".lock", "a/b", "tab\tkey"] {
            assert!(matches!(map.set(key, &1), Err(MapError::UserError(_))));
        }
        assert!(matches!(map.keys_matching("[oops"), Err(MapError::UserError(_))));
    });
}

#[test]
fn test_validate_clean_store() {
    each_backend(|store| {
        let map = store.map("alice");
        map.set("a", &1).unwrap();
        map.validate().unwrap();
    });
}

#[test]
fn test_validate_reports_corruption() {
    let store = Store::new(BackendKind::File);
    let map = store.map("alice");
    map.set("a", &1).unwrap();
    std::fs::write(store.root().join("b.json"), "garbage").unwrap();

    match map.validate().unwrap_err() {
        MapError::InvalidMap {
            reason: InvalidReason::Corrupted(detail),
            ..
        } => assert!(detail.contains("b.json")),
        other => panic!("expected corruption, got {:?}", other),
    }
    // Corruption is reported, not terminal.
    assert!(!map.is_destroyed());
    assert_eq!(map.get::<i32>("a").unwrap(), Some(1));
}

#[test]
fn test_destroy_is_terminal() {
    each_backend(|store| {
        let map = store.map("alice");
        map.set("k", &1).unwrap();
        map.destroy().unwrap();

        assert!(map.is_destroyed());
        assert!(map.get::<i32>("k").unwrap_err().is_destroyed());
        assert!(map.set("k", &2).unwrap_err().is_destroyed());
        assert!(map.has(&["k"]).unwrap_err().is_destroyed());
        assert!(map.keys().unwrap_err().is_destroyed());
        assert!(map.validate().unwrap_err().is_destroyed());
        assert!(map.destroy().unwrap_err().is_destroyed());
        assert!(map.lock_info().unwrap_err().is_destroyed());
        assert!(!store.root().exists());
    });
}

#[test]
fn test_destroy_seen_by_other_instance() {
    each_backend(|store| {
        let first = store.map("alice");
        let second = store.map("bob");
        first.set("k", &1).unwrap();
        assert_eq!(second.get::<i32>("k").unwrap(), Some(1));

        first.destroy().unwrap();

        let err = second.get::<i32>("k").unwrap_err();
        assert!(err.is_destroyed(), "{}: {:?}", store.kind, err);
        assert!(second.set("k", &2).unwrap_err().is_destroyed());
        assert!(second.is_destroyed());
        assert!(!store.root().exists(), "{} storage came back", store.kind);
    });
}

#[test]
fn test_writer_blocked_by_other_owner_times_out() {
    each_backend(|store| {
        let holder = store.map("alice");
        let writer = store.map_with_timeout("bob", Duration::from_millis(30));
        holder.connect().unwrap();
        writer.connect().unwrap();

        holder
            .lock()
            .acquire(Duration::ZERO, Duration::from_millis(1))
            .unwrap();
        match writer.set("k", &1).unwrap_err() {
            MapError::LockTimeout { owner, holder, .. } => {
                assert_eq!(owner, "bob");
                assert_eq!(holder.as_deref(), Some("alice"));
            }
            other => panic!("expected LockTimeout, got {:?}", other),
        }
        assert_eq!(writer.lock_info().unwrap().unwrap().owner, "alice");

        holder.lock().release().unwrap();
        writer.set("k", &1).unwrap();
        assert!(writer.lock_info().unwrap().is_none());
    });
}

#[test]
fn test_exclusive_nests_map_operations() {
    each_backend(|store| {
        let map = store.map("alice");
        let total = map
            .exclusive(|m| {
                m.set("a", &1)?;
                m.set("b", &2)?;
                m.increment_counter("writes", 2)
            })
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(map.size().unwrap(), 2);
        assert!(map.lock_info().unwrap().is_none());
    });
}

fn bump(map: &Map) {
    map.exclusive(|m| {
        let n = m.get::<u64>("counter")?.unwrap_or(0);
        std::thread::sleep(Duration::from_millis(1));
        m.set("counter", &(n + 1))
    })
    .unwrap();
}

#[test]
fn test_distinct_owners_never_interleave() {
    each_backend(|store| {
        let maps: Vec<Map> = (0..4).map(|i| store.map(&format!("worker-{}", i))).collect();

        std::thread::scope(|scope| {
            for map in &maps {
                scope.spawn(move || {
                    for _ in 0..10 {
                        bump(map);
                    }
                });
            }
        });

        assert_eq!(maps[0].get::<u64>("counter").unwrap(), Some(40), "{}", store.kind);
    });
}

#[test]
fn test_one_map_shared_between_threads() {
    each_backend(|store| {
        let map = Arc::new(store.map("shared"));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let map = Arc::clone(&map);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        bump(&map);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(map.get::<u64>("counter").unwrap(), Some(40), "{}", store.kind);
    });
}

#[test]
fn test_custom_lock_is_used() {
    let store = Store::new(BackendKind::Memory);
    let dir = TempDir::new().unwrap();
    let lock = crate::locks::FileLock::new(dir.path().join("custom.lock"), "carol");
    let map = Map::builder("custom", store.backend())
        .lock(Box::new(lock))
        .build();

    assert_eq!(map.owner(), "carol");
    map.set("k", &1).unwrap();
    assert!(dir.path().join("custom.lock").exists());
}

#[test]
fn test_generated_owner_ids_differ() {
    let store = Store::new(BackendKind::Memory);
    let a = Map::new("a", store.backend());
    let b = Map::new("b", store.backend());
    assert_ne!(a.owner(), b.owner());
}
