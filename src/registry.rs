//! Process-wide lookup of named queues.
//!
//! Queues are registered explicitly. [`QueueRegistry::global`] is a lazily
//! created shared instance; independent registries can be built with
//! [`QueueRegistry::new`].

use crate::error::Result;
use crate::queue::Queue;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use tracing::debug;

static GLOBAL: LazyLock<QueueRegistry> = LazyLock::new(QueueRegistry::new);

/// Name → queue table.
#[derive(Debug, Default)]
pub struct QueueRegistry {
    queues: Mutex<HashMap<String, Arc<Queue>>>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static QueueRegistry {
        &GLOBAL
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Arc<Queue>>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The queue registered as `name`, creating it with `create` on first use.
    ///
    /// `create` runs while the registry is locked, so concurrent callers
    /// never build two queues for one name.
    pub fn get_or_insert_with<F>(&self, name: &str, create: F) -> Result<Arc<Queue>>
    where
        F: FnOnce() -> Result<Queue>,
    {
        let mut table = self.table();
        if let Some(queue) = table.get(name) {
            return Ok(Arc::clone(queue));
        }

        let queue = Arc::new(create()?);
        table.insert(name.to_string(), Arc::clone(&queue));
        debug!(queue = %name, "registered queue");
        Ok(queue)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Queue>> {
        self.table().get(name).cloned()
    }

    /// Unregister `name`. The queue itself stays usable by current holders.
    pub fn remove(&self, name: &str) -> Option<Arc<Queue>> {
        self.table().remove(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryBackend;
    use crate::error::MapError;
    use crate::map::Map;
    use serial_test::serial;

    fn memory_queue(name: &str) -> Result<Queue> {
        Ok(Queue::new(Map::new(name, Box::new(MemoryBackend::new()))))
    }

    #[test]
    fn creates_once_per_name() {
        let registry = QueueRegistry::new();
        let first = registry.get_or_insert_with("jobs", || memory_queue("jobs")).unwrap();
        first.push(&1, "").unwrap();

        let second = registry
            .get_or_insert_with("jobs", || panic!("must not be called"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.count().unwrap(), 1);
    }

    #[test]
    fn failed_creation_registers_nothing() {
        let registry = QueueRegistry::new();
        let err = registry
            .get_or_insert_with("jobs", || Err(MapError::UserError("nope".to_string())))
            .unwrap_err();
        assert!(matches!(err, MapError::UserError(_)));
        assert!(registry.get("jobs").is_none());
    }

    #[test]
    fn remove_and_names() {
        let registry = QueueRegistry::new();
        for name in ["b", "a"] {
            registry.get_or_insert_with(name, || memory_queue(name)).unwrap();
        }
        assert_eq!(registry.names(), vec!["a", "b"]);

        let removed = registry.remove("a").unwrap();
        assert_eq!(removed.name(), "a");
        assert_eq!(registry.names(), vec!["b"]);
        assert!(registry.remove("a").is_none());
    }

    #[test]
    #[serial]
    fn global_registry_is_shared() {
        let queue = QueueRegistry::global()
            .get_or_insert_with("registry-test", || memory_queue("registry-test"))
            .unwrap();
        let found = QueueRegistry::global().get("registry-test").unwrap();
        assert!(Arc::ptr_eq(&queue, &found));

        QueueRegistry::global().remove("registry-test");
        assert!(QueueRegistry::global().get("registry-test").is_none());
    }

    #[test]
    #[serial]
    fn global_registry_from_other_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(|| {
                    QueueRegistry::global()
                        .get_or_insert_with("registry-threads", || memory_queue("registry-threads"))
                        .unwrap()
                })
            })
            .collect();
        let queues: Vec<Arc<Queue>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(queues.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));

        QueueRegistry::global().remove("registry-threads");
    }
}
