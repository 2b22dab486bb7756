//! Process-wide table of live thread records.
//!
//! The registry is the one piece of shared state in this layer. It is
//! guarded by its own internal lock, which is never handed out as a client
//! mutex, and is consulted by the lock primitives to attribute ownership.
//! Independent instances can be constructed for tests; the library surface
//! owns a single process-wide one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::location::SourceLocation;
use crate::time::Timespec;

/// One live thread known to the registry.
///
/// Created before the thread's start routine runs; looked up (never
/// mutated, apart from renames) by the lock primitives; removed at join for
/// attached threads or at exit for detached ones.
pub struct ThreadRecord {
    id: u64,
    name: Mutex<String>,
    created: Timespec,
    spawned_at: SourceLocation,
    detached: bool,
    /// Registered lazily for a thread this layer did not spawn.
    foreign: bool,
}

impl ThreadRecord {
    /// Locally assigned numeric id, unique among live threads and
    /// monotonically assigned.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current human-readable name.
    pub fn name(&self) -> String {
        self.name.lock().clone()
    }

    pub(crate) fn set_name(&self, name: &str) {
        *self.name.lock() = name.to_owned();
    }

    /// Creation timestamp.
    pub fn created(&self) -> Timespec {
        self.created
    }

    /// Source location of the spawn call.
    pub fn spawned_at(&self) -> SourceLocation {
        self.spawned_at
    }

    /// Whether the thread runs detached (cannot be joined).
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    pub(crate) fn is_foreign(&self) -> bool {
        self.foreign
    }
}

/// Table of live [`ThreadRecord`]s keyed by id.
pub struct Registry {
    next_id: AtomicU64,
    threads: Mutex<HashMap<u64, Arc<ThreadRecord>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            threads: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn register(
        &self,
        name: &str,
        detached: bool,
        spawned_at: SourceLocation,
        foreign: bool,
    ) -> Arc<ThreadRecord> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = Arc::new(ThreadRecord {
            id,
            name: Mutex::new(name.to_owned()),
            created: Timespec::now(),
            spawned_at,
            detached,
            foreign,
        });
        self.threads.lock().insert(id, Arc::clone(&record));
        record
    }

    pub(crate) fn deregister(&self, id: u64) -> Option<Arc<ThreadRecord>> {
        self.threads.lock().remove(&id)
    }

    /// Look up a live thread by id.
    pub fn get(&self, id: u64) -> Option<Arc<ThreadRecord>> {
        self.threads.lock().get(&id).cloned()
    }

    /// Number of live records, lazily registered threads included.
    pub fn len(&self) -> usize {
        self.threads.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live records for threads spawned through this layer.
    pub(crate) fn live_spawned(&self) -> usize {
        self.threads
            .lock()
            .values()
            .filter(|r| !r.is_foreign())
            .count()
    }

    pub(crate) fn clear(&self) {
        self.threads.lock().clear();
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

/// The process-wide registry used by the library surface and the lock
/// primitives. Initialized on first use.
pub fn global() -> &'static Registry {
    GLOBAL.get_or_init(Registry::new)
}
