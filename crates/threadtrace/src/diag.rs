//! Diagnostic bookkeeping for the lock primitives.
//!
//! The `diagnostics` cargo feature selects between two layouts of
//! [`LockDiag`]: the full variant carries lock id, owner thread, acquisition
//! site and timing, and turns caller misuse into a fatal report; the
//! zero-sized variant makes every hook a no-op so the primitives impose no
//! overhead. The primitives call the same method surface either way, so no
//! per-field conditionals leak into them.

use std::sync::atomic::{AtomicI64, Ordering};

use thiserror::Error;

use crate::location::SourceLocation;

/// Log-sink channel id attached to every diagnostic event. -1 until the
/// host selects one via [`crate::set_log_sink`].
static LOG_SINK: AtomicI64 = AtomicI64::new(-1);

pub(crate) fn set_log_sink(id: i64) {
    LOG_SINK.store(id, Ordering::Relaxed);
}

pub(crate) fn log_sink() -> i64 {
    LOG_SINK.load(Ordering::Relaxed)
}

/// Who, if anyone, holds an exclusive lock.
///
/// Distinguishes a lock that has never been taken from one that is merely
/// not held right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerState {
    /// The lock has never been acquired since construction.
    NeverLocked,
    /// The lock was held at least once and is currently free.
    Unlocked,
    /// The lock is held by the thread with this registry id.
    Owned(u64),
}

/// Caller bugs detected by the diagnostic build. Each is reported with full
/// context and then terminates the offending thread; none are recoverable.
#[derive(Debug, Error)]
pub enum Misuse {
    #[error("{kind} #{lock} re-locked by owning thread {thread} at {location}")]
    DoubleLock {
        kind: &'static str,
        lock: u64,
        thread: u64,
        location: SourceLocation,
    },
    #[error("{kind} #{lock} unlocked by thread {thread} at {location}, owner state {owner:?}")]
    UnlockByNonOwner {
        kind: &'static str,
        lock: u64,
        thread: u64,
        location: SourceLocation,
        owner: OwnerState,
    },
    #[error("wait on mutex #{lock} by thread {thread} at {location} without holding it")]
    WaitWithoutLock {
        lock: u64,
        thread: u64,
        location: SourceLocation,
    },
    #[error("{kind} #{lock} unlocked by thread {thread} at {location} while not held")]
    UnlockNotHeld {
        kind: &'static str,
        lock: u64,
        thread: u64,
        location: SourceLocation,
    },
    #[error("{kind} #{lock} dropped while held, owner state {owner:?}, held {held_ms} ms")]
    DropWhileHeld {
        kind: &'static str,
        lock: u64,
        owner: OwnerState,
        held_ms: u64,
    },
    #[error("join on detached thread {thread} ({name})")]
    JoinDetached { thread: u64, name: String },
    #[error("shutdown requested with {live} spawned thread(s) still live")]
    ShutdownWithLiveThreads { live: usize },
}

/// Report a misuse with full context and terminate the calling thread.
pub(crate) fn fatal(misuse: Misuse) -> ! {
    tracing::error!(sink = log_sink(), %misuse, "fatal synchronization misuse");
    panic!("{misuse}");
}

#[cfg(feature = "diagnostics")]
pub(crate) use full::LockDiag;
#[cfg(not(feature = "diagnostics"))]
pub(crate) use noop::LockDiag;

#[cfg(feature = "diagnostics")]
mod full {
    use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

    use super::{fatal, log_sink, Misuse, OwnerState};
    use crate::location::SourceLocation;
    use crate::thread;
    use crate::time::Timespec;

    /// Owner sentinel: held at least once, currently free.
    const NOT_LOCKED: i64 = -1;
    /// Owner sentinel: never acquired since construction.
    const NEVER_LOCKED: i64 = -2;

    static NEXT_LOCK_ID: AtomicU64 = AtomicU64::new(1);

    /// Full diagnostic state for one exclusive-capable lock.
    ///
    /// The owner/site/timing fields are written only by the thread holding
    /// the corresponding platform lock, strictly inside the held window, so
    /// an observer that reads `Owned(x)` knows thread `x` holds the lock at
    /// that instant.
    pub(crate) struct LockDiag {
        kind: &'static str,
        id: u64,
        name: Option<String>,
        owner: AtomicI64,
        since_ms: AtomicU64,
        site: parking_lot::Mutex<Option<SourceLocation>>,
    }

    impl LockDiag {
        pub(crate) fn new(kind: &'static str, name: Option<String>) -> Self {
            Self {
                kind,
                id: NEXT_LOCK_ID.fetch_add(1, Ordering::Relaxed),
                name,
                owner: AtomicI64::new(NEVER_LOCKED),
                since_ms: AtomicU64::new(0),
                site: parking_lot::Mutex::new(None),
            }
        }

        pub(crate) fn id(&self) -> u64 {
            self.id
        }

        pub(crate) fn name(&self) -> Option<&str> {
            self.name.as_deref()
        }

        pub(crate) fn owner_state(&self) -> OwnerState {
            match self.owner.load(Ordering::Relaxed) {
                NOT_LOCKED => OwnerState::Unlocked,
                NEVER_LOCKED => OwnerState::NeverLocked,
                id => OwnerState::Owned(id as u64),
            }
        }

        pub(crate) fn lock_site(&self) -> Option<SourceLocation> {
            *self.site.lock()
        }

        /// Milliseconds the current owner has held the lock; 0 when free.
        pub(crate) fn held_ms(&self) -> u64 {
            if self.owner.load(Ordering::Relaxed) < 0 {
                return 0;
            }
            Timespec::now()
                .as_millis()
                .saturating_sub(self.since_ms.load(Ordering::Relaxed))
        }

        /// Pre-acquire check: blocking again on a lock this thread already
        /// owns can never complete.
        pub(crate) fn check_lock(&self, location: SourceLocation) {
            let me = thread::current_id();
            if self.owner.load(Ordering::Relaxed) == me as i64 {
                fatal(Misuse::DoubleLock {
                    kind: self.kind,
                    lock: self.id,
                    thread: me,
                    location,
                });
            }
        }

        /// Record ownership. Must be called with the platform lock held.
        pub(crate) fn on_acquire(&self, location: SourceLocation) {
            let me = thread::current_id();
            self.since_ms
                .store(Timespec::now().as_millis(), Ordering::Relaxed);
            *self.site.lock() = Some(location);
            self.owner.store(me as i64, Ordering::Relaxed);
            tracing::trace!(
                sink = log_sink(),
                kind = self.kind,
                lock = self.id,
                thread = me,
                %location,
                "acquired"
            );
        }

        /// Clear ownership ahead of the platform unlock. Fatal if the caller
        /// is not the recorded owner.
        pub(crate) fn on_release(&self, location: SourceLocation) {
            let me = thread::current_id();
            if self.owner.load(Ordering::Relaxed) != me as i64 {
                fatal(Misuse::UnlockByNonOwner {
                    kind: self.kind,
                    lock: self.id,
                    thread: me,
                    location,
                    owner: self.owner_state(),
                });
            }
            let held_ms = self.held_ms();
            self.owner.store(NOT_LOCKED, Ordering::Relaxed);
            tracing::debug!(
                sink = log_sink(),
                kind = self.kind,
                lock = self.id,
                thread = me,
                %location,
                held_ms,
                "released"
            );
        }

        /// Clear ownership for the span of a condition wait. Fatal if the
        /// caller does not hold the mutex it is waiting on.
        pub(crate) fn on_wait_release(&self, location: SourceLocation) {
            let me = thread::current_id();
            if self.owner.load(Ordering::Relaxed) != me as i64 {
                fatal(Misuse::WaitWithoutLock {
                    lock: self.id,
                    thread: me,
                    location,
                });
            }
            self.owner.store(NOT_LOCKED, Ordering::Relaxed);
        }

        /// Fatal when an exclusive owner other than the caller is recorded.
        /// Guards the shared-release path against stripping a write-held
        /// lock: the caller holds nothing, yet the lock reads as locked
        /// because another thread owns it exclusively.
        pub(crate) fn check_exclusive_conflict(&self, location: SourceLocation) {
            if let OwnerState::Owned(owner) = self.owner_state() {
                fatal(Misuse::UnlockByNonOwner {
                    kind: self.kind,
                    lock: self.id,
                    thread: thread::current_id(),
                    location,
                    owner: OwnerState::Owned(owner),
                });
            }
        }

        /// Trace a signal/broadcast on a condition variable.
        pub(crate) fn on_notify(&self, all: bool) {
            tracing::trace!(
                sink = log_sink(),
                kind = self.kind,
                lock = self.id,
                all,
                "notified"
            );
        }

        /// Shared (read) acquisitions carry no owner; trace only.
        pub(crate) fn on_shared_acquire(&self, location: SourceLocation) {
            tracing::trace!(
                sink = log_sink(),
                kind = self.kind,
                lock = self.id,
                thread = thread::current_id(),
                %location,
                "shared acquired"
            );
        }

        /// Fatal unless the platform lock is held at all. Used on the
        /// shared-release path, where per-reader identity is not tracked.
        pub(crate) fn check_held(&self, held: bool, location: SourceLocation) {
            if !held {
                fatal(Misuse::UnlockNotHeld {
                    kind: self.kind,
                    lock: self.id,
                    thread: thread::current_id(),
                    location,
                });
            }
        }

        /// Destroy-while-held check. Suppressed during unwinding so a
        /// misuse report is not compounded by a second panic.
        pub(crate) fn on_drop(&self, held: bool) {
            if held && !std::thread::panicking() {
                fatal(Misuse::DropWhileHeld {
                    kind: self.kind,
                    lock: self.id,
                    owner: self.owner_state(),
                    held_ms: self.held_ms(),
                });
            }
        }
    }
}

#[cfg(not(feature = "diagnostics"))]
mod noop {
    use crate::location::SourceLocation;

    /// Zero-sized stand-in: no metadata, no checks, no overhead.
    pub(crate) struct LockDiag;

    impl LockDiag {
        #[inline]
        pub(crate) fn new(_kind: &'static str, _name: Option<String>) -> Self {
            Self
        }

        #[inline]
        pub(crate) fn check_lock(&self, _location: SourceLocation) {}

        #[inline]
        pub(crate) fn on_acquire(&self, _location: SourceLocation) {}

        #[inline]
        pub(crate) fn on_release(&self, _location: SourceLocation) {}

        #[inline]
        pub(crate) fn on_wait_release(&self, _location: SourceLocation) {}

        #[inline]
        pub(crate) fn check_exclusive_conflict(&self, _location: SourceLocation) {}

        #[inline]
        pub(crate) fn on_notify(&self, _all: bool) {}

        #[inline]
        pub(crate) fn on_shared_acquire(&self, _location: SourceLocation) {}

        #[inline]
        pub(crate) fn check_held(&self, _held: bool, _location: SourceLocation) {}

        #[inline]
        pub(crate) fn on_drop(&self, _held: bool) {}
    }
}
