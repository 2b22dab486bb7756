//! Shared-read/exclusive-write lock with reentrant write accounting.
//!
//! Multiple readers may hold the lock simultaneously; writers exclude
//! everyone. A thread already holding the write lock may re-acquire it
//! without deadlocking: an inner depth counter absorbs the nested
//! acquisitions and the platform lock is released only when the count
//! returns to zero. Fairness between waiting readers and writers is
//! whatever the platform primitive provides.
//!
//! The writer id and depth are functional state, not diagnostics: they are
//! maintained in every build. Location/timing attribution is recorded on
//! the outermost write acquisition only.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::diag::LockDiag;
use crate::location::SourceLocation;

/// Writer-id sentinel for "no writer". Registry thread ids start at 1.
const NO_WRITER: u64 = 0;

/// A shared-read/exclusive-write lock.
pub struct RwLock {
    inner: parking_lot::RwLock<()>,
    /// Registry id of the thread holding the write lock, or [`NO_WRITER`].
    /// Stored by the writer after acquiring the platform lock; other
    /// threads only ever compare it against their own id, so relaxed
    /// ordering suffices (a thread reads its own store in program order,
    /// and can never observe another thread's id as its own).
    writer: AtomicU64,
    /// Reentrant write-acquisition depth; touched only by the writer.
    write_depth: AtomicUsize,
    diag: LockDiag,
}

impl RwLock {
    /// A new, unheld lock carrying `name` for diagnostics.
    pub fn new(name: &str) -> Self {
        Self {
            inner: parking_lot::RwLock::new(()),
            writer: AtomicU64::new(NO_WRITER),
            write_depth: AtomicUsize::new(0),
            diag: LockDiag::new("rwlock", Some(name.to_owned())),
        }
    }

    /// Block until a shared slot is available.
    pub fn read_lock(&self, location: SourceLocation) {
        core::mem::forget(self.inner.read());
        self.diag.on_shared_acquire(location);
    }

    /// Take a shared slot if one is immediately available. Failure is a
    /// normal outcome, not an error.
    #[must_use]
    pub fn try_read_lock(&self, location: SourceLocation) -> bool {
        match self.inner.try_read() {
            Some(guard) => {
                core::mem::forget(guard);
                self.diag.on_shared_acquire(location);
                true
            }
            None => false,
        }
    }

    /// Block until exclusive ownership is acquired. If the calling thread
    /// already holds the write lock this only bumps the depth counter.
    pub fn write_lock(&self, location: SourceLocation) {
        let me = crate::thread::current_id();
        if self.writer.load(Ordering::Relaxed) == me {
            self.write_depth.fetch_add(1, Ordering::Relaxed);
            return;
        }
        core::mem::forget(self.inner.write());
        self.writer.store(me, Ordering::Relaxed);
        self.write_depth.store(1, Ordering::Relaxed);
        self.diag.on_acquire(location);
    }

    /// Take exclusive ownership if immediately available; always succeeds
    /// for the thread already holding the write lock.
    #[must_use]
    pub fn try_write_lock(&self, location: SourceLocation) -> bool {
        let me = crate::thread::current_id();
        if self.writer.load(Ordering::Relaxed) == me {
            self.write_depth.fetch_add(1, Ordering::Relaxed);
            return true;
        }
        match self.inner.try_write() {
            Some(guard) => {
                core::mem::forget(guard);
                self.writer.store(me, Ordering::Relaxed);
                self.write_depth.store(1, Ordering::Relaxed);
                self.diag.on_acquire(location);
                true
            }
            None => false,
        }
    }

    /// Release one acquisition. For the recorded writer this unwinds one
    /// level of depth and releases the platform lock only at zero; any
    /// other thread releases a shared slot.
    pub fn unlock(&self, location: SourceLocation) {
        let me = crate::thread::current_id();
        if self.writer.load(Ordering::Relaxed) == me {
            if self.write_depth.fetch_sub(1, Ordering::Relaxed) == 1 {
                self.diag.on_release(location);
                self.writer.store(NO_WRITER, Ordering::Relaxed);
                // SAFETY: this thread holds the exclusive lock; it is the
                // recorded writer and the depth just reached zero.
                unsafe { self.inner.force_unlock_write() };
            }
            return;
        }
        // A recorded writer other than the caller means the lock is held
        // exclusively; releasing a "shared slot" here would strip the
        // writer's lock.
        self.diag.check_exclusive_conflict(location);
        self.diag.check_held(self.inner.is_locked(), location);
        // SAFETY: caller contract; the thread holds a shared slot
        // (per-reader identity is not tracked, matching the platform
        // primitive's own unlock contract).
        unsafe { self.inner.force_unlock_read() };
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

#[cfg(feature = "diagnostics")]
impl RwLock {
    /// Diagnostic lock id.
    pub fn id(&self) -> u64 {
        self.diag.id()
    }

    /// Diagnostic name given at construction.
    pub fn name(&self) -> Option<&str> {
        self.diag.name()
    }

    /// Writer attribution; readers carry no owner.
    pub fn owner_state(&self) -> crate::OwnerState {
        self.diag.owner_state()
    }

    /// Source location of the outermost write acquisition.
    pub fn write_site(&self) -> Option<SourceLocation> {
        self.diag.lock_site()
    }

    /// Milliseconds the current writer has held the lock; 0 when free.
    pub fn held_ms(&self) -> u64 {
        self.diag.held_ms()
    }
}

impl Drop for RwLock {
    fn drop(&mut self) {
        self.diag.on_drop(self.inner.is_locked());
    }
}
