//! Exclusive lock with owner/location/timing diagnostics.
//!
//! The lock protocol is explicit `lock`/`unlock` rather than guard-scoped,
//! because condition waits and diagnostic attribution need the acquire and
//! release sites to be independent calls. The diagnostic fields are written
//! strictly inside the window where the platform lock is held, so an
//! observer reading `Owned(x)` knows thread `x` holds the lock at that
//! instant.
//!
//! In non-diagnostic builds no checks are performed: unlocking a mutex the
//! calling thread does not hold is a caller bug with undefined results,
//! exactly as with the raw platform primitive.

use crate::diag::LockDiag;
use crate::location::SourceLocation;

/// An exclusive lock.
pub struct Mutex {
    inner: parking_lot::Mutex<()>,
    pub(crate) diag: LockDiag,
}

impl Mutex {
    /// A new, never-locked mutex.
    pub fn new() -> Self {
        Self {
            inner: parking_lot::Mutex::new(()),
            diag: LockDiag::new("mutex", None),
        }
    }

    /// A new, never-locked mutex carrying `name` for diagnostics.
    pub fn with_name(name: &str) -> Self {
        Self {
            inner: parking_lot::Mutex::new(()),
            diag: LockDiag::new("mutex", Some(name.to_owned())),
        }
    }

    /// Block until exclusive ownership is acquired, then record the owning
    /// thread, `location` and the acquisition time.
    ///
    /// Diagnostic builds treat a second lock by the current owner as fatal;
    /// without diagnostics it deadlocks like the platform primitive.
    pub fn lock(&self, location: SourceLocation) {
        self.diag.check_lock(location);
        // Keep the platform lock held past this scope; release happens in
        // unlock() or via a condition wait.
        core::mem::forget(self.inner.lock());
        self.diag.on_acquire(location);
    }

    /// Release ownership. Diagnostic builds flag an unlock by a thread
    /// other than the recorded owner as fatal rather than silently
    /// releasing.
    pub fn unlock(&self, location: SourceLocation) {
        self.diag.on_release(location);
        // SAFETY: the calling thread holds the lock: the diagnostic build
        // just verified it is the recorded owner, and without diagnostics
        // that is the documented caller contract.
        unsafe { self.inner.force_unlock() };
    }

    /// Reconstruct the guard for a lock this thread already holds, for the
    /// condition-wait protocol.
    ///
    /// # Safety
    ///
    /// The calling thread must currently hold the lock.
    pub(crate) unsafe fn make_guard(&self) -> parking_lot::MutexGuard<'_, ()> {
        // SAFETY: forwarded contract; the guard is only used to release and
        // reacquire around a condition wait and is then forgotten.
        unsafe { self.inner.make_guard_unchecked() }
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

#[cfg(feature = "diagnostics")]
impl Mutex {
    /// Diagnostic lock id.
    pub fn id(&self) -> u64 {
        self.diag.id()
    }

    /// Diagnostic name given at construction, if any.
    pub fn name(&self) -> Option<&str> {
        self.diag.name()
    }

    /// Current owner attribution.
    pub fn owner_state(&self) -> crate::OwnerState {
        self.diag.owner_state()
    }

    /// Source location of the most recent acquisition.
    pub fn lock_site(&self) -> Option<SourceLocation> {
        self.diag.lock_site()
    }

    /// Milliseconds the current owner has held the lock; 0 when free.
    pub fn held_ms(&self) -> u64 {
        self.diag.held_ms()
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        self.diag.on_drop(self.inner.is_locked());
    }
}
