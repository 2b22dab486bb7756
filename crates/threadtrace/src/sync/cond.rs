//! Condition variable, bound externally to a [`Mutex`] held by the waiter.
//!
//! Wait atomically releases the mutex and reacquires it before returning,
//! whatever the wake path (signal, broadcast, timeout or spurious wakeup).
//! There is no return value distinguishing spurious wakeups; callers
//! re-check their predicate in a loop.
//!
//! A signal with no waiter is lost. The platform condition primitive is
//! lost-wakeup-free when signal and wait race under the mutex, so no
//! signal latching is layered on top.

use crate::diag::LockDiag;
use crate::location::SourceLocation;
use crate::sync::mutex::Mutex;
use crate::time::Timespec;

/// Result of a timed wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Woken by a signal, broadcast, or spuriously.
    Woken,
    /// The absolute deadline passed with no wakeup. A normal outcome, not
    /// an error.
    TimedOut,
}

impl WaitOutcome {
    pub fn timed_out(self) -> bool {
        self == Self::TimedOut
    }
}

/// A wait/notify signal. Use with exactly one [`Mutex`] at a time; the
/// platform primitive enforces this.
pub struct Condvar {
    inner: parking_lot::Condvar,
    diag: LockDiag,
}

impl Condvar {
    pub fn new() -> Self {
        Self {
            inner: parking_lot::Condvar::new(),
            diag: LockDiag::new("cond", None),
        }
    }

    /// A new condition variable carrying `name` for diagnostics.
    pub fn with_name(name: &str) -> Self {
        Self {
            inner: parking_lot::Condvar::new(),
            diag: LockDiag::new("cond", Some(name.to_owned())),
        }
    }

    /// Atomically release `mutex` and block until woken, then reacquire it.
    ///
    /// The caller must hold `mutex`; diagnostic builds verify this and
    /// treat a violation as fatal.
    pub fn wait(&self, mutex: &Mutex, location: SourceLocation) {
        mutex.diag.on_wait_release(location);
        // SAFETY: the calling thread holds the mutex (verified above in
        // diagnostic builds; documented contract otherwise).
        let mut guard = unsafe { mutex.make_guard() };
        self.inner.wait(&mut guard);
        // The wait reacquired the lock; keep it held for the caller.
        core::mem::forget(guard);
        mutex.diag.on_acquire(location);
    }

    /// As [`wait`](Self::wait), but gives up once the absolute `deadline`
    /// passes. A deadline already in the past times out immediately. The
    /// mutex is reacquired before returning on every path.
    pub fn timed_wait(
        &self,
        mutex: &Mutex,
        deadline: Timespec,
        location: SourceLocation,
    ) -> WaitOutcome {
        mutex.diag.on_wait_release(location);
        // SAFETY: as in wait() above.
        let mut guard = unsafe { mutex.make_guard() };
        let result = self.inner.wait_until(&mut guard, deadline.to_deadline());
        core::mem::forget(guard);
        mutex.diag.on_acquire(location);
        if result.timed_out() {
            WaitOutcome::TimedOut
        } else {
            WaitOutcome::Woken
        }
    }

    /// Wake at least one waiter, if any. A no-op with none waiting.
    pub fn signal(&self) {
        self.diag.on_notify(false);
        self.inner.notify_one();
    }

    /// Wake all current waiters.
    pub fn broadcast(&self) {
        self.diag.on_notify(true);
        self.inner.notify_all();
    }
}

#[cfg(feature = "diagnostics")]
impl Condvar {
    /// Diagnostic id.
    pub fn id(&self) -> u64 {
        self.diag.id()
    }

    /// Diagnostic name given at construction, if any.
    pub fn name(&self) -> Option<&str> {
        self.diag.name()
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}
