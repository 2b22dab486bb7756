//! Busy-wait exclusive lock for very short critical sections.
//!
//! Same operation contract as [`Mutex`](crate::Mutex), including the
//! per-call source location and the diagnostic checks. Two build-time
//! implementations behind one name, selected by the `native-spin`
//! feature: an atomic busy-wait loop, or transparent delegation to the
//! mutex where spinning is undesirable. Callers see the same contract
//! either way and cannot tell which is active.

use crate::location::SourceLocation;

#[cfg(feature = "native-spin")]
use crate::diag::LockDiag;
#[cfg(not(feature = "native-spin"))]
use crate::sync::mutex::Mutex;

/// A busy-wait exclusive lock.
#[cfg(feature = "native-spin")]
pub struct Spinlock {
    locked: std::sync::atomic::AtomicBool,
    diag: LockDiag,
}

#[cfg(feature = "native-spin")]
impl Spinlock {
    pub fn new() -> Self {
        Self {
            locked: std::sync::atomic::AtomicBool::new(false),
            diag: LockDiag::new("spinlock", None),
        }
    }

    /// Spin until exclusive ownership is acquired, recording `location`
    /// for diagnostics.
    pub fn lock(&self, location: SourceLocation) {
        use std::sync::atomic::Ordering;
        self.diag.check_lock(location);
        loop {
            if self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
            // Test-and-test-and-set: spin on the cheap load until the lock
            // looks free, then retry the exchange.
            while self.locked.load(Ordering::Relaxed) {
                std::hint::spin_loop();
            }
        }
        self.diag.on_acquire(location);
    }

    /// Release ownership. Diagnostic builds flag an unlock by a thread
    /// other than the recorded owner as fatal.
    pub fn unlock(&self, location: SourceLocation) {
        self.diag.on_release(location);
        self.locked.store(false, std::sync::atomic::Ordering::Release);
    }
}

#[cfg(feature = "native-spin")]
impl Drop for Spinlock {
    fn drop(&mut self) {
        self.diag
            .on_drop(self.locked.load(std::sync::atomic::Ordering::Relaxed));
    }
}

/// A busy-wait exclusive lock (mutex-backed fallback).
#[cfg(not(feature = "native-spin"))]
pub struct Spinlock {
    inner: Mutex,
}

#[cfg(not(feature = "native-spin"))]
impl Spinlock {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(),
        }
    }

    /// Block until exclusive ownership is acquired, recording `location`
    /// for diagnostics.
    pub fn lock(&self, location: SourceLocation) {
        self.inner.lock(location);
    }

    /// Release ownership. Diagnostic builds flag an unlock by a thread
    /// other than the recorded owner as fatal.
    pub fn unlock(&self, location: SourceLocation) {
        self.inner.unlock(location);
    }
}

impl Default for Spinlock {
    fn default() -> Self {
        Self::new()
    }
}
