//! # threadtrace
//!
//! A debug-instrumented layer over the platform's native threading
//! primitives: thread creation/join, mutexes, condition variables,
//! read/write locks and spinlocks.
//!
//! Each primitive optionally records the identity of the last thread to
//! acquire it, the source location of the acquisition and timing data,
//! making deadlocks, double-locks, unlock-by-non-owner bugs and
//! lock-contention hotspots visible without an external profiler. The
//! bookkeeping is compiled in by the `diagnostics` feature (on by
//! default); without it the primitives carry no metadata and perform no
//! checks.
//!
//! All primitives are intra-process. Acquisition ordering among contending
//! threads is whatever the platform primitive provides; this layer adds no
//! queuing or fairness of its own.
//!
//! ```
//! use threadtrace::{here, Mutex};
//!
//! let m = Mutex::new();
//! m.lock(here!());
//! // ... critical section ...
//! m.unlock(here!());
//! ```

#![deny(unsafe_code)]

pub mod location;
pub mod registry;
pub mod sync;
pub mod thread;
pub mod time;

mod diag;

pub use diag::{Misuse, OwnerState};
pub use location::SourceLocation;
pub use sync::{Condvar, Mutex, RwLock, Spinlock, WaitOutcome};
pub use thread::Thread;
pub use time::Timespec;

/// Single process-wide advisory mutex for guarding calls into
/// non-thread-safe external routines.
static LIBRARY: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

/// Scoped hold of the process-wide library lock; released on drop.
pub struct LibraryGuard {
    _guard: parking_lot::MutexGuard<'static, ()>,
}

/// Acquire the process-wide advisory lock. Hold the returned guard for the
/// duration of the call into the non-thread-safe routine.
pub fn library_lock() -> LibraryGuard {
    LibraryGuard {
        _guard: LIBRARY.lock(),
    }
}

/// Set up the process-wide thread registry and register the calling
/// thread. Call once before any other operation in this layer; later calls
/// are harmless.
pub fn init() {
    let record = thread::current();
    tracing::debug!(
        sink = diag::log_sink(),
        thread = record.id(),
        "threading layer initialized"
    );
}

/// Tear down the process-wide registry. Fatal while threads spawned
/// through this layer remain live (not yet exited, for detached threads,
/// or not yet joined). The calling thread's own lazily-registered record
/// is retired.
pub fn shutdown() {
    let live = registry::global().live_spawned();
    if live > 0 {
        diag::fatal(Misuse::ShutdownWithLiveThreads { live });
    }
    registry::global().clear();
    tracing::debug!(sink = diag::log_sink(), "threading layer shut down");
}

/// Route this layer's diagnostic output to a host-chosen logging channel
/// id. Configuration only; locking semantics are unaffected.
pub fn set_log_sink(id: i64) {
    diag::set_log_sink(id);
}
