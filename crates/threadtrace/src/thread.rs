//! Thread lifecycle: spawn, join, exit, rename, current, sleep.
//!
//! Every thread spawned here gets a [`ThreadRecord`] in the process-wide
//! registry before its start routine runs. Attached threads keep their
//! record until joined; detached threads retire it themselves on exit.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crate::diag::{self, Misuse};
use crate::location::SourceLocation;
use crate::registry::{self, ThreadRecord};

thread_local! {
    static CURRENT: RefCell<Option<Arc<ThreadRecord>>> = const { RefCell::new(None) };
}

/// Unwind payload carrying an early exit status. Private to this module;
/// any other panic crossing the runner is propagated to the joiner.
struct ExitStatus(i64);

/// Handle to a thread spawned through [`spawn`].
pub struct Thread {
    record: Arc<ThreadRecord>,
    handle: Option<std::thread::JoinHandle<i64>>,
}

impl Thread {
    /// Registry id of the spawned thread.
    pub fn id(&self) -> u64 {
        self.record.id()
    }

    /// The spawned thread's registry record.
    pub fn record(&self) -> &Arc<ThreadRecord> {
        &self.record
    }

    /// Block until the thread terminates and return its exit status,
    /// retiring its record. Fatal on a handle spawned detached.
    pub fn join(mut self, location: SourceLocation) -> i64 {
        let Some(handle) = self.handle.take() else {
            diag::fatal(Misuse::JoinDetached {
                thread: self.record.id(),
                name: self.record.name(),
            });
        };
        let status = match handle.join() {
            Ok(status) => status,
            // The routine panicked with something other than exit();
            // surface it to the joiner unchanged.
            Err(payload) => panic::resume_unwind(payload),
        };
        registry::global().deregister(self.record.id());
        tracing::debug!(
            sink = diag::log_sink(),
            thread = self.record.id(),
            %location,
            status,
            "joined"
        );
        status
    }
}

/// Spawn a named thread running `f`, registering its record before the
/// routine starts.
///
/// `detached` threads reclaim their own record on exit and cannot be
/// joined. OS-level spawn failure is fatal: callers have no graceful
/// fallback, so the error is reported and the process panics.
pub fn spawn<F>(name: &str, detached: bool, location: SourceLocation, f: F) -> Thread
where
    F: FnOnce() -> i64 + Send + 'static,
{
    let record = registry::global().register(name, detached, location, false);
    let runner_record = Arc::clone(&record);
    let result = std::thread::Builder::new()
        .name(name.to_owned())
        .spawn(move || runner(runner_record, f));
    let handle = match result {
        Ok(handle) => handle,
        Err(err) => {
            registry::global().deregister(record.id());
            tracing::error!(
                sink = diag::log_sink(),
                thread = record.id(),
                name,
                %location,
                error = %err,
                "OS thread creation failed"
            );
            panic!("failed to spawn thread {name:?}: {err}");
        }
    };
    tracing::debug!(
        sink = diag::log_sink(),
        thread = record.id(),
        name,
        detached,
        %location,
        "spawned"
    );
    Thread {
        record,
        handle: if detached {
            drop(handle);
            None
        } else {
            Some(handle)
        },
    }
}

fn runner<F>(record: Arc<ThreadRecord>, f: F) -> i64
where
    F: FnOnce() -> i64,
{
    CURRENT.with(|current| *current.borrow_mut() = Some(Arc::clone(&record)));
    let outcome = panic::catch_unwind(AssertUnwindSafe(f));
    CURRENT.with(|current| *current.borrow_mut() = None);
    if record.is_detached() {
        registry::global().deregister(record.id());
    }
    match outcome {
        Ok(status) => status,
        Err(payload) => match payload.downcast::<ExitStatus>() {
            Ok(status) => status.0,
            Err(payload) => panic::resume_unwind(payload),
        },
    }
}

/// Terminate the calling thread with `status` as its exit value.
///
/// Only meaningful on threads created through [`spawn`]; the status is what
/// a joiner receives. Does not return.
pub fn exit(status: i64, location: SourceLocation) -> ! {
    tracing::debug!(
        sink = diag::log_sink(),
        thread = current_id(),
        status,
        %location,
        "thread exit"
    );
    panic::panic_any(ExitStatus(status));
}

/// The calling thread's registry record, lazily registering one for
/// threads this layer did not spawn (e.g. the process's initial thread).
pub fn current() -> Arc<ThreadRecord> {
    CURRENT.with(|current| {
        let mut slot = current.borrow_mut();
        if let Some(record) = &*slot {
            return Arc::clone(record);
        }
        let name = std::thread::current()
            .name()
            .unwrap_or("external")
            .to_owned();
        let record = registry::global().register(&name, true, crate::here!(), true);
        *slot = Some(Arc::clone(&record));
        record
    })
}

pub(crate) fn current_id() -> u64 {
    current().id()
}

/// Rename the calling thread's record; effective immediately for future
/// diagnostics.
pub fn rename(name: &str) {
    current().set_name(name);
}

/// Suspend the calling thread for at least `duration`, cooperatively with
/// the OS scheduler.
pub fn sleep(duration: Duration) {
    std::thread::sleep(duration);
}
