//! Cross-thread scenario tests for the instrumented primitives.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use threadtrace::{here, Condvar, Mutex, RwLock, Timespec};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn mutex_mutual_exclusion_under_stress() {
    init_tracing();
    const THREADS: usize = 8;
    const ROUNDS: u64 = 10_000;

    let lock = Arc::new(Mutex::new());
    // Plain load/store pair: only mutual exclusion keeps the total exact.
    let counter = Arc::new(AtomicU64::new(0));

    let workers: Vec<_> = (0..THREADS)
        .map(|i| {
            let (lock, counter) = (Arc::clone(&lock), Arc::clone(&counter));
            threadtrace::thread::spawn(&format!("mx-{i}"), false, here!(), move || {
                for _ in 0..ROUNDS {
                    lock.lock(here!());
                    let v = counter.load(Ordering::Relaxed);
                    counter.store(v + 1, Ordering::Relaxed);
                    lock.unlock(here!());
                }
                0
            })
        })
        .collect();
    for w in workers {
        w.join(here!());
    }
    assert_eq!(counter.load(Ordering::Relaxed), THREADS as u64 * ROUNDS);
}

#[cfg(feature = "diagnostics")]
#[test]
fn at_most_one_thread_observes_itself_as_owner() {
    init_tracing();
    const THREADS: usize = 4;
    const ROUNDS: usize = 2_000;

    let lock = Arc::new(Mutex::new());
    let workers: Vec<_> = (0..THREADS)
        .map(|i| {
            let lock = Arc::clone(&lock);
            threadtrace::thread::spawn(&format!("own-{i}"), false, here!(), move || {
                let me = threadtrace::thread::current().id();
                for _ in 0..ROUNDS {
                    lock.lock(here!());
                    assert_eq!(lock.owner_state(), threadtrace::OwnerState::Owned(me));
                    lock.unlock(here!());
                }
                0
            })
        })
        .collect();
    for w in workers {
        w.join(here!());
    }
}

#[test]
fn blocked_lock_returns_only_after_unlock() {
    init_tracing();
    let lock = Arc::new(Mutex::new());
    let holder_has_lock = Arc::new(AtomicUsize::new(0));

    let (hl, hf) = (Arc::clone(&lock), Arc::clone(&holder_has_lock));
    let a = threadtrace::thread::spawn("holder-a", false, here!(), move || {
        hl.lock(here!());
        hf.store(1, Ordering::Release);
        threadtrace::thread::sleep(Duration::from_millis(50));
        hl.unlock(here!());
        0
    });

    while holder_has_lock.load(Ordering::Acquire) == 0 {
        std::thread::sleep(Duration::from_millis(1));
    }

    let bl = Arc::clone(&lock);
    let b = threadtrace::thread::spawn("waiter-b", false, here!(), move || {
        let started = Instant::now();
        bl.lock(here!());
        let waited = started.elapsed();
        #[cfg(feature = "diagnostics")]
        assert_eq!(
            bl.owner_state(),
            threadtrace::OwnerState::Owned(threadtrace::thread::current().id())
        );
        bl.unlock(here!());
        waited.as_millis() as i64
    });

    let waited_ms = b.join(here!());
    a.join(here!());
    assert!(
        waited_ms >= 30,
        "B acquired after {waited_ms} ms, before A released"
    );
}

#[test]
fn concurrent_readers_block_writer_until_both_release() {
    init_tracing();
    let lock = Arc::new(RwLock::new("stress"));
    let readers_in = Arc::new(AtomicUsize::new(0));
    let readers_out = Arc::new(AtomicUsize::new(0));

    let readers: Vec<_> = (0..2)
        .map(|i| {
            let (lock, r_in, r_out) = (
                Arc::clone(&lock),
                Arc::clone(&readers_in),
                Arc::clone(&readers_out),
            );
            threadtrace::thread::spawn(&format!("reader-{i}"), false, here!(), move || {
                lock.read_lock(here!());
                r_in.fetch_add(1, Ordering::Release);
                threadtrace::thread::sleep(Duration::from_millis(60));
                r_out.fetch_add(1, Ordering::Release);
                lock.unlock(here!());
                0
            })
        })
        .collect();

    // Both readers hold shared slots simultaneously before the writer asks.
    while readers_in.load(Ordering::Acquire) < 2 {
        std::thread::sleep(Duration::from_millis(1));
    }

    let (wl, w_out) = (Arc::clone(&lock), Arc::clone(&readers_out));
    let writer = threadtrace::thread::spawn("writer", false, here!(), move || {
        wl.write_lock(here!());
        let released = w_out.load(Ordering::Acquire);
        wl.unlock(here!());
        released as i64
    });

    assert_eq!(
        writer.join(here!()),
        2,
        "writer acquired before both readers released"
    );
    for r in readers {
        r.join(here!());
    }
}

#[test]
fn write_reentrancy_holds_readers_out_until_depth_zero() {
    init_tracing();
    let lock = Arc::new(RwLock::new("reentrant-stress"));
    const DEPTH: usize = 3;

    for _ in 0..DEPTH {
        lock.write_lock(here!());
    }
    for step in 1..DEPTH {
        lock.unlock(here!());
        let probe = Arc::clone(&lock);
        let blocked = threadtrace::thread::spawn("probe", false, here!(), move || {
            i64::from(!probe.try_read_lock(here!()))
        })
        .join(here!());
        assert_eq!(blocked, 1, "readers let in after {step} of {DEPTH} releases");
    }
    lock.unlock(here!());

    let probe = Arc::clone(&lock);
    let admitted = threadtrace::thread::spawn("probe", false, here!(), move || {
        let ok = probe.try_read_lock(here!());
        if ok {
            probe.unlock(here!());
        }
        i64::from(ok)
    })
    .join(here!());
    assert_eq!(admitted, 1);
}

#[test]
fn timed_wait_honors_absolute_deadline() {
    init_tracing();
    let m = Mutex::new();
    let cv = Condvar::new();

    m.lock(here!());
    let started = Instant::now();
    let outcome = cv.timed_wait(&m, Timespec::now().add_ms(40), here!());
    let elapsed = started.elapsed();
    m.unlock(here!());

    assert!(outcome.timed_out());
    assert!(elapsed >= Duration::from_millis(30));
    assert!(elapsed < Duration::from_secs(5));
}

#[test]
fn destroy_without_ever_locking_is_accepted() {
    init_tracing();
    drop(Mutex::new());
    drop(RwLock::new("never-held"));
    drop(Condvar::new());
    drop(threadtrace::Spinlock::new());
}

#[test]
fn join_on_detached_handle_is_fatal() {
    init_tracing();
    let t = threadtrace::thread::spawn("detached", true, here!(), || 0);
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || t.join(here!())));
    assert!(result.is_err(), "join on a detached handle must be rejected");
}

#[test]
fn exit_status_reaches_the_joiner() {
    init_tracing();
    let t = threadtrace::thread::spawn("status", false, here!(), || {
        threadtrace::thread::sleep(Duration::from_millis(5));
        threadtrace::thread::exit(-3, here!());
    });
    assert_eq!(t.join(here!()), -3);
}

#[test]
fn producer_consumer_round_trip() {
    init_tracing();
    const ITEMS: i64 = 500;

    let m = Arc::new(Mutex::new());
    let cv = Arc::new(Condvar::new());
    let queue = Arc::new(AtomicU64::new(0)); // items pending
    let consumed = Arc::new(AtomicU64::new(0));

    let (cm, ccv, cq, cc) = (
        Arc::clone(&m),
        Arc::clone(&cv),
        Arc::clone(&queue),
        Arc::clone(&consumed),
    );
    let consumer = threadtrace::thread::spawn("consumer", false, here!(), move || {
        let mut total = 0i64;
        cm.lock(here!());
        while total < ITEMS {
            while cq.load(Ordering::Acquire) == 0 {
                ccv.wait(&cm, here!());
            }
            cq.fetch_sub(1, Ordering::AcqRel);
            cc.fetch_add(1, Ordering::AcqRel);
            total += 1;
        }
        cm.unlock(here!());
        total
    });

    let (pm, pcv, pq) = (Arc::clone(&m), Arc::clone(&cv), Arc::clone(&queue));
    let producer = threadtrace::thread::spawn("producer", false, here!(), move || {
        for _ in 0..ITEMS {
            pm.lock(here!());
            pq.fetch_add(1, Ordering::AcqRel);
            pm.unlock(here!());
            pcv.signal();
        }
        0
    });

    assert_eq!(consumer.join(here!()), ITEMS);
    producer.join(here!());
    assert_eq!(consumed.load(Ordering::Acquire), ITEMS as u64);
    assert_eq!(queue.load(Ordering::Acquire), 0);
}
