use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use threadtrace::{here, Mutex, Spinlock};

fn uncontended(c: &mut Criterion) {
    let mutex = Mutex::new();
    c.bench_function("mutex_uncontended_lock_unlock", |b| {
        b.iter(|| {
            mutex.lock(here!());
            mutex.unlock(here!());
        });
    });

    let spin = Spinlock::new();
    c.bench_function("spinlock_uncontended_lock_unlock", |b| {
        b.iter(|| {
            spin.lock(here!());
            spin.unlock(here!());
        });
    });
}

fn contended(c: &mut Criterion) {
    c.bench_function("mutex_contended_4_threads", |b| {
        b.iter(|| {
            let lock = Arc::new(Mutex::new());
            let counter = Arc::new(AtomicU64::new(0));
            let workers: Vec<_> = (0..4)
                .map(|i| {
                    let (lock, counter) = (Arc::clone(&lock), Arc::clone(&counter));
                    threadtrace::thread::spawn(&format!("bench-{i}"), false, here!(), move || {
                        for _ in 0..1_000 {
                            lock.lock(here!());
                            counter.fetch_add(1, Ordering::Relaxed);
                            lock.unlock(here!());
                        }
                        0
                    })
                })
                .collect();
            for w in workers {
                w.join(here!());
            }
        });
    });
}

criterion_group!(benches, uncontended, contended);
criterion_main!(benches);
