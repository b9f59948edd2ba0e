//! Edge case and stress tests for vgb-worker
//!
//! Checkout exclusivity, release ordering and pool reuse under contention.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use vgb_worker::*;

fn manager<S: ThreadState>() -> Arc<ThreadManager<S>> {
    ThreadManager::new(WorkerConfig::default())
}

/// State that records how many times it was created, per worker
struct TrackedContext {
    created: u32,
}

static CONTEXTS_CREATED: AtomicU32 = AtomicU32::new(0);

impl ThreadState for TrackedContext {
    type Error = std::convert::Infallible;

    fn create(_info: &WorkerInfo) -> Result<Self, Self::Error> {
        CONTEXTS_CREATED.fetch_add(1, Ordering::SeqCst);
        Ok(TrackedContext { created: 1 })
    }
}

// ============================================================================
// ORDERING
// ============================================================================

#[test]
fn test_end_to_end_release_log() {
    let manager = manager::<()>();
    let worker = manager.acquire_worker("scenario").unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));

    for item in ["1", "2", "3"] {
        let log = Arc::clone(&log);
        worker.run(move |_| log.lock().unwrap().push(item)).unwrap();
    }
    let release_log = Arc::clone(&log);
    manager.release_thread(&worker, move |_| release_log.lock().unwrap().push("R"));
    manager.put_back(worker.clone());

    worker.wait_idle().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["1", "2", "3", "R"]);
}

#[test]
fn test_fifo_from_many_producers_per_producer_order() {
    let manager = manager::<()>();
    let worker = manager.acquire_worker("fifo").unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let worker = worker.clone();
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for i in 0..250 {
                    let log = Arc::clone(&log);
                    worker.run(move |_| log.lock().unwrap().push((p, i))).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    worker.wait_idle().unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 1000);
    for p in 0..4 {
        let seen: Vec<_> = log.iter().filter(|(q, _)| *q == p).map(|(_, i)| *i).collect();
        assert_eq!(seen, (0..250).collect::<Vec<_>>());
    }
}

#[test]
fn test_on_release_runs_once_after_prior_tasks() {
    let manager = manager::<()>();
    let worker = manager.acquire_worker("release").unwrap();
    let executed = Arc::new(AtomicU32::new(0));
    let seen_at_release = Arc::new(AtomicU32::new(u32::MAX));
    let releases = Arc::new(AtomicU32::new(0));

    for _ in 0..50 {
        let executed = Arc::clone(&executed);
        worker.run(move |_| {
            executed.fetch_add(1, Ordering::SeqCst);
        }).unwrap();
    }
    {
        let executed = Arc::clone(&executed);
        let seen = Arc::clone(&seen_at_release);
        let releases = Arc::clone(&releases);
        manager.release_thread(&worker, move |_| {
            seen.store(executed.load(Ordering::SeqCst), Ordering::SeqCst);
            releases.fetch_add(1, Ordering::SeqCst);
        });
    }
    // Late submissions on the same checkout are refused
    assert!(worker.run(|_| {}).is_err());

    worker.wait_idle().unwrap();
    assert_eq!(releases.load(Ordering::SeqCst), 1);
    assert_eq!(seen_at_release.load(Ordering::SeqCst), 50);
}

// ============================================================================
// EXCLUSIVITY
// ============================================================================

#[test]
fn test_concurrent_checkouts_are_exclusive() {
    let manager = manager::<()>();
    let owners: Arc<Mutex<HashMap<WorkerId, usize>>> = Arc::new(Mutex::new(HashMap::new()));
    let violations = Arc::new(AtomicUsize::new(0));

    let callers: Vec<_> = (0..8)
        .map(|caller| {
            let manager = Arc::clone(&manager);
            let owners = Arc::clone(&owners);
            let violations = Arc::clone(&violations);
            thread::spawn(move || {
                for _ in 0..50 {
                    let worker = manager.acquire_worker("stress").unwrap();
                    assert!(worker.is_working());
                    if owners.lock().unwrap().insert(worker.id(), caller).is_some() {
                        violations.fetch_add(1, Ordering::SeqCst);
                    }

                    worker.run(|_| {}).unwrap();
                    thread::yield_now();

                    owners.lock().unwrap().remove(&worker.id());
                    manager.release_thread(&worker, |_| {});
                    manager.put_back(worker);
                }
            })
        })
        .collect();
    for caller in callers {
        caller.join().unwrap();
    }

    let stats = manager.stats();
    assert_eq!(violations.load(Ordering::SeqCst), 0);
    assert_eq!(stats.checked_out, 0);
    assert!(stats.total_workers <= stats.peak_checked_out);
    assert!(stats.peak_checked_out <= 8);
    assert_eq!(stats.idle_workers, stats.total_workers);
}

#[test]
fn test_two_concurrent_acquires_get_distinct_workers() {
    let manager = manager::<()>();
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let worker = manager.acquire_worker("pair").unwrap();
                let id = worker.id();
                // Both checkouts are live at this point
                barrier.wait();
                manager.release_thread(&worker, |_| {});
                manager.put_back(worker);
                id
            })
        })
        .collect();
    let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_ne!(ids[0], ids[1]);
    let stats = manager.stats();
    assert_eq!(stats.total_workers, 2);
    assert_eq!(stats.idle_workers, 2);
}

#[test]
fn test_stale_handle_cannot_end_live_checkout() {
    let manager = manager::<()>();

    let a = manager.acquire_worker("stale").unwrap();
    let a_copy = a.clone();
    manager.release_thread(&a, |_| {});
    manager.put_back(a);

    let b = manager.acquire_worker("stale").unwrap();
    assert_eq!(b.id(), a_copy.id());

    // Earlier holder returns its copy again while `b` is in use
    manager.release_thread(&a_copy, |_| {});
    manager.put_back(a_copy);

    let c = manager.acquire_worker("stale").unwrap();
    assert_ne!(b.id(), c.id());
    assert!(b.is_working());
    b.run(|_| {}).unwrap();

    let stats = manager.stats();
    assert_eq!(stats.total_workers, 2);
    assert_eq!(stats.idle_workers, 0);
    assert_eq!(stats.checked_out, 2);
}

// ============================================================================
// POOL REUSE
// ============================================================================

#[test]
fn test_sequential_reuse_stays_at_one_worker() {
    let manager = manager::<()>();

    for _ in 0..20 {
        let worker = manager.acquire_worker("serial").unwrap();
        manager.release_thread(&worker, |_| {});
        manager.put_back(worker);
    }

    let stats = manager.stats();
    assert_eq!(stats.total_workers, 1);
    assert_eq!(stats.peak_checked_out, 1);
}

#[test]
fn test_reacquire_before_release_drains() {
    let manager = manager::<()>();
    let log = Arc::new(Mutex::new(Vec::new()));

    let worker = manager.acquire_worker("overlap").unwrap();
    let first = Arc::clone(&log);
    worker.run(move |_| {
        thread::sleep(std::time::Duration::from_millis(20));
        first.lock().unwrap().push("first-task");
    }).unwrap();
    let release = Arc::clone(&log);
    manager.release_thread(&worker, move |_| release.lock().unwrap().push("first-release"));
    manager.put_back(worker);

    // Same worker comes back while the previous checkout is still draining
    let again = manager.acquire_worker("overlap").unwrap();
    let second = Arc::clone(&log);
    again.run(move |_| second.lock().unwrap().push("second-task")).unwrap();
    again.wait_idle().unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["first-task", "first-release", "second-task"]
    );
    assert_eq!(again.phase(), WorkerPhase::Running);
}

#[test]
fn test_thread_state_created_once_across_checkouts() {
    let manager = manager::<TrackedContext>();
    let before = CONTEXTS_CREATED.load(Ordering::SeqCst);

    let mut id = None;
    for _ in 0..5 {
        let lease = manager.checkout("ctx").unwrap();
        id.get_or_insert(lease.id());
        assert_eq!(Some(lease.id()), id);
        let created = lease.run_and_wait(|ctx| ctx.created).unwrap();
        assert_eq!(created, 1);
        lease.release(|ctx| assert_eq!(ctx.created, 1));
    }

    let worker = manager.acquire_worker("ctx").unwrap();
    worker.wait_idle().unwrap();
    assert_eq!(worker.state_inits(), 1);
    assert!(CONTEXTS_CREATED.load(Ordering::SeqCst) - before >= 1);
}

#[test]
fn test_task_panic_does_not_poison_pool() {
    let manager = manager::<()>();

    let lease = manager.checkout("panicky").unwrap();
    let id = lease.id();
    lease.run(|_| panic!("draw failed")).unwrap();
    lease.release(|_| {});

    let lease = manager.checkout("panicky").unwrap();
    assert_eq!(lease.id(), id);
    assert_eq!(lease.run_and_wait(|_| "alive").unwrap(), "alive");
    assert_eq!(lease.worker().panics(), 1);
}
