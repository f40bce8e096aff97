//! End-to-end concurrency scenarios (§8): these exercise the scheduler and
//! synchronization primitives across real OS threads rather than a single
//! call stack, since the properties under test — "the waiter actually
//! blocks", "the unlock actually wakes it up", "a timeout and a wake-up never
//! both resolve the same sleep" — are meaningless if everything runs
//! sequentially on one thread. Each simulated kernel thread is backed by one
//! real `std::thread`, parked and unparked in place of an architecture
//! context switch (see `DESIGN.md`).

use alloc::boxed::Box;
use alloc::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::KernelConfig;
use crate::error::{SleepFlags, WaitResult, WakeupMode};
use crate::external::mock::{MockContext, MockTimer};
use crate::external::{ContextFactory, ContextOps, FrameAllocator};
use crate::ipl::without_interrupts;
use crate::sched::scheduler::Kernel;
use crate::sched::thread::{Affinity, ThreadHandle, ThreadState};
use crate::sched::types::{BlockReason, CpuId};
use crate::sync::mutex::Mutex;
use crate::sync::rwlock::RwLock;
use crate::sync::waitqueue::WaitQueue;
use crate::tests::serialize;

struct TestFrames;
impl FrameAllocator for TestFrames {
    fn alloc_stack(&self, size: usize) -> Option<Box<[u8]>> {
        Some(alloc::vec![0u8; size].into_boxed_slice())
    }
}

struct TestContextFactory;
impl ContextFactory for TestContextFactory {
    fn create(&self) -> Box<dyn ContextOps> {
        Box::new(MockContext::default())
    }
}

fn test_kernel(num_cpus: usize) -> Kernel {
    Kernel::new(
        num_cpus,
        Arc::new(TestFrames),
        Arc::new(MockTimer::new()),
        Arc::new(TestContextFactory),
        KernelConfig::new(num_cpus),
    )
}

/// Creates a thread, readies it, and dispatches it — i.e. puts it through
/// `Entering -> Ready -> Running` exactly as a CPU about to run it would,
/// so the blocking calls under test see the `Running` precondition they
/// assert on.
fn create_running(kernel: &Kernel, name: &str, cpu: CpuId) -> Arc<ThreadHandle> {
    let t = kernel
        .thread_create(Box::new(|| {}), None, name, Affinity::default())
        .expect("thread_create");
    kernel.thread_ready(cpu, &t);
    let dispatched = kernel.dispatch(cpu).expect("just readied, must be runnable");
    assert_eq!(dispatched.id, t.id);
    t
}

fn wait_until_sleeping(t: &Arc<ThreadHandle>) {
    for _ in 0..10_000 {
        if without_interrupts(|| t.lock().state) == ThreadState::Sleeping {
            return;
        }
        std::thread::yield_now();
    }
    panic!("thread {} never reached Sleeping", t.id);
}

// S1: a thread is visible on its target CPU's ready queue as soon as
// `thread_ready` returns, before the readying thread does anything else —
// another real thread polling `dispatch` concurrently can pick it up.
#[test]
fn s1_ready_thread_is_immediately_dispatchable_by_another_cpu_poller() {
    let _s = serialize();
    let kernel = Arc::new(test_kernel(1));
    let t = kernel
        .thread_create(Box::new(|| {}), None, "s1", Affinity::default())
        .unwrap();
    let tid = t.id;

    let kernel2 = kernel.clone();
    let poller = std::thread::spawn(move || loop {
        if let Some(dispatched) = kernel2.dispatch(CpuId::BSP) {
            break dispatched.id;
        }
        std::thread::yield_now();
    });

    kernel.thread_ready(CpuId::BSP, &t);
    let dispatched_id = poller.join().unwrap();
    assert_eq!(dispatched_id, tid);
}

// S2: a timed sleep resolves via its own timeout firing, never via an
// unrelated wake-up that happens to race it concurrently on a different
// wait queue.
#[test]
fn s2_timed_sleep_is_unaffected_by_concurrent_unrelated_wakeups() {
    let _s = serialize();
    let kernel = Arc::new(test_kernel(1));
    let t = create_running(&kernel, "sleeper", CpuId::BSP);
    let tid = t.id;
    let wq = Arc::new(WaitQueue::new());

    let kernel2 = kernel.clone();
    let t2 = t.clone();
    let wq2 = wq.clone();
    let sleeper = std::thread::spawn(move || {
        kernel2.waitq_sleep_timeout(CpuId::BSP, &t2, &wq2, 5_000_000, SleepFlags::Blocking, BlockReason::WaitQueue)
    });

    let unrelated_wq = Arc::new(WaitQueue::new());
    let kernel3 = kernel.clone();
    let unrelated_wq2 = unrelated_wq.clone();
    let noise = std::thread::spawn(move || {
        for _ in 0..50 {
            kernel3.waitq_wakeup(CpuId::BSP, &unrelated_wq2, WakeupMode::First);
            std::thread::yield_now();
        }
    });
    noise.join().unwrap();

    wait_until_sleeping(&t);
    assert!(kernel.fire_timeout(CpuId::BSP, &wq, tid));

    assert_eq!(sleeper.join().unwrap(), WaitResult::Timeout);
    assert_eq!(unrelated_wq.missed_wakeups(), 1);
}

// S4: a contended mutex actually suspends the second acquirer, and
// unlocking on a different real thread is what releases it — not a
// coincidence of single-threaded call ordering.
#[test]
fn s4_mutex_unlock_on_another_thread_wakes_the_blocked_waiter() {
    let _s = serialize();
    let kernel = Arc::new(test_kernel(1));
    let mutex = Arc::new(Mutex::new(0u32));

    let owner = create_running(&kernel, "owner", CpuId::BSP);
    assert_eq!(
        kernel.mutex_lock(CpuId::BSP, &owner, &mutex, 0, SleepFlags::Blocking),
        WaitResult::OkAtomic
    );

    let waiter = create_running(&kernel, "waiter", CpuId::BSP);
    let kernel2 = kernel.clone();
    let mutex2 = mutex.clone();
    let waiter2 = waiter.clone();
    let blocked = std::thread::spawn(move || {
        kernel2.mutex_lock(CpuId::BSP, &waiter2, &mutex2, 0, SleepFlags::Blocking)
    });

    wait_until_sleeping(&waiter);
    assert!(
        without_interrupts(|| mutex.is_locked()),
        "mutex must still read as locked while handed off"
    );
    kernel.mutex_unlock(CpuId::BSP, &mutex);

    assert_eq!(blocked.join().unwrap(), WaitResult::OkBlocked);
    assert!(
        without_interrupts(|| mutex.is_locked()),
        "hand-off keeps the mutex locked for its new owner"
    );
}

// S5: one writer and two readers contend on a rwlock across real threads.
// The writer holds exclusive access until it releases; both readers are
// then admitted (the direct hand-off lets the second reader in behind the
// first without re-contending on the writer).
#[test]
fn s5_rwlock_readers_block_behind_a_writer_then_run_concurrently() {
    let _s = serialize();
    let kernel = Arc::new(test_kernel(1));
    let rwl = Arc::new(RwLock::new(0u32));

    let writer = create_running(&kernel, "writer", CpuId::BSP);
    assert_eq!(
        kernel.rwlock_write_lock(CpuId::BSP, &writer, &rwl, 0, SleepFlags::Blocking),
        WaitResult::OkAtomic
    );

    let both_in = Arc::new(AtomicU32::new(0));
    let mut readers = alloc::vec::Vec::new();
    for name in ["r1", "r2"] {
        let reader = create_running(&kernel, name, CpuId::BSP);
        let kernel2 = kernel.clone();
        let rwl2 = rwl.clone();
        let reader2 = reader.clone();
        let both_in2 = both_in.clone();
        readers.push((
            reader.clone(),
            std::thread::spawn(move || {
                let r = kernel2.rwlock_read_lock(CpuId::BSP, &reader2, &rwl2, 0, SleepFlags::Blocking);
                both_in2.fetch_add(1, Ordering::SeqCst);
                r
            }),
        ));
    }

    for (reader, _) in &readers {
        wait_until_sleeping(reader);
    }
    assert_eq!(
        without_interrupts(|| rwl.readers_in()),
        0,
        "readers must not be admitted while the writer holds the lock"
    );

    kernel.rwlock_write_unlock(CpuId::BSP, &rwl);

    for (_, handle) in readers {
        assert_eq!(handle.join().unwrap(), WaitResult::OkBlocked);
    }
    assert_eq!(both_in.load(Ordering::SeqCst), 2);
    assert_eq!(without_interrupts(|| rwl.readers_in()), 2);
}

// S6: full thread lifecycle — create, ready, dispatch, run the body
// (the "cushion" stand-in), exit, destroy — with the body itself running on
// its own real thread so a blocking call inside it can suspend without
// stalling the test driver.
#[test]
fn s6_thread_body_runs_then_exits_and_is_reaped() {
    let _s = serialize();
    let kernel = Arc::new(test_kernel(1));
    let ran = Arc::new(AtomicU32::new(0));
    let ran2 = ran.clone();

    let t = kernel
        .thread_create(
            Box::new(move || {
                ran2.fetch_add(1, Ordering::SeqCst);
            }),
            None,
            "s6",
            Affinity::default(),
        )
        .unwrap();
    kernel.thread_ready(CpuId::BSP, &t);
    let dispatched = kernel.dispatch(CpuId::BSP).unwrap();

    let kernel2 = kernel.clone();
    let t2 = dispatched.clone();
    std::thread::spawn(move || kernel2.run_thread_body(CpuId::BSP, &t2))
        .join()
        .unwrap();

    assert_eq!(ran.load(Ordering::SeqCst), 1);
    assert_eq!(without_interrupts(|| dispatched.lock().state), ThreadState::Exiting);
    assert!(without_interrupts(|| kernel.registry().exists(dispatched.id)));

    kernel.thread_destroy(&dispatched);
    assert!(!without_interrupts(|| kernel.registry().exists(dispatched.id)));
}

// A mutex hand-off and an independent rwlock hand-off running concurrently
// on two entirely separate CPUs don't interfere with each other's
// bookkeeping — `nrdy` across both CPUs stays consistent throughout.
#[test]
fn concurrent_locks_on_separate_cpus_keep_nrdy_consistent() {
    let _s = serialize();
    let kernel = Arc::new(test_kernel(2));
    let cpu_a = CpuId(0);
    let cpu_b = CpuId(1);
    let mutex = Arc::new(Mutex::new(0u32));
    let rwl = Arc::new(RwLock::new(0u32));

    let owner_a = create_running(&kernel, "owner_a", cpu_a);
    kernel.mutex_lock(cpu_a, &owner_a, &mutex, 0, SleepFlags::Blocking);
    let owner_b = create_running(&kernel, "owner_b", cpu_b);
    kernel.rwlock_write_lock(cpu_b, &owner_b, &rwl, 0, SleepFlags::Blocking);

    let waiter_a = create_running(&kernel, "waiter_a", cpu_a);
    let waiter_b = create_running(&kernel, "waiter_b", cpu_b);

    let kernel2 = kernel.clone();
    let mutex2 = mutex.clone();
    let waiter_a2 = waiter_a.clone();
    let ha = std::thread::spawn(move || kernel2.mutex_lock(cpu_a, &waiter_a2, &mutex2, 0, SleepFlags::Blocking));

    let kernel3 = kernel.clone();
    let rwl3 = rwl.clone();
    let waiter_b2 = waiter_b.clone();
    let hb = std::thread::spawn(move || kernel3.rwlock_read_lock(cpu_b, &waiter_b2, &rwl3, 0, SleepFlags::Blocking));

    wait_until_sleeping(&waiter_a);
    wait_until_sleeping(&waiter_b);

    kernel.mutex_unlock(cpu_a, &mutex);
    kernel.rwlock_write_unlock(cpu_b, &rwl);

    assert_eq!(ha.join().unwrap(), WaitResult::OkBlocked);
    assert_eq!(hb.join().unwrap(), WaitResult::OkBlocked);

    let summed: usize = (0..kernel.cpu_count()).map(|i| kernel.cpu(CpuId(i as u32)).nrdy()).sum();
    assert_eq!(summed, kernel.nrdy());
}
