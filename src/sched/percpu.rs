//! Per-CPU scheduling state: the multilevel ready-queue array, the
//! currently-running thread, the idle flag, and local load counters.
//!
//! Grounded on the teacher's `sched_core::PerCpuSchedState` (the per-CPU
//! struct the teacher's policy/mechanism split already carries one of per
//! core), generalized from the teacher's single flat `Vec<ThreadId>` ready
//! queue to the `RQ_COUNT`-wide priority array §3.2 specifies.

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::config::RQ_COUNT;
use crate::sched::thread::{ThreadHandle, ThreadId};
use crate::sched::types::CpuId;
use crate::sync::Spinlock;

/// One FIFO per priority level, guarded independently so unrelated
/// priorities don't contend on the same lock (§3.2).
pub struct PerCpu {
    pub id: CpuId,
    ready_queues: [Spinlock<VecDeque<Arc<ThreadHandle>>>; RQ_COUNT],
    /// Local count of runnable threads, mirrored into the global `nrdy`
    /// (§4.3, §8 property 3).
    nrdy: AtomicUsize,
    idle: AtomicBool,
    current: Spinlock<Option<Arc<ThreadHandle>>>,
    /// The thread whose FPU context this CPU's hardware registers currently
    /// hold, lazily saved/restored rather than on every switch (§3.1,
    /// `thread_destroy` step 1: "clears the owning CPU's FPU-owner slot if it
    /// still points at this thread").
    fpu_owner: Spinlock<Option<ThreadId>>,
}

impl PerCpu {
    pub fn new(id: CpuId) -> Self {
        Self {
            id,
            ready_queues: core::array::from_fn(|_| Spinlock::new(VecDeque::new())),
            nrdy: AtomicUsize::new(0),
            idle: AtomicBool::new(true),
            current: Spinlock::new(None),
            fpu_owner: Spinlock::new(None),
        }
    }

    pub fn fpu_owner(&self) -> Option<ThreadId> {
        *self.fpu_owner.lock()
    }

    pub fn set_fpu_owner(&self, id: ThreadId) {
        *self.fpu_owner.lock() = Some(id);
    }

    /// Clears the FPU-owner slot, but only if it still points at `id` — a
    /// thread created after this one destroyed must not have its ownership
    /// clobbered by a stale clear.
    pub fn clear_fpu_owner_if(&self, id: ThreadId) {
        let mut owner = self.fpu_owner.lock();
        if *owner == Some(id) {
            *owner = None;
        }
    }

    pub fn nrdy(&self) -> usize {
        self.nrdy.load(Ordering::Relaxed)
    }

    pub fn is_idle(&self) -> bool {
        self.idle.load(Ordering::Relaxed)
    }

    pub fn current(&self) -> Option<Arc<ThreadHandle>> {
        self.current.lock().clone()
    }

    pub fn set_current(&self, thread: Option<Arc<ThreadHandle>>) {
        self.idle.store(thread.is_none(), Ordering::Relaxed);
        *self.current.lock() = thread;
    }

    /// Appends `thread` at the tail of `rq[priority]`, clamped to
    /// `RQ_COUNT - 1` so a caller can never index out of bounds.
    pub fn enqueue(&self, priority: usize, thread: Arc<ThreadHandle>) {
        let i = priority.min(RQ_COUNT - 1);
        self.ready_queues[i].lock().push_back(thread);
        self.nrdy.fetch_add(1, Ordering::Relaxed);
    }

    /// Removes and returns the head of the lowest-indexed non-empty queue
    /// (strict priority, FIFO within a priority — §4.3 step 3).
    pub fn dequeue_highest(&self) -> Option<(usize, Arc<ThreadHandle>)> {
        for (i, rq) in self.ready_queues.iter().enumerate() {
            let mut guard = rq.lock();
            if let Some(t) = guard.pop_front() {
                drop(guard);
                self.nrdy.fetch_sub(1, Ordering::Relaxed);
                return Some((i, t));
            }
        }
        None
    }

    /// Sum of every priority queue's length — used only by the invariant
    /// test for §8 property 3 (`sum over priorities of rq[i].count ==
    /// cpu.nrdy`).
    #[cfg(test)]
    pub(crate) fn counted_ready_len(&self) -> usize {
        self.ready_queues.iter().map(|rq| rq.lock().len()).sum()
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::external::mock::MockContext;
    use crate::ipl::without_interrupts;
    use crate::sched::thread::{Affinity, RwLockHolderKind, Thread, ThreadId, ThreadState};
    use crate::tests::serialize;
    use alloc::boxed::Box;
    use alloc::string::String;

    fn thread(id: u64) -> Arc<ThreadHandle> {
        ThreadHandle::new(Thread {
            id: ThreadId(id),
            name: String::from("t"),
            state: ThreadState::Ready,
            task: None,
            stack: alloc::vec![0u8; 4096].into_boxed_slice(),
            context: Box::new(MockContext::default()),
            cpu: None,
            priority: 0,
            ticks: -1,
            affinity: Affinity::default(),
            sleeping: false,
            timeout_handle: None,
            timeout_pending: false,
            rwlock_holder: RwLockHolderKind::None,
            block_reason: None,
            deferred_call: None,
            fpu_context: None,
            wait_result: None,
            entry: None,
            #[cfg(test)]
            os_thread: None,
        })
    }

    #[test]
    fn strict_priority_dispatch_order() {
        let _s = serialize();
        without_interrupts(|| {
            let cpu = PerCpu::new(CpuId(0));
            cpu.enqueue(5, thread(1));
            cpu.enqueue(0, thread(2));
            cpu.enqueue(5, thread(3));
            let (prio, t) = cpu.dequeue_highest().unwrap();
            assert_eq!(prio, 0);
            assert_eq!(t.id, ThreadId(2));
            let (prio, t) = cpu.dequeue_highest().unwrap();
            assert_eq!(prio, 5);
            assert_eq!(t.id, ThreadId(1));
        });
    }

    #[test]
    fn nrdy_matches_queue_contents() {
        let _s = serialize();
        without_interrupts(|| {
            let cpu = PerCpu::new(CpuId(0));
            cpu.enqueue(0, thread(1));
            cpu.enqueue(3, thread(2));
            assert_eq!(cpu.nrdy(), cpu.counted_ready_len());
            cpu.dequeue_highest();
            assert_eq!(cpu.nrdy(), cpu.counted_ready_len());
        });
    }

    #[test]
    fn enqueue_clamps_to_lowest_priority() {
        let _s = serialize();
        without_interrupts(|| {
            let cpu = PerCpu::new(CpuId(0));
            cpu.enqueue(RQ_COUNT + 10, thread(1));
            let (prio, _) = cpu.dequeue_highest().unwrap();
            assert_eq!(prio, RQ_COUNT - 1);
        });
    }
}
