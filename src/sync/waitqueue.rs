//! The blocking primitive all higher-level synchronization is built on: a
//! FIFO list of blocked threads plus a missed-wakeup counter.
//!
//! This module owns only the bookkeeping described in §3.3/§4.2: the list
//! itself, the counter, and the invariant that at most one of
//! `(missed_wakeups > 0, list non-empty)` holds. Turning "a thread is on
//! this list" into "a thread actually stops running" needs the scheduler
//! (the current thread, the per-CPU ready queues, the timer) — that
//! integration lives in `sched::scheduler::waitq_sleep_timeout`/
//! `waitq_wakeup`, which call into the methods here. Grounded on the
//! teacher's `scheduler/io_wait.rs` (`IoChannel`'s private waiter queue
//! behind a `Mutex`), generalized to the counter-based missed-wakeup
//! semantics the original's wait queue actually has.

use alloc::collections::VecDeque;
use alloc::sync::Arc;

use crate::sched::thread::{RwLockHolderKind, ThreadHandle};
use crate::sync::Spinlock;

struct WaitQueueInner {
    waiters: VecDeque<Arc<ThreadHandle>>,
    missed_wakeups: u32,
}

/// FIFO list of blocked threads, paired with a missed-wakeup counter (§3.3).
pub struct WaitQueue {
    inner: Spinlock<WaitQueueInner>,
}

impl WaitQueue {
    pub fn new() -> Self {
        Self {
            inner: Spinlock::new(WaitQueueInner {
                waiters: VecDeque::new(),
                missed_wakeups: 0,
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().waiters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().waiters.len()
    }

    pub fn missed_wakeups(&self) -> u32 {
        self.inner.lock().missed_wakeups
    }

    /// If a missed wake-up is pending, consumes one and returns `true`
    /// without touching the list (the "OK_ATOMIC" fast path of
    /// `waitq_sleep_timeout`, §4.2).
    pub fn try_consume_missed_wakeup(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.missed_wakeups > 0 {
            inner.missed_wakeups -= 1;
            true
        } else {
            false
        }
    }

    /// Appends `thread` to the tail of the wait list. The caller is
    /// responsible for having already transitioned the thread to
    /// `Sleeping` under its own lock.
    pub fn enqueue(&self, thread: Arc<ThreadHandle>) {
        self.inner.lock().waiters.push_back(thread);
    }

    /// Removes and returns the head of the wait list, or records a missed
    /// wakeup if the list is empty (the `FIRST` branch of `waitq_wakeup`,
    /// §4.2).
    pub fn wake_one(&self) -> Option<Arc<ThreadHandle>> {
        let mut inner = self.inner.lock();
        match inner.waiters.pop_front() {
            Some(t) => Some(t),
            None => {
                inner.missed_wakeups += 1;
                None
            }
        }
    }

    /// Drains the entire wait list. A wake-all on an empty list is a no-op
    /// (§4.2: "`ALL` on an empty list is a no-op").
    pub fn wake_all(&self) -> alloc::vec::Vec<Arc<ThreadHandle>> {
        let mut inner = self.inner.lock();
        inner.waiters.drain(..).collect()
    }

    /// Pops the head if present, without recording a missed wake-up when the
    /// list is empty. Mutex/rwlock unlock have their own "is anyone waiting"
    /// bookkeeping (the `locked` flag, `readers_in`) and reach for this
    /// instead of [`Self::wake_one`] so an unlock with no waiters doesn't
    /// leave a spurious missed-wakeup token for some unrelated future waiter
    /// to consume.
    pub(crate) fn try_pop_front(&self) -> Option<Arc<ThreadHandle>> {
        self.inner.lock().waiters.pop_front()
    }

    /// Removes a specific thread from the list if it's still queued
    /// (used by the timeout callback to race safely against a concurrent
    /// wake-up, §5 "Cancellation and timeouts").
    pub fn remove(&self, id: crate::sched::thread::ThreadId) -> Option<Arc<ThreadHandle>> {
        let mut inner = self.inner.lock();
        let pos = inner.waiters.iter().position(|t| t.id == id)?;
        inner.waiters.remove(pos)
    }

    /// The rwlock holder kind of the head waiter, without removing it —
    /// used by `let_others_in` to decide whether to stop the hand-off loop
    /// (§4.5).
    pub(crate) fn front_holder_kind(&self) -> Option<RwLockHolderKind> {
        let inner = self.inner.lock();
        inner.waiters.front().map(|t| t.lock().rwlock_holder)
    }

    /// Pops the head only if it is a `Reader` (the `readers_only` hand-off
    /// path, §4.5). Returns `None` without mutating the list otherwise.
    pub(crate) fn wake_one_reader_only(&self) -> Option<Arc<ThreadHandle>> {
        let mut inner = self.inner.lock();
        match inner.waiters.front() {
            Some(t) if t.lock().rwlock_holder == RwLockHolderKind::Reader => inner.waiters.pop_front(),
            _ => None,
        }
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::external::mock::MockContext;
    use crate::ipl::without_interrupts;
    use crate::sched::thread::{Affinity, Thread, ThreadId, ThreadState};
    use crate::tests::serialize;
    use alloc::boxed::Box;
    use alloc::string::String;

    fn new_thread(id: u64) -> Arc<ThreadHandle> {
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
    fn wake_on_empty_list_records_missed_wakeup() {
        let _s = serialize();
        without_interrupts(|| {
            let wq = WaitQueue::new();
            assert!(wq.wake_one().is_none());
            assert_eq!(wq.missed_wakeups(), 1);
        });
    }

    #[test]
    fn missed_wakeup_is_consumed_atomically() {
        let _s = serialize();
        without_interrupts(|| {
            let wq = WaitQueue::new();
            wq.wake_one();
            assert!(wq.try_consume_missed_wakeup());
            assert_eq!(wq.missed_wakeups(), 0);
            assert!(!wq.try_consume_missed_wakeup());
        });
    }

    #[test]
    fn fifo_order_is_preserved() {
        let _s = serialize();
        without_interrupts(|| {
            let wq = WaitQueue::new();
            wq.enqueue(new_thread(1));
            wq.enqueue(new_thread(2));
            wq.enqueue(new_thread(3));
            assert_eq!(wq.wake_one().unwrap().id, ThreadId(1));
            assert_eq!(wq.wake_one().unwrap().id, ThreadId(2));
            assert_eq!(wq.wake_one().unwrap().id, ThreadId(3));
            assert!(wq.is_empty());
        });
    }

    #[test]
    fn wake_all_on_empty_list_is_a_nop() {
        let _s = serialize();
        without_interrupts(|| {
            let wq = WaitQueue::new();
            assert!(wq.wake_all().is_empty());
            assert_eq!(wq.missed_wakeups(), 0);
        });
    }

    #[test]
    fn invariant_never_both_missed_and_nonempty() {
        let _s = serialize();
        without_interrupts(|| {
            let wq = WaitQueue::new();
            wq.enqueue(new_thread(1));
            // a wake on a non-empty list must not touch the counter
            wq.wake_one();
            assert_eq!(wq.missed_wakeups(), 0);
        });
    }
}
