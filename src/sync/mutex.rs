//! Mutex: a wait queue with a binary semaphore counter initialized to
//! "unlocked" (§3.4).
//!
//! The non-blocking path (`try_lock`, released via the `MutexGuard`'s
//! `Drop`) is a complete, ordinary RAII mutex and needs nothing from the
//! scheduler. The blocking path — actually suspending the caller when the
//! mutex is held, and waking the next waiter on unlock — needs the current
//! thread and a per-CPU ready queue to hand off to, so it is exposed as
//! `Kernel::mutex_lock`/`Kernel::mutex_unlock` in `sched::scheduler` rather
//! than as methods here; this file owns only the data and the fast path,
//! the way the original's `mutex_t` is a thin struct around a
//! `waitq_t` and a counter with the blocking logic living in the scheduler.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

use crate::sync::waitqueue::WaitQueue;
use crate::sync::spinlock::Spinlock;

pub struct Mutex<T> {
    pub(crate) wq: WaitQueue,
    pub(crate) locked: Spinlock<bool>,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    pub fn new(data: T) -> Self {
        Self {
            wq: WaitQueue::new(),
            locked: Spinlock::new(false),
            data: UnsafeCell::new(data),
        }
    }

    /// Non-blocking acquire: succeeds only if nobody else holds the mutex.
    /// This alone never needs to wake anyone, so it needs no scheduler
    /// context and can be released via ordinary `Drop`.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        let mut locked = self.locked.lock();
        if *locked {
            None
        } else {
            *locked = true;
            Some(MutexGuard { mutex: self })
        }
    }

    pub(crate) fn waitqueue(&self) -> &WaitQueue {
        &self.wq
    }

    /// Atomic test-and-set acquire with no `MutexGuard` produced — used by
    /// `Kernel::mutex_lock`/`rwlock_write_lock`, which hand off ownership to
    /// a woken waiter directly instead of through RAII.
    pub(crate) fn try_acquire(&self) -> bool {
        let mut locked = self.locked.lock();
        if *locked {
            false
        } else {
            *locked = true;
            true
        }
    }

    pub(crate) fn is_locked(&self) -> bool {
        *self.locked.lock()
    }

    pub(crate) fn force_unlock(&self) {
        *self.locked.lock() = false;
    }
}

pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.force_unlock();
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::ipl::without_interrupts;
    use crate::tests::serialize;

    #[test]
    fn try_lock_excludes_concurrent_holders() {
        let _s = serialize();
        without_interrupts(|| {
            let m = Mutex::new(0u32);
            let mut guard = m.try_lock().expect("uncontended");
            assert!(m.try_lock().is_none());
            *guard += 1;
            drop(guard);
            assert_eq!(*m.try_lock().unwrap(), 1);
        });
    }
}
