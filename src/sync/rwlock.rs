//! Reader/writer lock with direct hand-off (§4.5).
//!
//! Grounded on the same pattern as [`crate::sync::mutex::Mutex`]: this file
//! owns the data layout and the non-blocking fast paths; the blocking
//! acquire/release protocol (which needs the current thread, a wait queue to
//! block on, and the scheduler's hand-off machinery) lives on `Kernel` in
//! `sched::scheduler`. The inner mutex doubles as the "exclusive" wait
//! queue, exactly as the original reuses a `mutex_t` for this role instead of
//! inventing a second wait-queue type.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

use crate::sync::mutex::Mutex;
use crate::sync::spinlock::Spinlock;

/// `readers_in`, guarded by `lock` (§3.4's "Data layout").
pub(crate) struct RwLockState {
    pub(crate) readers_in: usize,
}

pub struct RwLock<T> {
    pub(crate) lock: Spinlock<RwLockState>,
    /// Reused as the "exclusive" wait queue: a writer holds it for the
    /// duration of its critical section, and `readers_in > 0` is this
    /// crate's way of saying "the readers collectively hold it" without a
    /// writer anywhere in sight.
    pub(crate) exclusive: Mutex<()>,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for RwLock<T> {}
unsafe impl<T: Send + Sync> Sync for RwLock<T> {}

impl<T> RwLock<T> {
    pub fn new(data: T) -> Self {
        Self {
            lock: Spinlock::new(RwLockState { readers_in: 0 }),
            exclusive: Mutex::new(()),
            data: UnsafeCell::new(data),
        }
    }

    /// Number of readers currently holding the lock. Racy the instant it's
    /// read outside the owning call; exposed for tests and debugging only.
    pub fn readers_in(&self) -> usize {
        self.lock.lock().readers_in
    }

    /// Non-blocking reader acquire: succeeds uncontended, or when the lock is
    /// already held by readers with nobody waiting ahead of them. Needs no
    /// scheduler context, the same role `Mutex::try_lock` plays for `Mutex`.
    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
        let mut state = self.lock.lock();
        if self.exclusive.try_acquire() {
            state.readers_in += 1;
            return Some(RwLockReadGuard { rwl: self });
        }
        if state.readers_in > 0 && self.exclusive.waitqueue().is_empty() {
            state.readers_in += 1;
            return Some(RwLockReadGuard { rwl: self });
        }
        None
    }

    /// Non-blocking writer acquire: succeeds only when the inner mutex is
    /// uncontended.
    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, T>> {
        if self.exclusive.try_acquire() {
            Some(RwLockWriteGuard { rwl: self })
        } else {
            None
        }
    }
}

pub struct RwLockReadGuard<'a, T> {
    rwl: &'a RwLock<T>,
}

impl<T> Deref for RwLockReadGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.rwl.data.get() }
    }
}

impl<T> Drop for RwLockReadGuard<'_, T> {
    fn drop(&mut self) {
        let mut state = self.rwl.lock.lock();
        state.readers_in -= 1;
        if state.readers_in == 0 {
            self.rwl.exclusive.force_unlock();
        }
    }
}

pub struct RwLockWriteGuard<'a, T> {
    rwl: &'a RwLock<T>,
}

impl<T> Deref for RwLockWriteGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.rwl.data.get() }
    }
}

impl<T> DerefMut for RwLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.rwl.data.get() }
    }
}

impl<T> Drop for RwLockWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.rwl.exclusive.force_unlock();
    }
}
