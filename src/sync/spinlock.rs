//! Raw mutual-exclusion primitive for short, non-blocking critical sections.
//!
//! Grounded on `examples/nathan237-TrustOS/kernel/src/sync/mod.rs`'s
//! `SpinLock<T>` (test-and-set with exponential backoff); the debug-mode
//! "caller must have disabled interrupts" check is this crate's own
//! addition (§4.1: "checked in debug builds").
//!
//! A bare [`Spinlock`] does **not** touch IPL itself — the caller is
//! responsible for having disabled interrupts first. [`super::IrqSpinlock`]
//! bundles the two for callers that don't want to think about ordering.

use core::cell::UnsafeCell;
use core::hint;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

use crate::ipl::are_interrupts_enabled;

/// Test-and-set spinlock. Must be acquired with interrupts already disabled
/// on the local CPU; violating that is a bug caught by `debug_assert!` in
/// debug builds, exactly as the source's "checked in debug builds" clause
/// describes.
pub struct Spinlock<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for Spinlock<T> {}
unsafe impl<T: Send> Sync for Spinlock<T> {}

impl<T> Spinlock<T> {
    pub const fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    /// Busy-waits on the atomic test-and-set until the lock is acquired.
    #[inline]
    pub fn lock(&self) -> SpinlockGuard<'_, T> {
        debug_assert!(
            !are_interrupts_enabled(),
            "spinlock_lock: interrupts must be disabled by the caller"
        );

        let mut backoff = 0u32;
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            backoff += 1;
            for _ in 0..(1u32 << backoff.min(6)) {
                hint::spin_loop();
            }
        }
        SpinlockGuard { lock: self }
    }

    #[inline]
    pub fn try_lock(&self) -> Option<SpinlockGuard<'_, T>> {
        debug_assert!(
            !are_interrupts_enabled(),
            "spinlock_lock: interrupts must be disabled by the caller"
        );
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
            .then_some(SpinlockGuard { lock: self })
    }

    /// Observable lock state, for the third-party check in property 7
    /// (`spinlock_lock; spinlock_unlock` is a nop on this).
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// # Safety
    /// The caller must guarantee no other thread holds or is spinning to
    /// acquire this lock concurrently with the unsafe unlock (used by the
    /// rwlock hand-off path, which releases a lock it does not itself hold
    /// a guard for after waking its owner).
    #[inline]
    pub unsafe fn force_unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }
}

pub struct SpinlockGuard<'a, T> {
    lock: &'a Spinlock<T>,
}

impl<T> Deref for SpinlockGuard<'_, T> {
    type Target = T;
    #[inline]
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SpinlockGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SpinlockGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::ipl::without_interrupts;
    use crate::tests::serialize;

    #[test]
    fn lock_unlock_is_observably_a_nop() {
        let _s = serialize();
        let lock = Spinlock::new(5);
        without_interrupts(|| {
            assert!(!lock.is_locked());
            {
                let mut guard = lock.lock();
                assert!(lock.is_locked());
                *guard += 1;
            }
            assert!(!lock.is_locked());
        });
        assert_eq!(*without_interrupts(|| *lock.lock()), 6);
    }

    #[test]
    fn try_lock_fails_while_held() {
        let _s = serialize();
        let lock = Spinlock::new(());
        without_interrupts(|| {
            let _guard = lock.lock();
            assert!(lock.try_lock().is_none());
        });
    }
}
