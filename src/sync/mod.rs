//! Synchronization primitives, layered from the bottom up: a bare
//! [`Spinlock`], an IPL-aware wrapper around it, the [`WaitQueue`] blocking
//! primitive, and the two higher-level locks ([`Mutex`], [`RwLock`]) built on
//! top of a wait queue.

pub mod irq_spinlock;
pub mod mutex;
pub mod rwlock;
pub mod spinlock;
pub mod waitqueue;

pub use irq_spinlock::{IrqSpinlock, IrqSpinlockGuard};
pub use mutex::{Mutex, MutexGuard};
pub use rwlock::{RwLock, RwLockReadGuard, RwLockWriteGuard};
pub use spinlock::{Spinlock, SpinlockGuard};
pub use waitqueue::WaitQueue;
