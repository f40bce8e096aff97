//! Concurrency and scheduling substrate.
//!
//! This crate is the part of a microkernel that multiplexes CPUs among
//! threads, synchronizes access to kernel data, and drives threads through
//! their lifecycle: the thread object and its state machine, the per-CPU
//! multilevel ready-queue scheduler, and the synchronization primitives that
//! depend on it (IPL-disabling spinlocks, wait queues with timed sleep,
//! mutexes, and a reader/writer lock with direct hand-off).
//!
//! Everything the substrate needs from the rest of a real kernel — context
//! switching, physical memory, timers, the owning task — is modeled as a
//! narrow trait in [`external`] so this crate builds and tests standalone.
#![cfg_attr(not(test), no_std)]
#![allow(clippy::missing_safety_doc)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod external;
pub mod ipl;
pub mod logging;
pub mod sched;
pub mod sync;

#[cfg(test)]
mod tests;

pub use error::{SleepFlags, ThreadCreateError, WakeupMode, WaitResult};
pub use sched::scheduler::Kernel;
pub use sched::thread::{Affinity, ThreadHandle, ThreadId, ThreadState};
pub use sched::types::{BlockReason, CpuId, Priority};
pub use sync::{IrqSpinlock, Mutex, RwLock, Spinlock, WaitQueue};
