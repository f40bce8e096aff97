//! Result codes and the fatal-panic path.
//!
//! The source kernel propagates failures as discrete result codes and
//! reserves `panic()` for programming invariants (a double-ready, an unlock
//! of a lock nobody holds). This module gives both a Rust home: recoverable
//! outcomes are enum variants callers match on, invariant violations go
//! through [`kernel_panic!`], which logs before it aborts so the last thing
//! on the console is a diagnosis, not just a backtrace.

/// Why `thread_create` failed to produce a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadCreateError {
    /// The kernel stack allocator had no pages left.
    OutOfStacks,
    /// The thread slab/registry has no room for another thread object.
    OutOfThreadSlots,
}

impl core::fmt::Display for ThreadCreateError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ThreadCreateError::OutOfStacks => write!(f, "out of kernel stack frames"),
            ThreadCreateError::OutOfThreadSlots => write!(f, "out of thread slots"),
        }
    }
}

/// Outcome of a blocking or potentially-blocking operation: `waitq_sleep_timeout`,
/// `mutex_lock`, and `rwlock_*_lock` all return one of these instead of a raw
/// status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// A wake-up was delivered; the thread actually slept and was resumed.
    OkBlocked,
    /// No sleep occurred — a missed wake-up (or an uncontended fast path)
    /// satisfied the request immediately.
    OkAtomic,
    /// The timer fired before any wake-up arrived.
    Timeout,
    /// Non-blocking mode and no wake-up was pending.
    WouldBlock,
    /// The sleep was cancelled externally before either a wake-up or a
    /// timeout occurred.
    Interrupted,
}

impl WaitResult {
    /// True for the two outcomes that mean "the resource was acquired",
    /// as opposed to the three outcomes that mean "it wasn't, here's why".
    pub fn acquired(self) -> bool {
        matches!(self, WaitResult::OkBlocked | WaitResult::OkAtomic)
    }
}

/// Selects blocking vs. non-blocking mode for `waitq_sleep_timeout` (§4.2):
/// "`flags` selects blocking (blocking) or non-blocking mode."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepFlags {
    Blocking,
    NonBlocking,
}

/// `waitq_wakeup`'s `mode ∈ {FIRST, ALL}` (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeupMode {
    First,
    All,
}

/// Logs a diagnostic through `log::error!` and then panics. Used at the
/// single call sites that enforce a programming invariant (double-ready,
/// unlocking a spinlock not held, an illegal state transition) — these are
/// bugs, not conditions a caller is expected to recover from.
#[macro_export]
macro_rules! kernel_panic {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
        panic!($($arg)*);
    }};
}
