//! Trait boundaries for the collaborators this crate consumes but does not
//! own: context switching, physical frames for kernel stacks, one-shot
//! timers, and the owning task.
//!
//! The real kernel wires concrete, architecture-specific implementations of
//! these into a running system; this crate only needs the narrow interface.
//! A `mock` implementation of each, usable from `#[cfg(test)]`, lets the
//! scheduling and synchronization logic be exercised deterministically on
//! the host.

use alloc::boxed::Box;
use core::ptr::NonNull;

use crate::sched::thread::ThreadId;

/// Opaque, architecture-specific register-snapshot operations, in the
/// `setjmp`/`longjmp`-style pairing the original `context_save`/
/// `context_restore` use: a context is saved once and may be restored into
/// many times over its life, each restore making the matching `save` call
/// appear to return a second time.
///
/// A real implementation saves/restores a `#[repr(C)]` register file the way
/// the teacher's interrupt frame structs do; this crate never inspects the
/// contents, only asks for snapshots to be taken, armed, or resumed.
pub trait ContextOps: Send {
    /// Captures the current register state into this context. Returns
    /// `false` on the ordinary, direct call; returns `true` when execution
    /// reaches this same call a second time via some other context's
    /// `restore()` — the scheduler's dispatch loop branches on this to tell
    /// "about to switch away" from "just switched back in" apart.
    fn save(&mut self) -> bool;

    /// Arms the context so that resuming it enters `entry` on a stack
    /// spanning `[stack_base, stack_base + stack_size)`, instead of
    /// resuming wherever a previous `save()` left off.
    ///
    /// # Safety
    /// `stack_base` must point to live, exclusively-owned memory of at
    /// least `stack_size` bytes for the lifetime of the thread.
    unsafe fn set_entry(&mut self, entry: usize, stack_base: NonNull<u8>, stack_size: usize);

    /// Resumes the thread at this context. Never returns to the caller;
    /// execution continues from the matching `save()` call instead.
    fn restore(&self) -> !;
}

/// Physical-page allocator for kernel stacks, consumed through a narrow
/// interface (§6: "the scheduler calls into them only through a narrow
/// interface").
pub trait FrameAllocator: Send + Sync {
    /// Allocates a stack of `size` bytes, or `None` on exhaustion.
    fn alloc_stack(&self, size: usize) -> Option<Box<[u8]>>;
}

/// Produces a fresh, architecture-specific [`ContextOps`] for each new
/// thread (`thread_create` step 4, §4.4). Kept separate from `ContextOps`
/// itself because the latter is a `dyn`-safe per-thread object while this is
/// the per-kernel factory that stamps one out.
pub trait ContextFactory: Send + Sync {
    fn create(&self) -> Box<dyn ContextOps>;
}

/// One-shot timer registration used by `waitq_sleep_timeout`.
pub trait TimerSource: Send + Sync {
    /// Registers a callback to fire no sooner than `usec` microseconds from
    /// now, invoked with `tid` as the timed-out thread. Returns a handle
    /// that can cancel the timeout before it fires.
    fn register(&self, usec: u64, tid: ThreadId) -> TimeoutHandle;

    /// Cancels a previously registered timeout. A no-op if it already fired.
    fn unregister(&self, handle: TimeoutHandle);

    /// Monotonic tick count, used for `now_ticks()` bookkeeping.
    fn now_ticks(&self) -> u64;
}

/// Opaque handle to a registered, possibly still-pending timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutHandle(pub u64);

/// The owning task: provides the thread-list lock the core appends new
/// threads to and removes destroyed ones from. Full process lifecycle
/// (address spaces, file descriptors, IPC) is out of scope; only the
/// membership this crate itself needs is modeled.
pub trait TaskOps: Send + Sync {
    fn add_thread(&self, tid: ThreadId);
    fn remove_thread(&self, tid: ThreadId);
}
