//! The thread object and its state machine.
//!
//! Grounded on the teacher's `scheduler/thread.rs` (`Thread`, `ThreadId`,
//! `ThreadState`, the `ThreadManager` namespacing style) generalized to the
//! attribute set and lifecycle this crate's scheduler and synchronization
//! primitives need. The "three intrusive list links" design note is
//! deliberately not modeled as raw intrusive pointers: a thread's ready- or
//! wait-queue membership is instead a single `Arc<ThreadHandle>` moved
//! between a `VecDeque` in the run queue and one in a wait queue, generalizing
//! the teacher's own `Vec<ThreadId>` ready queue. Invariant 1 (§8) — a thread
//! is on at most one such queue at a time — follows from there being exactly
//! one `Arc` in circulation per membership slot, moved rather than copied.

use alloc::boxed::Box;
use alloc::string::String as AllocString;
use alloc::sync::{Arc, Weak};
use core::fmt;

use crate::error::WaitResult;
use crate::external::{ContextOps, TaskOps, TimeoutHandle};
use crate::sched::types::CpuId;
use crate::sync::Spinlock;

/// Thread identifier: a monotonically increasing integer assigned under a
/// dedicated id spinlock (`thread_create` step 3, §4.4).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread#{}", self.0)
    }
}

/// `Entering → Ready → Running → {Ready, Sleeping, Exiting}`, `Sleeping →
/// Ready`, and the terminal `Exiting → Invalid` transition `thread_destroy`
/// performs right before the object is dropped (§3.1).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ThreadState {
    Entering,
    Ready,
    Running,
    Sleeping,
    Exiting,
    Invalid,
}

/// Which role, if any, the current thread has marked itself as before
/// blocking on a reader/writer lock's inner mutex. Read by the rwlock
/// hand-off logic (§4.5) to decide who to wake.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RwLockHolderKind {
    #[default]
    None,
    Reader,
    Writer,
}

/// CPU pinning. `wired` threads are never migrated; `cpu` is then fixed for
/// the thread's lifetime (§3.1).
#[derive(Debug, Copy, Clone, Default)]
pub struct Affinity {
    pub cpu: Option<crate::sched::types::CpuId>,
    pub wired: bool,
}

/// A `(fn, arg)` pair invoked exactly once the next time this thread is
/// switched, used to release an external spinlock after the thread has been
/// safely enqueued on a wait queue (§4.2, §4.5 read-lock step 5).
///
/// # Safety
/// The pointer is only ever dereferenced by the holder that registered it,
/// from the CPU that is about to context-switch this exact thread back in;
/// it never crosses an actual OS thread boundary, which is what makes the
/// `unsafe impl Send` below sound.
pub struct DeferredCall {
    pub(crate) func: fn(*mut ()),
    pub(crate) arg: *mut (),
}

unsafe impl Send for DeferredCall {}

impl DeferredCall {
    pub fn new(func: fn(*mut ()), arg: *mut ()) -> Self {
        Self { func, arg }
    }

    /// Invokes and consumes the callback.
    fn invoke(self) {
        (self.func)(self.arg);
    }
}

/// The mutable state of a thread, always accessed through its own
/// [`Spinlock`] (`ThreadHandle::lock`). Matches the attribute list in §3.1.
pub struct Thread {
    pub id: ThreadId,
    pub name: AllocString,
    pub state: ThreadState,
    /// Weak: the owning task holds the strong membership (§3.1).
    pub task: Option<Weak<dyn TaskOps>>,
    pub stack: Box<[u8]>,
    pub context: Box<dyn ContextOps>,
    /// The CPU this thread is currently `Running` or `Ready` on, `None`
    /// before its first `thread_ready` or after `thread_destroy`. Fixed for
    /// life if `affinity.wired` (§3.1).
    pub cpu: Option<CpuId>,
    /// Index into the per-CPU ready-queue array, `[0, RQ_COUNT)`.
    pub priority: usize,
    /// Quantum remaining. Negative means "uninitialized, charge a fresh
    /// quantum on next schedule" (§3.1).
    pub ticks: i64,
    pub affinity: Affinity,
    /// Non-`None` while the thread is enqueued on some wait queue. Carries
    /// no data beyond "is blocked" — the wait queue itself owns the strong
    /// reference back to this thread while it is queued.
    pub sleeping: bool,
    pub timeout_handle: Option<TimeoutHandle>,
    /// Set while a registered timeout callback is in flight, so
    /// `thread_exit` can wait it out instead of racing it (§4.4 step 2).
    pub timeout_pending: bool,
    pub rwlock_holder: RwLockHolderKind,
    /// Why this thread last left `Running`, set by whichever blocking call
    /// put it to sleep and left untouched until the next one overwrites it.
    /// Informational only (§4.4 `for_each` debugging) — nothing in the
    /// dispatch path branches on it.
    pub block_reason: Option<crate::sched::types::BlockReason>,
    pub deferred_call: Option<DeferredCall>,
    pub fpu_context: Option<Box<[u8]>>,
    /// The outcome of the blocking call that suspended this thread, stashed
    /// by whichever of {`waitq_wakeup`, a firing timeout, an external
    /// cancellation} resolves it first and read back out the moment the
    /// thread is redispatched (the "a restore() makes save() return a
    /// second time" resumption point described on [`ContextOps::save`]).
    pub wait_result: Option<WaitResult>,
    /// The thread's body, run once by whatever stands in for the
    /// architecture's dispatch trampoline (`Kernel::run_thread_body`).
    /// `take()`n on first dispatch; `None` afterwards for the rest of the
    /// thread's life. A Rust closure generalizes the original's `(fn, void
    /// *arg)` entry-point pair — one captured value instead of a raw pointer
    /// the trampoline has to know how to reinterpret.
    pub entry: Option<Box<dyn FnOnce() + Send>>,
    /// The OS thread standing in for this kernel thread while running under
    /// `cfg(test)` (see `DESIGN.md`: blocking is modeled with real
    /// `std::thread::park`/`unpark` on the host instead of an architecture
    /// context switch, since there is no real hardware to switch). Absent
    /// until the thread has actually been dispatched once.
    #[cfg(test)]
    pub(crate) os_thread: Option<std::thread::Thread>,
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("priority", &self.priority)
            .field("ticks", &self.ticks)
            .finish()
    }
}

impl Thread {
    /// Runs the deferred call registered on this thread, if any, exactly
    /// once (§4.2's "invoked exactly once and cleared").
    pub(crate) fn run_deferred_call(&mut self) {
        if let Some(call) = self.deferred_call.take() {
            call.invoke();
        }
    }
}

/// Enforces the legal state-machine edges from a single call site (Design
/// Notes, §9) instead of letting every module assign `thread.state` directly.
///
/// # Panics
/// If `thread.state != from`, or if `(from, to)` is not a legal edge.
pub fn transition(thread: &mut Thread, from: ThreadState, to: ThreadState) {
    assert_eq!(
        thread.state, from,
        "thread {}: expected state {:?}, found {:?}",
        thread.id, from, thread.state
    );
    let legal = matches!(
        (from, to),
        (ThreadState::Entering, ThreadState::Ready)
            | (ThreadState::Ready, ThreadState::Running)
            | (ThreadState::Running, ThreadState::Ready)
            | (ThreadState::Running, ThreadState::Sleeping)
            | (ThreadState::Running, ThreadState::Exiting)
            | (ThreadState::Sleeping, ThreadState::Ready)
            | (ThreadState::Exiting, ThreadState::Invalid)
    );
    assert!(legal, "thread {}: illegal transition {:?} -> {:?}", thread.id, from, to);
    thread.state = to;
}

/// A thread plus the lock that guards it. The registry and every run/wait
/// queue hold `Arc<ThreadHandle>`s rather than owning `Thread` directly, so a
/// thread can be looked up by id while it migrates between queues.
pub struct ThreadHandle {
    pub id: ThreadId,
    inner: Spinlock<Thread>,
}

impl ThreadHandle {
    pub fn new(thread: Thread) -> Arc<Self> {
        Arc::new(Self {
            id: thread.id,
            inner: Spinlock::new(thread),
        })
    }

    pub fn lock(&self) -> crate::sync::spinlock::SpinlockGuard<'_, Thread> {
        self.inner.lock()
    }

    /// Registers the calling OS thread as the one to `unpark` when this
    /// kernel thread is woken, and parks it. Stands in for "resume this
    /// context later" under `cfg(test)` (see [`Thread::os_thread`]).
    #[cfg(test)]
    pub(crate) fn park(&self) {
        self.inner.lock().os_thread = Some(std::thread::current());
        std::thread::park();
    }

    /// Wakes the OS thread parked in [`Self::park`], if any. A no-op if the
    /// thread was never parked (e.g. it was satisfied by a fast path and
    /// never actually blocked).
    #[cfg(test)]
    pub(crate) fn unpark(&self) {
        if let Some(os_thread) = self.inner.lock().os_thread.take() {
            os_thread.unpark();
        }
    }
}

impl fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadHandle").field("id", &self.id).finish()
    }
}
