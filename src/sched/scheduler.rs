//! `Kernel`: the per-system scheduling state and every operation that needs
//! "the current thread plus a run queue to hand off to" — thread lifecycle,
//! the dispatch loop, and the blocking paths of the wait queue, mutex, and
//! rwlock primitives (§4.2, §4.3, §4.4, §4.5).
//!
//! The lower-level types ([`WaitQueue`], [`Mutex`], [`RwLock`]) deliberately
//! know nothing about the scheduler; this module is where their data meets
//! "suspend the caller" and "hand off to the next waiter". Grounded on the
//! teacher's `scheduler/` module, which keeps exactly this split between
//! `ThreadManager`'s per-thread bookkeeping and the policy embedded in
//! `PerCpuSchedState`.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::config::{self, KernelConfig, STACK_SIZE, THREAD_NAME_LEN};
use crate::error::{SleepFlags, ThreadCreateError, WakeupMode, WaitResult};
use crate::external::{ContextFactory, FrameAllocator, TaskOps, TimerSource};
use crate::ipl::{ipl_disable, ipl_restore, without_interrupts};
use crate::sched::percpu::PerCpu;
use crate::sched::registry::ThreadRegistry;
use crate::sched::thread::{
    Affinity, DeferredCall, RwLockHolderKind, Thread, ThreadHandle, ThreadId, ThreadState, transition,
};
use crate::sched::types::{BlockReason, CpuId, Priority};
use crate::sync::mutex::Mutex;
use crate::sync::rwlock::{RwLock, RwLockState};
use crate::sync::spinlock::Spinlock;
use crate::sync::waitqueue::WaitQueue;

/// The scheduling substrate for one system: every CPU's ready queues, the
/// thread registry, and the collaborators ([`FrameAllocator`], [`TimerSource`],
/// [`ContextFactory`]) the scheduler calls into but does not own.
pub struct Kernel {
    cpus: Vec<PerCpu>,
    registry: ThreadRegistry,
    next_id: AtomicU64,
    frames: Arc<dyn FrameAllocator>,
    timer: Arc<dyn TimerSource>,
    context_factory: Arc<dyn ContextFactory>,
    config: KernelConfig,
    /// Global runnable-thread count, the sum of every CPU's local `nrdy`
    /// (§4.3, §8 property 3).
    nrdy: AtomicUsize,
}

impl Kernel {
    pub fn new(
        num_cpus: usize,
        frames: Arc<dyn FrameAllocator>,
        timer: Arc<dyn TimerSource>,
        context_factory: Arc<dyn ContextFactory>,
        config: KernelConfig,
    ) -> Self {
        Self {
            cpus: (0..num_cpus).map(|i| PerCpu::new(CpuId(i as u32))).collect(),
            registry: ThreadRegistry::new(),
            next_id: AtomicU64::new(1),
            frames,
            timer,
            context_factory,
            config,
            nrdy: AtomicUsize::new(0),
        }
    }

    pub fn cpu(&self, id: CpuId) -> &PerCpu {
        &self.cpus[id.as_usize()]
    }

    pub fn cpu_count(&self) -> usize {
        self.cpus.len()
    }

    pub fn registry(&self) -> &ThreadRegistry {
        &self.registry
    }

    pub fn config(&self) -> KernelConfig {
        self.config
    }

    /// Global runnable count, mirrored from every CPU's `nrdy` (§8 property
    /// 3: used by tests to check `sum(cpu.nrdy) == kernel.nrdy()`).
    pub fn nrdy(&self) -> usize {
        self.nrdy.load(Ordering::Relaxed)
    }

    // ---- thread lifecycle (§4.4) ----------------------------------------

    /// `thread_create`: allocates a stack and a fresh context, assigns an id,
    /// and registers the thread in state `Entering` — not yet runnable until
    /// a `thread_ready` call. `priority` starts at a sentinel the first
    /// `thread_ready` recognizes and handles by enqueuing into `rq[0]`
    /// un-demoted (§3.1, §4.4 step 5).
    pub fn thread_create(
        &self,
        entry: Box<dyn FnOnce() + Send + 'static>,
        task: Option<Weak<dyn TaskOps>>,
        name: &str,
        affinity: Affinity,
    ) -> Result<Arc<ThreadHandle>, ThreadCreateError> {
        if self.registry.len() >= config::MAX_THREADS {
            return Err(ThreadCreateError::OutOfThreadSlots);
        }
        let stack = self
            .frames
            .alloc_stack(STACK_SIZE)
            .ok_or(ThreadCreateError::OutOfStacks)?;
        let id = ThreadId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let name: String = name.chars().take(THREAD_NAME_LEN).collect();
        let context = self.context_factory.create();

        let thread = Thread {
            id,
            name,
            state: ThreadState::Entering,
            task: task.clone(),
            stack,
            context,
            cpu: None,
            priority: 0,
            ticks: -1,
            affinity,
            sleeping: false,
            timeout_handle: None,
            timeout_pending: false,
            rwlock_holder: RwLockHolderKind::None,
            block_reason: None,
            deferred_call: None,
            fpu_context: None,
            wait_result: None,
            entry: Some(entry),
            #[cfg(test)]
            os_thread: None,
        };
        let handle = ThreadHandle::new(thread);
        without_interrupts(|| self.registry.insert(&handle));
        if let Some(task) = task.and_then(|w| w.upgrade()) {
            task.add_thread(id);
        }
        log::debug!("thread_create: {}", id);
        Ok(handle)
    }

    /// Runs a thread's body. Stands in for the architecture-specific
    /// "cushion" that the dispatch loop's `restore()` first jumps into on a
    /// brand-new thread: unwraps and calls the stored entry closure, then
    /// falls into `thread_exit` exactly as the cushion falls through when
    /// the entry function returns (§4.4, `thread_create` step 4's
    /// commentary: "the cushion... calls `fn(arg)`, then falls into
    /// `thread_exit`").
    pub fn run_thread_body(&self, cpu: CpuId, t: &Arc<ThreadHandle>) {
        let body = without_interrupts(|| t.lock().entry.take());
        if let Some(body) = body {
            body();
        }
        self.thread_exit(cpu, t);
    }

    /// `thread_ready` (§4.3 step 4, §4.4 step 5): makes a thread runnable.
    /// `performing_cpu` is "the current CPU" the protocol refers to, used
    /// when the thread isn't wired to a specific one. Demotes the thread one
    /// priority notch, except for the very first call on a thread still in
    /// `Entering` (which lands in `rq[0]` un-demoted) — the `Ready` state
    /// check rejects a double-ready as a programming error.
    pub fn thread_ready(&self, performing_cpu: CpuId, t: &Arc<ThreadHandle>) {
        without_interrupts(|| {
            let (target_cpu, priority) = {
                let mut th = t.lock();
                if th.state == ThreadState::Ready {
                    crate::kernel_panic!("thread_ready: thread {} is already ready", th.id);
                }
                let from = th.state;
                let new_priority = if from == ThreadState::Entering {
                    0
                } else {
                    Priority(th.priority).demoted().as_usize()
                };
                th.priority = new_priority;
                let target_cpu = if th.affinity.wired {
                    th.affinity.cpu.unwrap_or(performing_cpu)
                } else {
                    performing_cpu
                };
                th.cpu = Some(target_cpu);
                transition(&mut th, from, ThreadState::Ready);
                (target_cpu, new_priority)
            };
            self.cpu(target_cpu).enqueue(priority, t.clone());
            self.nrdy.fetch_add(1, Ordering::Relaxed);
            log::trace!("thread_ready: {} -> rq[{}] on {:?}", t.id, priority, target_cpu);
        });
    }

    /// `thread_exit` (§4.4 step 2): waits out any timeout callback still in
    /// flight, then transitions to `Exiting`. The original never returns
    /// from here (it falls straight into the scheduler); this crate returns
    /// control to the caller instead so the host can drive `thread_destroy`
    /// explicitly, since there is no perpetual dispatch loop to fall into on
    /// the test harness.
    pub fn thread_exit(&self, cpu: CpuId, t: &Arc<ThreadHandle>) {
        while without_interrupts(|| t.lock().timeout_pending) {
            core::hint::spin_loop();
        }
        without_interrupts(|| {
            let mut th = t.lock();
            let from = th.state;
            transition(&mut th, from, ThreadState::Exiting);
            drop(th);
            self.cpu(cpu).clear_fpu_owner_if(t.id);
        });
        log::debug!("thread_exit: {}", t.id);
    }

    /// `thread_destroy` (§4.4 step 1-4): the terminal `Exiting -> Invalid`
    /// transition, task-membership removal, FPU-owner slot release, and
    /// deregistration.
    pub fn thread_destroy(&self, t: &Arc<ThreadHandle>) {
        let (id, task, cpu) = without_interrupts(|| {
            let mut th = t.lock();
            let from = th.state;
            transition(&mut th, from, ThreadState::Invalid);
            (th.id, th.task.clone(), th.cpu)
        });
        if let Some(cpu) = cpu {
            without_interrupts(|| self.cpu(cpu).clear_fpu_owner_if(id));
        }
        if let Some(task) = task.and_then(|w| w.upgrade()) {
            task.remove_thread(id);
        }
        without_interrupts(|| self.registry.remove(id));
        log::debug!("thread_destroy: {}", id);
    }

    // ---- dispatch loop (§4.3) --------------------------------------------

    /// Pops the next runnable thread off `cpu`'s ready queues and installs it
    /// as `current`, charging it a fresh quantum if it doesn't have one left
    /// over (§4.3 steps 3-5). Returns `None` if nothing is runnable (the
    /// caller idles).
    pub fn dispatch(&self, cpu: CpuId) -> Option<Arc<ThreadHandle>> {
        without_interrupts(|| {
            let Some((priority, t)) = self.cpu(cpu).dequeue_highest() else {
                log::trace!("dispatch: {:?} idle", cpu);
                return None;
            };
            self.nrdy.fetch_sub(1, Ordering::Relaxed);
            let has_fpu_context = {
                let mut th = t.lock();
                let from = th.state;
                transition(&mut th, from, ThreadState::Running);
                th.cpu = Some(cpu);
                if th.ticks < 0 {
                    th.ticks = config::quantum_for_priority(priority) as i64;
                }
                th.fpu_context.is_some()
            };
            // A thread that has used the FPU before reclaims the CPU's
            // FPU-owner slot on dispatch; a fresh thread leaves it alone
            // (nothing to restore yet, lazily claimed on first real use).
            if has_fpu_context {
                self.cpu(cpu).set_fpu_owner(t.id);
            }
            self.cpu(cpu).set_current(Some(t.clone()));
            Some(t)
        })
    }

    /// The full dispatch loop (§4.3): if the outgoing thread is still
    /// `Running` (a voluntary yield or quantum expiry, as opposed to having
    /// already transitioned itself to `Sleeping` or `Exiting`), demotes and
    /// requeues it at its *current* priority without a further demotion
    /// notch, then dispatches the next thread.
    pub fn scheduler(&self, cpu: CpuId) -> Option<Arc<ThreadHandle>> {
        without_interrupts(|| {
            if let Some(outgoing) = self.cpu(cpu).current() {
                let still_running = outgoing.lock().state == ThreadState::Running;
                if still_running {
                    let priority = {
                        let mut th = outgoing.lock();
                        transition(&mut th, ThreadState::Running, ThreadState::Ready);
                        th.cpu = Some(cpu);
                        th.priority
                    };
                    self.cpu(cpu).enqueue(priority, outgoing.clone());
                    self.nrdy.fetch_add(1, Ordering::Relaxed);
                }
            }
            self.cpu(cpu).set_current(None);
        });
        self.dispatch(cpu)
    }

    /// Resolves a blocked thread: cancels any pending timeout, stashes the
    /// result it will read back out on resumption, and hands it to
    /// `thread_ready` (which applies the usual one-notch demotion — a
    /// just-woken thread is treated the same as a freshly created one, §4.3).
    /// Under `cfg(test)`, also unparks the OS thread standing in for it.
    fn complete_wakeup(&self, performing_cpu: CpuId, t: &Arc<ThreadHandle>, result: WaitResult) {
        without_interrupts(|| {
            let mut th = t.lock();
            if let Some(handle) = th.timeout_handle.take() {
                self.timer.unregister(handle);
            }
            th.sleeping = false;
            th.wait_result = Some(result);
            th.block_reason = None;
        });
        self.thread_ready(performing_cpu, t);
        #[cfg(test)]
        without_interrupts(|| t.unpark());
    }

    /// Blocks the calling thread until `complete_wakeup` (elsewhere, or
    /// later in this call via `park`) resumes it. Production code reaches
    /// this point by having already called `ContextOps::save()` and checked
    /// it returned `false`; under `cfg(test)` there is no architecture
    /// context to switch to, so it parks the real OS thread backing `t`
    /// instead and trusts `complete_wakeup`/`fire_timeout` to unpark it
    /// (see `DESIGN.md`).
    fn block_current(&self, _cpu: CpuId, t: &Arc<ThreadHandle>) {
        #[cfg(test)]
        {
            t.park();
        }
        #[cfg(not(test))]
        {
            let _ = t;
            unimplemented!(
                "production dispatch loop: save the caller's context, then call \
                 scheduler(cpu) and restore() into whatever it returns"
            );
        }
    }

    // ---- wait queues (§4.2) ----------------------------------------------

    /// `waitq_sleep_timeout`: the core blocking primitive everything else
    /// (mutex, rwlock, `thread_usleep`) is built on.
    ///
    /// - A pending missed wake-up is consumed immediately (`OkAtomic`), no
    ///   matter the flags.
    /// - Otherwise, non-blocking mode fails immediately (`WouldBlock`).
    /// - Otherwise, the thread transitions to `Sleeping`, is enqueued, has
    ///   its timeout (if any) armed, and — critically — has its deferred
    ///   call (if any) run right here, once it is safely on the list and
    ///   before it actually blocks (§4.2, §4.5 read-lock step 5).
    ///
    /// `reason` is recorded on the thread only once this call has committed
    /// to actually sleeping — neither of the two early-return paths above
    /// touches it.
    pub fn waitq_sleep_timeout(
        &self,
        cpu: CpuId,
        t: &Arc<ThreadHandle>,
        wq: &WaitQueue,
        usec: u64,
        flags: SleepFlags,
        reason: BlockReason,
    ) -> WaitResult {
        // One guard spans the whole blocking sequence, not just the queue
        // manipulation: interrupts stay disabled across `block_current`
        // exactly as they would across a real context switch, coming back up
        // only once this thread is dispatched again (§4.1, §4.2).
        without_interrupts(|| {
            if wq.try_consume_missed_wakeup() {
                return WaitResult::OkAtomic;
            }
            if flags == SleepFlags::NonBlocking {
                return WaitResult::WouldBlock;
            }

            {
                let mut th = t.lock();
                let from = th.state;
                transition(&mut th, from, ThreadState::Sleeping);
                th.sleeping = true;
                th.wait_result = None;
                th.block_reason = Some(reason);
            }
            wq.enqueue(t.clone());
            if usec > 0 {
                let handle = self.timer.register(usec, t.id);
                t.lock().timeout_handle = Some(handle);
            }
            t.lock().run_deferred_call();

            self.block_current(cpu, t);

            t.lock().wait_result.take().unwrap_or(WaitResult::Interrupted)
        })
    }

    /// `waitq_wakeup`: `FIRST` pops (or records a missed wake-up on an empty
    /// list); `ALL` drains every waiter. Both resolve each woken thread
    /// through [`Self::complete_wakeup`].
    pub fn waitq_wakeup(&self, cpu: CpuId, wq: &WaitQueue, mode: WakeupMode) {
        match mode {
            WakeupMode::First => {
                match without_interrupts(|| wq.wake_one()) {
                    Some(t) => self.complete_wakeup(cpu, &t, WaitResult::OkBlocked),
                    None => log::trace!("waitq_wakeup: empty list, recording missed wakeup"),
                }
            }
            WakeupMode::All => {
                for t in without_interrupts(|| wq.wake_all()) {
                    self.complete_wakeup(cpu, &t, WaitResult::OkBlocked);
                }
            }
        }
    }

    /// Fires a registered timeout: removes `tid` from `wq` if it is still
    /// there and resolves it with `Timeout`. Returns `false` if the thread
    /// had already been woken some other way — the race `WaitQueue::remove`
    /// exists to settle (§5 "Cancellation and timeouts").
    pub fn fire_timeout(&self, cpu: CpuId, wq: &WaitQueue, tid: ThreadId) -> bool {
        match without_interrupts(|| wq.remove(tid)) {
            Some(t) => {
                without_interrupts(|| t.lock().timeout_pending = true);
                self.complete_wakeup(cpu, &t, WaitResult::Timeout);
                without_interrupts(|| t.lock().timeout_pending = false);
                true
            }
            None => false,
        }
    }

    // ---- mutex (§3.4) -----------------------------------------------------

    /// `mutex_lock`: an uncontended acquire never leaves the fast path
    /// (`OkAtomic`); a contended one blocks on the mutex's own wait queue.
    pub fn mutex_lock<T>(
        &self,
        cpu: CpuId,
        t: &Arc<ThreadHandle>,
        mutex: &Mutex<T>,
        usec: u64,
        flags: SleepFlags,
    ) -> WaitResult {
        if without_interrupts(|| mutex.try_acquire()) {
            return WaitResult::OkAtomic;
        }
        let reason = match without_interrupts(|| t.lock().rwlock_holder) {
            RwLockHolderKind::Writer => BlockReason::RwLockWrite,
            _ => BlockReason::Mutex,
        };
        self.waitq_sleep_timeout(cpu, t, mutex.waitqueue(), usec, flags, reason)
    }

    /// `mutex_unlock`: hands off directly to the next waiter (keeping
    /// `locked` set) if one exists, otherwise clears `locked`. Never touches
    /// the wait queue's missed-wakeup counter — that bookkeeping is for
    /// `waitq_wakeup`, not this narrower hand-off.
    pub fn mutex_unlock<T>(&self, cpu: CpuId, mutex: &Mutex<T>) {
        match without_interrupts(|| mutex.waitqueue().try_pop_front()) {
            Some(t) => self.complete_wakeup(cpu, &t, WaitResult::OkBlocked),
            None => without_interrupts(|| mutex.force_unlock()),
        }
    }

    // ---- reader/writer lock (§4.5) ----------------------------------------

    /// Wakes waiters on `rwl`'s inner mutex according to who is at the head:
    /// a writer is woken alone; a run of consecutive readers is woken
    /// together, each incrementing `readers_in` on the hand-off's behalf.
    /// `readers_only` (used by the write-lock timeout path) stops at the
    /// first non-reader instead of waking a trailing writer — a writer that
    /// just gave up waiting must not be reawakened by the readers it was
    /// blocking. Runs with `state` (i.e. `rwl.lock`) held throughout.
    ///
    /// The inner mutex is only ever released when the queue was empty from
    /// the very first look (nobody to hand off to). Once a reader or writer
    /// has been woken, `exclusive` stays locked — it transfers to whoever was
    /// just woken rather than being dropped out from under them (§8 inv. 4).
    fn let_others_in<T>(&self, cpu: CpuId, rwl: &RwLock<T>, state: &mut RwLockState, readers_only: bool) {
        let mut woke_anyone = false;
        loop {
            match rwl.exclusive.waitqueue().front_holder_kind() {
                None => {
                    if !woke_anyone {
                        rwl.exclusive.force_unlock();
                    }
                    return;
                }
                Some(RwLockHolderKind::Writer) => {
                    if readers_only {
                        return;
                    }
                    if let Some(t) = rwl.exclusive.waitqueue().try_pop_front() {
                        self.complete_wakeup(cpu, &t, WaitResult::OkBlocked);
                    }
                    return;
                }
                Some(RwLockHolderKind::Reader) => match rwl.exclusive.waitqueue().wake_one_reader_only() {
                    Some(t) => {
                        state.readers_in += 1;
                        woke_anyone = true;
                        self.complete_wakeup(cpu, &t, WaitResult::OkBlocked);
                    }
                    None => return,
                },
                Some(RwLockHolderKind::None) => return,
            }
        }
    }

    /// `rwlock_read_lock` (§4.5): two non-blocking fast paths — an
    /// uncontended inner mutex, or a held-but-reader-owned mutex with no
    /// waiting writer ahead (so joining the readers directly is safe and
    /// starvation-free) — and a blocking path that defers releasing `rwl.lock`
    /// until this thread is actually enqueued on the inner mutex's wait
    /// queue, closing the "enqueue, then unlock" race (§4.2, §4.5 step 5).
    pub fn rwlock_read_lock<T>(
        &self,
        cpu: CpuId,
        t: &Arc<ThreadHandle>,
        rwl: &RwLock<T>,
        usec: u64,
        flags: SleepFlags,
    ) -> WaitResult {
        without_interrupts(|| t.lock().rwlock_holder = RwLockHolderKind::Reader);

        let ipl = ipl_disable();
        let mut state = rwl.lock.lock();

        if rwl.exclusive.try_acquire() {
            state.readers_in += 1;
            drop(state);
            ipl_restore(ipl);
            return WaitResult::OkAtomic;
        }

        if state.readers_in > 0 && rwl.exclusive.waitqueue().is_empty() {
            state.readers_in += 1;
            drop(state);
            ipl_restore(ipl);
            return WaitResult::OkAtomic;
        }

        if flags == SleepFlags::NonBlocking {
            drop(state);
            ipl_restore(ipl);
            return WaitResult::WouldBlock;
        }

        let state_ptr: *const Spinlock<RwLockState> = &rwl.lock;
        t.lock().deferred_call = Some(DeferredCall::new(unlock_spinlock_thunk, state_ptr as *mut ()));
        // Released by the deferred callback once we're safely enqueued, not
        // by this guard's own `Drop` — forgetting it here is what keeps
        // `rwl.lock` held across the enqueue.
        core::mem::forget(state);

        let result = self.waitq_sleep_timeout(
            cpu,
            t,
            rwl.exclusive.waitqueue(),
            usec,
            flags,
            BlockReason::RwLockRead,
        );
        ipl_restore(ipl);
        result
    }

    /// `rwlock_read_unlock` (§4.5): decrements `readers_in`; the last reader
    /// out runs the hand-off.
    pub fn rwlock_read_unlock<T>(&self, cpu: CpuId, rwl: &RwLock<T>) {
        let ipl = ipl_disable();
        {
            let mut state = rwl.lock.lock();
            state.readers_in -= 1;
            if state.readers_in == 0 {
                self.let_others_in(cpu, rwl, &mut state, false);
            }
        }
        ipl_restore(ipl);
    }

    /// `rwlock_write_lock` (§4.5): marks the thread as a writer and contends
    /// for the inner mutex exactly like `mutex_lock`. On a timed-out
    /// acquire, the writer may have been blocking a run of readers behind
    /// it; those are released (but not a trailing writer) before returning.
    pub fn rwlock_write_lock<T>(
        &self,
        cpu: CpuId,
        t: &Arc<ThreadHandle>,
        rwl: &RwLock<T>,
        usec: u64,
        flags: SleepFlags,
    ) -> WaitResult {
        without_interrupts(|| t.lock().rwlock_holder = RwLockHolderKind::Writer);
        let result = self.mutex_lock(cpu, t, &rwl.exclusive, usec, flags);
        if result == WaitResult::Timeout {
            log::debug!("rwlock_write_lock: {} timed out, releasing leading readers", t.id);
            let ipl = ipl_disable();
            {
                let mut state = rwl.lock.lock();
                if state.readers_in > 0 {
                    self.let_others_in(cpu, rwl, &mut state, true);
                }
            }
            ipl_restore(ipl);
        }
        result
    }

    /// `rwlock_write_unlock` (§4.5): always runs the general hand-off (may
    /// wake a single writer or a run of readers).
    pub fn rwlock_write_unlock<T>(&self, cpu: CpuId, rwl: &RwLock<T>) {
        let ipl = ipl_disable();
        {
            let mut state = rwl.lock.lock();
            self.let_others_in(cpu, rwl, &mut state, false);
        }
        ipl_restore(ipl);
    }

    // ---- timed sleep (§4.4) ------------------------------------------------

    /// `thread_usleep`: sleeps on a wait queue nobody else ever touches, so
    /// the only possible outcome of actually blocking is `Timeout`. `usec ==
    /// 0` returns immediately rather than blocking forever with no timer
    /// armed (the `waitq_sleep_timeout` contract only arms a timer for
    /// `usec > 0`).
    pub fn thread_usleep(&self, cpu: CpuId, t: &Arc<ThreadHandle>, usec: u64) -> WaitResult {
        if usec == 0 {
            return WaitResult::OkAtomic;
        }
        let private_wq = WaitQueue::new();
        self.waitq_sleep_timeout(cpu, t, &private_wq, usec, SleepFlags::Blocking, BlockReason::TimedSleep)
    }

    pub fn thread_sleep(&self, cpu: CpuId, t: &Arc<ThreadHandle>, seconds: u64) -> WaitResult {
        self.thread_usleep(cpu, t, seconds.saturating_mul(1_000_000))
    }
}

/// Releases a `Spinlock<RwLockState>` through a raw pointer, for the
/// read-lock blocking path's deferred call (§4.5 step 5). The pointer is
/// only ever the address of the `RwLock` the calling thread itself
/// registered this callback against, dereferenced by the same logical
/// machinery that is about to hand the thread back ownership.
fn unlock_spinlock_thunk(arg: *mut ()) {
    let ptr = arg as *const Spinlock<RwLockState>;
    unsafe { (*ptr).force_unlock() };
}
