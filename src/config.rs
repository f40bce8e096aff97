//! Compile-time tunables for the scheduling substrate.
//!
//! Grounded on the constants the teacher keeps near the top of
//! `scheduler/types.rs` (`Priority`, quantum lengths) — centralized here
//! instead of scattered across modules so the numbers are in one place.

/// Number of per-CPU ready queues, indexed 0 (highest priority) through
/// `RQ_COUNT - 1` (lowest).
pub const RQ_COUNT: usize = 16;

/// Maximum number of CPUs this build is prepared to schedule across.
/// A real port picks this from the platform's topology discovery; tests and
/// single-CPU callers use [`KernelConfig::single_cpu`].
pub const MAX_CPUS: usize = 32;

/// Size in bytes of a thread's kernel stack (contiguous, page-aligned).
pub const STACK_SIZE: usize = 64 * 1024;

/// Capacity of the thread-object slab (§6 `slab_cache_create`/`alloc`):
/// `thread_create` refuses once the registry holds this many live threads,
/// independent of whether a stack can still be allocated.
pub const MAX_THREADS: usize = 256;

/// Fixed length of a thread's symbolic name buffer.
pub const THREAD_NAME_LEN: usize = 32;

/// Quantum granted to the highest-priority band (`rq[0]`).
pub const QUANTUM_SHORT: u32 = 2;

/// Quantum granted to the middle priority bands.
pub const QUANTUM_DEFAULT: u32 = 10;

/// Quantum granted to the lowest-priority band (`rq[RQ_COUNT - 1]`).
pub const QUANTUM_LONG: u32 = 50;

/// Runtime-configurable knobs that are legitimately not compile-time
/// constants (the original reads these from `config.cpu_active`).
#[derive(Debug, Clone, Copy)]
pub struct KernelConfig {
    /// Number of CPUs currently online; used for `nrdy` load averaging.
    pub cpu_active: usize,
}

impl KernelConfig {
    /// Configuration for a single-CPU system (the default for tests and for
    /// any caller that hasn't brought up secondary CPUs yet).
    pub const fn single_cpu() -> Self {
        Self { cpu_active: 1 }
    }

    pub const fn new(cpu_active: usize) -> Self {
        Self { cpu_active }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::single_cpu()
    }
}

/// Quantum reload policy for a freshly dispatched thread whose `ticks`
/// sentinel is negative (§4.3: "the implementation is free to choose
/// per-priority quanta as long as all priorities receive a positive
/// quantum"). Banded by priority index: the closer to `rq[0]`, the shorter
/// the slice, so interactive/high-priority threads get scheduled more often
/// at the cost of running for less time each turn.
pub fn quantum_for_priority(priority: usize) -> u32 {
    if priority == 0 {
        QUANTUM_SHORT
    } else if priority >= RQ_COUNT - 1 {
        QUANTUM_LONG
    } else {
        QUANTUM_DEFAULT
    }
}
