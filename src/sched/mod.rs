//! The scheduling substrate: thread objects, per-CPU ready queues, the
//! global registry, and the `Kernel` type that ties them to the blocking
//! primitives in [`crate::sync`].

pub mod percpu;
pub mod registry;
pub mod scheduler;
pub mod thread;
pub mod types;

pub use percpu::PerCpu;
pub use registry::ThreadRegistry;
pub use scheduler::Kernel;
pub use thread::{Affinity, RwLockHolderKind, Thread, ThreadHandle, ThreadId, ThreadState};
pub use types::{BlockReason, CpuId, Priority};
