//! Test-only support shared by every module's `#[cfg(test)]` block, plus the
//! end-to-end scenario tests.
//!
//! `cargo test` runs tests concurrently by default, but the primitives in
//! this crate lean on process-wide state (the simulated IPL flag, and the
//! scheduler's per-CPU run queues and thread registry) to stand in for
//! per-CPU hardware state that a real kernel wouldn't need to share across
//! test threads. [`serialize`] is the lock every such test takes first, the
//! same role a kernel gives a single physical CPU: only one test "CPU" at a
//! time gets to observe or mutate that state.

use std::sync::{Mutex, MutexGuard, Once, OnceLock};

static GLOBAL_TEST_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
static LOGGER_INIT: Once = Once::new();

/// Acquires the process-wide test serialization lock. Hold the returned
/// guard for the duration of any test that touches global state shared
/// across `#[test]` functions.
pub(crate) fn serialize() -> MutexGuard<'static, ()> {
    LOGGER_INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
    GLOBAL_TEST_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

mod scenarios;
