//! Global thread registry: every live thread, keyed by id, for lookup and
//! iteration independent of which queue currently holds it.
//!
//! Grounded on the teacher's `ThreadManager`'s global thread table
//! (`scheduler/thread.rs`), generalized from its `Vec<Thread>` to a
//! `BTreeMap` keyed by [`ThreadId`] holding [`Weak`] references so the
//! registry never keeps a thread alive on its own (§4.4, "Iteration/
//! debugging").

use alloc::collections::BTreeMap;
use alloc::sync::{Arc, Weak};

use crate::sched::thread::{ThreadHandle, ThreadId};
use crate::sync::Spinlock;

pub struct ThreadRegistry {
    threads: Spinlock<BTreeMap<ThreadId, Weak<ThreadHandle>>>,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self {
            threads: Spinlock::new(BTreeMap::new()),
        }
    }

    /// Registers a newly created thread (`thread_create` step 3).
    pub fn insert(&self, handle: &Arc<ThreadHandle>) {
        self.threads.lock().insert(handle.id, Arc::downgrade(handle));
    }

    /// Drops the registry's entry for `id` (`thread_destroy`, after the
    /// `Exiting -> Invalid` transition).
    pub fn remove(&self, id: ThreadId) {
        self.threads.lock().remove(&id);
    }

    pub fn exists(&self, id: ThreadId) -> bool {
        self.threads
            .lock()
            .get(&id)
            .map(|weak| weak.strong_count() > 0)
            .unwrap_or(false)
    }

    pub fn get(&self, id: ThreadId) -> Option<Arc<ThreadHandle>> {
        self.threads.lock().get(&id).and_then(Weak::upgrade)
    }

    /// Invokes `f` for every thread still alive, in id order. Dead entries
    /// (the thread was dropped without `remove` having run yet) are skipped,
    /// not passed to `f`.
    pub fn for_each(&self, mut f: impl FnMut(&Arc<ThreadHandle>)) {
        let threads = self.threads.lock();
        for weak in threads.values() {
            if let Some(strong) = weak.upgrade() {
                f(&strong);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.threads.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.lock().is_empty()
    }
}

impl Default for ThreadRegistry {
    fn default() -> Self {
        Self::new()
    }
}
