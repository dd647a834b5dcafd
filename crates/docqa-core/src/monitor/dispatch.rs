//! Serialized notification delivery.
//!
//! State changes enqueue a delivery job while the state lock is held, then
//! drain the queue after releasing it. Only one caller drains at a time, so
//! deliveries run in the order the state changed and a callback that causes
//! another change (or subscribes) has that work queued behind the current
//! delivery instead of interleaving with it.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

type Job = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Queue {
    draining: bool,
    jobs: VecDeque<Job>,
}

#[derive(Default)]
pub(super) struct Dispatcher {
    queue: Mutex<Queue>,
}

impl Dispatcher {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn enqueue(&self, job: Job) {
        self.lock().jobs.push_back(job);
    }

    /// Run queued jobs until the queue is empty. Returns immediately if another
    /// caller (possibly further up this stack) is already draining.
    pub(super) fn drain(&self) {
        {
            let mut q = self.lock();
            if q.draining {
                return;
            }
            q.draining = true;
        }
        loop {
            let job = {
                let mut q = self.lock();
                match q.jobs.pop_front() {
                    Some(job) => job,
                    None => {
                        q.draining = false;
                        return;
                    }
                }
            };
            job();
        }
    }
}
