//! The concrete [`ptg_sched::ReadyQueue`] workers pull from: a
//! mutex-guarded FIFO with a condition variable, the per-worker
//! "suspend on an empty ready queue" point of Section 5's concurrency
//! model. Sections 4.F/4.G only require a `push`; workers additionally
//! need a blocking `pop`, which is why this lives in `ptg-runtime`
//! rather than `ptg-sched` alongside the trait.

use ptg_sched::ReadyQueue;
use ptg_types::ExecutionContext;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

struct State {
    items: VecDeque<ExecutionContext>,
    shutdown: bool,
}

pub struct SharedReadyQueue {
    state: Mutex<State>,
    cv: Condvar,
}

impl Default for SharedReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedReadyQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                shutdown: false,
            }),
            cv: Condvar::new(),
        }
    }

    /// Blocks until a ready context is available or the queue has been
    /// shut down, in which case it returns `None` and every subsequent
    /// call also returns `None` immediately.
    pub fn pop_blocking(&self) -> Option<ExecutionContext> {
        let mut state = self.state.lock().expect("ready queue poisoned");
        loop {
            if let Some(ctx) = state.items.pop_front() {
                return Some(ctx);
            }
            if state.shutdown {
                return None;
            }
            state = self.cv.wait(state).expect("ready queue poisoned");
        }
    }

    /// Wakes every worker blocked in `pop_blocking` and makes future
    /// calls return `None` once the queue drains — the signal the main
    /// thread sends once `enumerate_tasks()`'s local count has all
    /// completed (or on a CTL(-1) shutdown, Section 4.G).
    pub fn shutdown(&self) {
        let mut state = self.state.lock().expect("ready queue poisoned");
        state.shutdown = true;
        self.cv.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("ready queue poisoned").items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReadyQueue for SharedReadyQueue {
    fn push(&self, ctx: ExecutionContext) {
        let mut state = self.state.lock().expect("ready queue poisoned");
        state.items.push_back(ctx);
        self.cv.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptg_types::ClassId;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn pop_blocks_until_a_push_arrives() {
        let q = Arc::new(SharedReadyQueue::new());
        let q2 = q.clone();
        let handle = thread::spawn(move || q2.pop_blocking());

        thread::sleep(std::time::Duration::from_millis(20));
        q.push(ExecutionContext::new(ClassId(0), vec![1]));

        let ctx = handle.join().unwrap().unwrap();
        assert_eq!(ctx.locals, vec![1]);
    }

    #[test]
    fn shutdown_wakes_blocked_poppers_with_none() {
        let q = Arc::new(SharedReadyQueue::new());
        let q2 = q.clone();
        let handle = thread::spawn(move || q2.pop_blocking());

        thread::sleep(std::time::Duration::from_millis(20));
        q.shutdown();

        assert!(handle.join().unwrap().is_none());
        assert!(q.pop_blocking().is_none(), "stays shut down");
    }
}
