//! The worker-thread side of Section 5's scheduling model: N OS threads
//! pulling ready contexts, running the opaque hook, then invoking
//! Component F. Worker-pool *construction* is named as an external
//! collaborator in Section 1's Non-goals; this is the minimal pool
//! `ptg-runtime` needs to actually drive a program, grounded on the
//! channel-plus-thread executor shape `hauchiwa`'s `executor.rs` uses
//! for its own dependency-driven task graph (the teacher itself has no
//! worker pool to draw from, since its task execution is async/tonic).

use crate::queue::SharedReadyQueue;
use ptg_registry::{ClassRegistry, HookStatus};
use ptg_sched::{release_deps, RemoteSink, RELEASE_LOCAL_DEPS, RELEASE_REMOTE_DEPS};
use ptg_types::Env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use tracing::{error, trace};

/// Shared "all of this rank's local tasks have completed" signal —
/// Section 6's `enumerate_tasks() -> N` stopping condition, observed
/// from the worker side.
#[derive(Default)]
pub struct Completion {
    completed: AtomicUsize,
    done: Mutex<bool>,
    cv: Condvar,
}

impl Completion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks one more local hook invocation complete. Returns `true`
    /// exactly once, to whichever thread observes the target count —
    /// that thread alone shuts down the ready queue and wakes waiters.
    fn mark_one_done(&self, target: usize) -> bool {
        let n = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        if n == target {
            let mut done = self.done.lock().expect("completion poisoned");
            *done = true;
            self.cv.notify_all();
            true
        } else {
            false
        }
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    /// Declares completion without incrementing the counter — used when
    /// `target == 0` and no hook will ever run to reach it naturally.
    fn force_done(&self) {
        let mut done = self.done.lock().expect("completion poisoned");
        *done = true;
        self.cv.notify_all();
    }

    /// Blocks until `mark_one_done` has observed `target` completions
    /// (or returns immediately if `target == 0`).
    pub fn wait(&self, target: usize) {
        if target == 0 {
            return;
        }
        let mut done = self.done.lock().expect("completion poisoned");
        while !*done {
            done = self.cv.wait(done).expect("completion poisoned");
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn spawn_workers(
    count: usize,
    target: usize,
    registry: Arc<ClassRegistry>,
    env: Arc<Env>,
    ready: Arc<SharedReadyQueue>,
    remote: Arc<dyn RemoteSink>,
    my_rank: u32,
    completion: Arc<Completion>,
) -> Vec<JoinHandle<()>> {
    if target == 0 {
        // No local work: nothing will ever be pushed, so the queue
        // would otherwise block workers forever.
        ready.shutdown();
        completion.force_done();
    }

    (0..count.max(1))
        .map(|worker_id| {
            let registry = registry.clone();
            let env = env.clone();
            let ready = ready.clone();
            let remote = remote.clone();
            let completion = completion.clone();
            std::thread::Builder::new()
                .name(format!("ptg-worker-{worker_id}"))
                .spawn(move || worker_loop(worker_id, target, &registry, &env, &ready, remote.as_ref(), my_rank, &completion))
                .expect("failed to spawn worker thread")
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn worker_loop(
    worker_id: usize,
    target: usize,
    registry: &ClassRegistry,
    env: &Env,
    ready: &SharedReadyQueue,
    remote: &dyn RemoteSink,
    my_rank: u32,
    completion: &Completion,
) {
    while let Some(ctx) = ready.pop_blocking() {
        let class = match registry.element_at(ctx.class) {
            Ok(c) => c,
            Err(e) => {
                error!(worker_id, %e, "ready context names a class absent from the frozen registry");
                continue;
            }
        };

        loop {
            match class.hook.call(&ctx) {
                HookStatus::Done => break,
                // The hook asked to be invoked again; it is responsible
                // for making bounded progress each call (Section 7).
                HookStatus::Again => continue,
                HookStatus::Error => {
                    error!(
                        worker_id,
                        ctx = %ctx.display(&class.name),
                        "hook reported an error; treated as a TransportFailure-equivalent abort"
                    );
                    std::process::abort();
                }
            }
        }
        trace!(worker_id, ctx = %ctx.display(&class.name), "hook done");

        if let Err(e) = release_deps(
            &ctx,
            &class,
            registry,
            env,
            RELEASE_LOCAL_DEPS | RELEASE_REMOTE_DEPS,
            my_rank,
            ready,
            remote,
        ) {
            error!(worker_id, %e, "release_deps failed");
        }

        if completion.mark_one_done(target) {
            ready.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_returns_immediately_for_a_zero_target() {
        let completion = Completion::new();
        completion.force_done();
        completion.wait(0);
    }

    #[test]
    fn mark_one_done_reports_true_only_on_the_target_count() {
        let completion = Completion::new();
        assert!(!completion.mark_one_done(3));
        assert!(!completion.mark_one_done(3));
        assert!(completion.mark_one_done(3));
        assert_eq!(completion.completed(), 3);
    }
}
