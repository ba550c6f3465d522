//! The top-level `Runtime`: wires the frozen [`ClassRegistry`], the
//! dependency arrays it owns, the worker pool (Section 5) and the
//! remote-deps agent (Component G) into one object an embedder
//! constructs once per process/rank.

use crate::config::RuntimeConfig;
use crate::queue::SharedReadyQueue;
use crate::remote_sink::CommandRemoteSink;
use crate::worker::{spawn_workers, Completion};
use crate::ProgramDescription;
use ptg_deps::TileAllocator;
use ptg_registry::ClassRegistry;
use ptg_remote::{Agent, Command, CommandQueue, Control, Transport};
use ptg_sched::{enumerate_local_with, ReadyQueue, RemoteSink};
use ptg_types::{Env, ExecutionContext, PtgError, PtgResult};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::info;

/// A built, not-yet-run program: the registry is frozen and every
/// locally-owned instance has had its dependency-array leaf forced into
/// existence (Section 4.E).
pub struct Runtime<T: Transport + 'static> {
    config: RuntimeConfig,
    my_rank: u32,
    registry: Arc<ClassRegistry>,
    env: Arc<Env>,
    ready: Arc<SharedReadyQueue>,
    tiles: Arc<TileAllocator>,
    command_queue: Arc<CommandQueue<Command>>,
    agent: Arc<Agent<T>>,
    remote_sink: Arc<CommandRemoteSink>,
    completion: Arc<Completion>,
    local_task_count: usize,
    agent_handle: Mutex<Option<JoinHandle<()>>>,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: Transport + 'static> Runtime<T> {
    /// Loads `program` into a fresh registry, freezes it, enumerates the
    /// instances owned by `my_rank` (seeding the ready queue with every
    /// instance that has no inbound dependency), and builds the
    /// remote-deps agent around `transport`. Mirrors Section 6's
    /// `load_objects` → `assign_global` → `enumerate_tasks` sequence.
    pub fn build(
        program: &dyn ProgramDescription,
        transport: T,
        my_rank: u32,
        config: RuntimeConfig,
    ) -> PtgResult<Self> {
        let mut registry = ClassRegistry::with_max_collisions(config.max_collisions);
        let mut env = Env::new();

        program
            .load_objects(&mut registry, &mut env)
            .map_err(|e| PtgError::InvalidProgram(e.to_string()))?;
        program
            .assign_globals(&mut env)
            .map_err(|e| PtgError::InvalidProgram(e.to_string()))?;
        registry.freeze();

        let registry = Arc::new(registry);
        let env = Arc::new(env);
        let ready = Arc::new(SharedReadyQueue::new());
        let tiles = Arc::new(TileAllocator::new());
        let command_queue = Arc::new(CommandQueue::new());
        let remote_sink = Arc::new(CommandRemoteSink::new(command_queue.clone(), registry.clone()));

        let mut local_task_count = 0usize;
        for class in registry.iter() {
            let expected_mask = class.expected_inbound_mask;
            let class_id = class.id;
            let ready = ready.clone();
            local_task_count += enumerate_local_with(class, &env, my_rank, |locals| {
                if expected_mask == 0 {
                    ready.push(ExecutionContext::new(class_id, locals.to_vec()));
                }
            })?;
        }
        info!(local_task_count, my_rank, "enumeration complete");

        let agent = Arc::new(Agent::new(
            transport,
            config.window_size,
            config.yield_ns,
            config.tile_size,
            command_queue.clone(),
            registry.clone(),
            env.clone(),
            tiles.clone(),
            ready.clone(),
        )?);

        Ok(Self {
            config,
            my_rank,
            registry,
            env,
            ready,
            tiles,
            command_queue,
            agent,
            remote_sink,
            completion: Arc::new(Completion::new()),
            local_task_count,
            agent_handle: Mutex::new(None),
            worker_handles: Mutex::new(Vec::new()),
        })
    }

    /// The local task count `enumerate_tasks()` hands back — the
    /// scheduler's stopping condition (Section 6).
    pub fn local_task_count(&self) -> usize {
        self.local_task_count
    }

    pub fn registry(&self) -> &Arc<ClassRegistry> {
        &self.registry
    }

    /// Starts the agent thread and the worker pool. Returns immediately;
    /// call [`Runtime::wait_for_local_completion`] to block until every
    /// locally-owned instance has executed.
    pub fn start(&self) {
        self.command_queue.push(Command::Control(Control::Enable));

        let agent = self.agent.clone();
        let agent_handle = std::thread::Builder::new()
            .name("ptg-remote-agent".into())
            .spawn(move || agent.run())
            .expect("failed to spawn remote-deps agent thread");
        *self.agent_handle.lock().expect("agent handle poisoned") = Some(agent_handle);

        let workers = spawn_workers(
            self.config.workers,
            self.local_task_count,
            self.registry.clone(),
            self.env.clone(),
            self.ready.clone(),
            self.remote_sink.clone() as Arc<dyn RemoteSink>,
            self.my_rank,
            self.completion.clone(),
        );
        *self.worker_handles.lock().expect("worker handles poisoned") = workers;
    }

    /// Blocks until this rank's `local_task_count()` hooks have all run
    /// to completion. Does not stop the agent — a peer rank may still be
    /// waiting on a rendezvous this rank's workers just completed.
    pub fn wait_for_local_completion(&self) {
        self.completion.wait(self.local_task_count);
    }

    /// Clean shutdown (Section 4.G's `CTL(-1)`, Scenario S5): stops the
    /// ready queue (idempotent if workers already drained it), posts
    /// `Control::Shutdown`, and joins every worker and the agent thread.
    /// Returns the count of tile buffers the allocator had outstanding
    /// at shutdown (Testable Property 3, surfaced the way the source's
    /// `remote_dep_mpi_fini` logs "Total number of released TILES").
    pub fn shutdown(&self) -> usize {
        self.ready.shutdown();
        for handle in self.worker_handles.lock().expect("worker handles poisoned").drain(..) {
            let _ = handle.join();
        }

        self.command_queue.push(Command::Control(Control::Shutdown));
        if let Some(handle) = self.agent_handle.lock().expect("agent handle poisoned").take() {
            let _ = handle.join();
        }

        self.tiles.drain()
    }

    /// Convenience for single-rank programs: start, wait, then shut down.
    pub fn run_to_completion(&self) -> usize {
        self.start();
        self.wait_for_local_completion();
        self.shutdown()
    }
}
