//! Component G: the single-threaded remote-deps agent. Owns the
//! transport, drives the ACTIVATE/GET/PUT state machines described in
//! Section 4.G, and is the only thread allowed to call into `Transport`.

use crate::aggregator::RemoteDeps;
use crate::command::{Command, CommandQueue, Control};
use crate::tag::TagAllocator;
use crate::transport::{ActivateMsg, GetMsg, Transport};
use ptg_deps::{Freelist, TileAllocator};
use ptg_registry::ClassRegistry;
use ptg_sched::{release_deps, ReadyQueue, RemoteSink, RELEASE_LOCAL_DEPS};
use ptg_types::{Env, ExecutionContext, PtgError, PtgResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, trace, warn};

/// Maximum output parameters any class in the program declares — the
/// `P` of Section 4.G's `W × P` outstanding transfers. Computed once
/// from the frozen registry.
fn max_outputs_per_class(registry: &ClassRegistry) -> usize {
    registry.iter().map(|c| c.outputs.len()).max().unwrap_or(0)
}

/// The receive side's bookkeeping for one in-flight rendezvous, keyed by
/// its allocated base tag.
struct RecvSlot {
    origin: ExecutionContext,
    remaining: u32,
    /// `(origin rank, sender's deps key)` — kept so a redelivered
    /// ACTIVATE for the same rendezvous (Testable Property 4: wire
    /// idempotence) can be recognized and dropped instead of issuing a
    /// second GET and a second downstream release.
    source: (u32, u64),
}

/// A [`RemoteSink`] that panics if invoked — wired into the re-entrant
/// call to [`release_deps`] the agent makes on DELIVER, where only
/// `RELEASE_LOCAL_DEPS` is requested so no further remote edge should
/// ever fire.
struct NoFurtherRemote;
impl RemoteSink for NoFurtherRemote {
    fn activate(&self, _origin: &ExecutionContext, _rank: u32, _which: u32) {
        unreachable!("a DELIVER pass requests only local release, never a second hop");
    }
}

pub struct Agent<T: Transport> {
    transport: T,
    window: usize,
    yield_ns: u64,
    tile_size: usize,
    tags: Mutex<TagAllocator>,
    inbox: Arc<CommandQueue<Command>>,
    registry: Arc<ClassRegistry>,
    env: Arc<Env>,
    tiles: Arc<TileAllocator>,
    ready: Arc<dyn ReadyQueue>,
    send_pending: Mutex<HashMap<u64, Arc<Mutex<RemoteDeps>>>>,
    recv_pending: Mutex<HashMap<u32, RecvSlot>>,
    deps_pool: Freelist<Arc<Mutex<RemoteDeps>>>,
    dep_enabled: AtomicBool,
    next_deps_key: AtomicU64,
}

impl<T: Transport> Agent<T> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: T,
        window: usize,
        yield_ns: u64,
        tile_size: usize,
        inbox: Arc<CommandQueue<Command>>,
        registry: Arc<ClassRegistry>,
        env: Arc<Env>,
        tiles: Arc<TileAllocator>,
        ready: Arc<dyn ReadyQueue>,
    ) -> PtgResult<Self> {
        let p = max_outputs_per_class(&registry).max(1) as u32;
        let max_tag = transport.max_tag().unwrap_or_else(|| {
            warn!("transport did not report a tag ceiling; assuming i32::MAX");
            i32::MAX as u32
        });
        const CONTROL_TAG_SPACE: u32 = 1024;
        if max_tag <= CONTROL_TAG_SPACE || max_tag - CONTROL_TAG_SPACE < (window as u32) * p {
            return Err(PtgError::TagSpaceExhausted(format!(
                "window {window} * {p} outputs does not fit below max tag {max_tag}"
            )));
        }
        Ok(Self {
            transport,
            window,
            yield_ns,
            tile_size,
            tags: Mutex::new(TagAllocator::new(CONTROL_TAG_SPACE, max_tag)),
            inbox,
            registry,
            env,
            tiles,
            ready,
            send_pending: Mutex::new(HashMap::new()),
            recv_pending: Mutex::new(HashMap::new()),
            deps_pool: Freelist::new(),
            dep_enabled: AtomicBool::new(false),
            next_deps_key: AtomicU64::new(1),
        })
    }

    /// Runs the progress loop until a `Control::Shutdown` command is
    /// processed. Intended to run on its own dedicated OS thread.
    pub fn run(&self) {
        let _span = tracing::info_span!("remote_dep_agent", rank = self.transport.rank()).entered();
        loop {
            if self.dep_enabled.load(Ordering::Acquire) && self.try_progress() {
                continue;
            }
            match self.inbox.pop() {
                Some(cmd) => {
                    if !self.handle_command(cmd) {
                        break;
                    }
                }
                None => std::thread::sleep(Duration::from_nanos(self.yield_ns)),
            }
        }
        let drained = self.tiles.drain();
        info!(drained, "agent shutdown: drained tile free-list");
    }

    /// Polls the transport for exactly one completion and handles it.
    /// Returns `true` if something completed, so the caller loops again
    /// before falling back to draining a command.
    fn try_progress(&self) -> bool {
        if let Some((from, msg)) = self.transport.poll_activate() {
            self.on_activate_received(from, msg);
            return true;
        }
        if let Some((to, msg)) = self.transport.poll_get() {
            self.on_get_received(to, msg);
            return true;
        }
        if self.poll_send_completions() {
            return true;
        }
        self.poll_recv_completions()
    }

    fn on_activate_received(&self, from: u32, msg: ActivateMsg) {
        let source = (from, msg.deps_key);
        if self
            .recv_pending
            .lock()
            .expect("recv_pending poisoned")
            .values()
            .any(|slot| slot.source == source)
        {
            warn!(from, deps_key = msg.deps_key, "duplicate ACTIVATE dropped: rendezvous already in flight");
            return;
        }
        let p = max_outputs_per_class(&self.registry).max(1) as u32;
        let base_tag = match self.tags.lock().expect("tag allocator poisoned").next(p) {
            Ok(t) => t,
            Err(e) => {
                error!(%e, "tag space exhausted servicing ACTIVATE");
                std::process::abort();
            }
        };
        trace!(?msg, from, base_tag, "ACTIVATE received, issuing GET");
        self.recv_pending.insert_slot(
            base_tag,
            RecvSlot {
                origin: ExecutionContext::new(msg.class, msg.locals.clone()),
                remaining: msg.which,
                source,
            },
        );
        let reply = GetMsg {
            deps_key: msg.deps_key,
            which: msg.which,
            tag: base_tag,
        };
        if let Err(e) = self.transport.send_get(from, &reply) {
            error!(%e, rank = from, "transport failure sending GET");
            std::process::abort();
        }
    }

    fn on_get_received(&self, to: u32, msg: GetMsg) {
        let agg = {
            let pending = self.send_pending.lock().expect("send_pending poisoned");
            pending.get(&msg.deps_key).cloned()
        };
        if agg.is_none() {
            warn!(deps_key = msg.deps_key, "GET for an unknown (already-recycled?) activation");
            return;
        }
        for k in 0..32u32 {
            if msg.which & (1 << k) == 0 {
                continue;
            }
            let payload = ptg_deps::TileBuf::new(self.tiles.clone(), self.tile_size);
            trace!(to, tag = msg.tag + k, "issuing PUT");
            if let Err(e) = self.transport.send_put(to, msg.tag + k, payload) {
                error!(%e, rank = to, "transport failure sending PUT");
                std::process::abort();
            }
        }
    }

    fn poll_send_completions(&self) -> bool {
        let keys: Vec<u64> = self
            .send_pending
            .lock()
            .expect("send_pending poisoned")
            .keys()
            .copied()
            .collect();
        for deps_key in keys {
            let agg = self
                .send_pending
                .lock()
                .expect("send_pending poisoned")
                .get(&deps_key)
                .cloned();
            let Some(agg) = agg else { continue };
            let (base_tag, which) = {
                let g = agg.lock().expect("remote-deps aggregator poisoned");
                (g.base_tag(), g.which())
            };
            for k in 0..32u32 {
                if which & (1 << k) == 0 {
                    continue;
                }
                if self.transport.poll_send_done(base_tag + k) {
                    let recyclable = agg.lock().expect("remote-deps aggregator poisoned").complete(k);
                    if recyclable {
                        self.send_pending.lock().expect("send_pending poisoned").remove(&deps_key);
                        self.deps_pool.push(agg);
                    }
                    return true;
                }
            }
        }
        false
    }

    fn poll_recv_completions(&self) -> bool {
        let tags: Vec<u32> = self
            .recv_pending
            .lock()
            .expect("recv_pending poisoned")
            .keys()
            .copied()
            .collect();
        for base_tag in tags {
            let which = {
                let pending = self.recv_pending.lock().expect("recv_pending poisoned");
                pending.get(&base_tag).map(|s| s.remaining)
            };
            let Some(remaining) = which else { continue };
            for k in 0..32u32 {
                if remaining & (1 << k) == 0 {
                    continue;
                }
                let scratch = ptg_deps::TileBuf::new(self.tiles.clone(), self.tile_size);
                if let Some(_buf) = self.transport.poll_recv_put(base_tag + k, scratch) {
                    return self.on_payload_received(base_tag, k);
                }
            }
        }
        false
    }

    fn on_payload_received(&self, base_tag: u32, k: u32) -> bool {
        let done = {
            let mut pending = self.recv_pending.lock().expect("recv_pending poisoned");
            match pending.get_mut(&base_tag) {
                Some(slot) => {
                    slot.remaining &= !(1 << k);
                    slot.remaining == 0
                }
                None => return true,
            }
        };
        if !done {
            return true;
        }
        let slot = self
            .recv_pending
            .lock()
            .expect("recv_pending poisoned")
            .remove(&base_tag)
            .expect("just observed present");
        self.deliver(slot.origin);
        true
    }

    /// DELIVER: re-walk the producer's edges, marking only the ones
    /// that land on this rank — the Rust-idiomatic rendering of
    /// "pass the completed aggregator to the local release engine via a
    /// DEP_RELEASE command" (Section 4.G): since marking a leaf is
    /// already lock-free-safe from any thread, the agent calls straight
    /// into Component F instead of round-tripping through a queue.
    fn deliver(&self, origin: ExecutionContext) {
        let Ok(origin_class) = self.registry.element_at(origin.class) else {
            error!(?origin.class, "DELIVER for a class absent from the registry");
            return;
        };
        if let Err(e) = release_deps(
            &origin,
            &origin_class,
            &self.registry,
            &self.env,
            RELEASE_LOCAL_DEPS,
            self.transport.rank(),
            self.ready.as_ref(),
            &NoFurtherRemote,
        ) {
            error!(%e, "release_deps failed on DELIVER");
        }
    }

    fn handle_command(&self, cmd: Command) -> bool {
        match cmd {
            Command::Activate {
                origin,
                origin_class_name,
                rank,
                which,
            } => {
                // Bound concurrent send-side activations to the window W
                // (Section 4.G): beyond that, re-enqueue and let the
                // command queue apply backpressure rather than growing
                // `send_pending` unbounded.
                if self.send_pending.lock().expect("send_pending poisoned").len() >= self.window {
                    self.inbox.push(Command::Activate {
                        origin,
                        origin_class_name,
                        rank,
                        which,
                    });
                    return true;
                }
                let deps_key = self.next_deps_key.fetch_add(1, Ordering::Relaxed);
                let p = max_outputs_per_class(&self.registry).max(1) as u32;
                let base_tag = match self.tags.lock().expect("tag allocator poisoned").next(p) {
                    Ok(t) => t,
                    Err(e) => {
                        error!(%e, "tag space exhausted issuing ACTIVATE");
                        std::process::abort();
                    }
                };
                let agg = match self.deps_pool.pop() {
                    Some(recycled) => {
                        recycled.lock().expect("remote-deps aggregator poisoned").recycle(
                            origin.clone(),
                            origin_class_name.clone(),
                            which,
                            base_tag,
                        );
                        recycled
                    }
                    None => Arc::new(Mutex::new(RemoteDeps::new(
                        origin.clone(),
                        origin_class_name.clone(),
                        which,
                        base_tag,
                    ))),
                };
                self.send_pending.lock().expect("send_pending poisoned").insert(deps_key, agg);
                let msg = ActivateMsg {
                    class: origin.class,
                    class_name: origin_class_name,
                    locals: origin.locals,
                    which,
                    deps_key,
                };
                if let Err(e) = self.transport.send_activate(rank, &msg) {
                    error!(%e, rank, "transport failure sending ACTIVATE");
                    std::process::abort();
                }
                true
            }
            Command::Control(Control::Enable) => {
                self.dep_enabled.store(true, Ordering::Release);
                true
            }
            Command::Control(Control::Disable) => {
                self.dep_enabled.store(false, Ordering::Release);
                self.transport.cancel_persistent_receives();
                true
            }
            Command::Control(Control::Shutdown) => {
                self.dep_enabled.store(false, Ordering::Release);
                self.transport.cancel_persistent_receives();
                false
            }
            Command::Memcpy { source, destination } => {
                source.with_bytes(|src| destination.with_bytes_mut(|dst| dst.copy_from_slice(src)));
                true
            }
        }
    }
}

trait InsertSlot {
    fn insert_slot(&self, tag: u32, slot: RecvSlot);
}
impl InsertSlot for Mutex<HashMap<u32, RecvSlot>> {
    fn insert_slot(&self, tag: u32, slot: RecvSlot) {
        self.lock().expect("recv_pending poisoned").insert(tag, slot);
    }
}
