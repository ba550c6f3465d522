//! Component F: the local release engine. Translates one completed
//! instance's output edges into dependency-counter updates, ready-queue
//! pushes, and (when the destination is not local) a single activation
//! per remote rank.

use ptg_registry::{ClassRegistry, TaskClass};
use ptg_types::{Assignment, DatatypeId, Env, ExecutionContext, PtgError, PtgResult};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Return only the declared datatype of each output reached by a remote
/// edge; do not mark, push, or activate anything. Used by the remote
/// agent to answer a GET with the datatypes it needs to receive.
pub const GETTYPE_REMOTE_DEPS: u8 = 0b001;
/// Apply `mark`/ready-queue pushes for edges that resolve to this rank.
pub const RELEASE_LOCAL_DEPS: u8 = 0b010;
/// Post one activation per distinct remote rank reached by this call.
pub const RELEASE_REMOTE_DEPS: u8 = 0b100;

/// Where a context goes once its dependency counter is satisfied.
pub trait ReadyQueue: Send + Sync {
    fn push(&self, ctx: ExecutionContext);
}

/// Where a remote activation is handed off once an edge resolves to a
/// rank other than our own — the agent's command queue (Component H),
/// injected so the release engine never depends on the transport crate.
pub trait RemoteSink: Send + Sync {
    fn activate(&self, origin: &ExecutionContext, rank: u32, which: u32);
}

#[derive(Default)]
pub struct ReleaseOutcome {
    /// Populated only under `GETTYPE_REMOTE_DEPS`: the datatype of each
    /// output parameter that has at least one remote destination.
    pub datatypes: Vec<DatatypeId>,
    /// Number of edges skipped because the computed destination fell
    /// outside its class's declared range (Section 7's debug counter).
    pub unreachable: u32,
}

/// Visits every output edge of `completed`'s class, in declaration
/// order within each output parameter, applying `actions`.
#[allow(clippy::too_many_arguments)]
pub fn release_deps(
    completed: &ExecutionContext,
    completed_class: &TaskClass,
    registry: &ClassRegistry,
    env: &Env,
    actions: u8,
    my_rank: u32,
    ready: &dyn ReadyQueue,
    remote: &dyn RemoteSink,
) -> PtgResult<ReleaseOutcome> {
    let mut outcome = ReleaseOutcome::default();
    let bound: Vec<(String, i64)> = completed_class
        .locals
        .iter()
        .zip(completed.locals.iter())
        .map(|(sym, v)| (sym.name.clone(), *v))
        .collect();
    let src_assignment = Assignment::new(env, &bound);

    let query_only = actions & GETTYPE_REMOTE_DEPS != 0;
    let mut remote_which: HashMap<u32, u32> = HashMap::new();

    for (j, output) in completed_class.outputs.iter().enumerate() {
        let edges = &completed_class.output_edges[j];
        let mut param_has_remote_edge = false;

        for edge in edges {
            if !edge.predicate.truthy(&src_assignment)? {
                continue;
            }

            let dst_locals: Vec<i64> = edge
                .binding
                .iter()
                .map(|e| e.eval(&src_assignment))
                .collect::<PtgResult<_>>()?;

            let dst_class = registry.element_at(edge.destination_class)?;
            let rank = dst_class.affinity.rank_of(&dst_locals);

            if query_only {
                if rank != my_rank {
                    param_has_remote_edge = true;
                }
                continue;
            }

            let handle = match dst_class.dep_root.locate(&dst_class.locals, env, &dst_locals)? {
                Some(h) => h,
                None => {
                    outcome.unreachable += 1;
                    let dst_ctx = ExecutionContext::new(edge.destination_class, dst_locals);
                    warn!(
                        target = "ptg_sched::release",
                        src = %completed.display(&completed_class.name),
                        dst = %dst_ctx.display(&dst_class.name),
                        "binding produced an instance outside its declared range",
                    );
                    continue;
                }
            };

            if rank == my_rank {
                if actions & RELEASE_LOCAL_DEPS != 0 {
                    let bit = 1u32 << edge.dest_input_bit;
                    let prior = handle.mark(bit);
                    let ready_now = ptg_deps::LeafHandle::is_ready(
                        prior,
                        bit,
                        dst_class.expected_inbound_mask,
                        handle.hack_in_applied(),
                    );
                    if ready_now {
                        let dst_ctx = ExecutionContext::new(edge.destination_class, dst_locals);
                        debug!(
                            target = "ptg_sched::release",
                            ctx = %dst_ctx.display(&dst_class.name),
                            "instance ready"
                        );
                        ready.push(dst_ctx);
                    }
                }
            } else if actions & RELEASE_REMOTE_DEPS != 0 {
                *remote_which.entry(rank).or_insert(0) |= 1u32 << edge.dest_input_bit;
            }
        }

        if query_only && param_has_remote_edge {
            outcome.datatypes.push(output.datatype);
        }
    }

    if query_only {
        return Ok(outcome);
    }

    if actions & RELEASE_REMOTE_DEPS != 0 {
        for (rank, which) in remote_which {
            remote.activate(completed, rank, which);
        }
    }

    Ok(outcome)
}

/// Marks one input bit on an already-located destination and pushes it
/// to `ready` if that completes its expected mask. This is the local
/// half of [`release_deps`]'s per-edge action, exposed standalone for
/// the remote-deps agent's DELIVER transition (Section 4.G): once a
/// rendezvous finishes, the agent applies the bit the same way a local
/// release would, without re-walking the sender's output edges.
pub fn mark_remote_delivery(
    dst_ctx: &ExecutionContext,
    dst_class: &TaskClass,
    env: &Env,
    bit: u32,
    ready: &dyn ReadyQueue,
) -> PtgResult<()> {
    let handle = dst_class
        .dep_root
        .locate(&dst_class.locals, env, &dst_ctx.locals)?
        .ok_or_else(|| {
            PtgError::UnreachableInstance(dst_ctx.display(&dst_class.name))
        })?;
    let prior = handle.mark(bit);
    if ptg_deps::LeafHandle::is_ready(prior, bit, dst_class.expected_inbound_mask, handle.hack_in_applied()) {
        ready.push(dst_ctx.clone());
    }
    Ok(())
}

/// Resolves a destination's input bit position by parameter name — used
/// once at class-registration time; the per-edge `dest_input_bit` is
/// precomputed from this so release never does a name lookup on the hot
/// path (Section 9's "coroutine-free release" note).
pub fn input_bit_of(dst_class: &TaskClass, input_name: &str) -> PtgResult<u32> {
    dst_class
        .inputs
        .iter()
        .position(|p| p.name == input_name)
        .map(|i| i as u32)
        .ok_or_else(|| {
            PtgError::InvalidProgram(format!(
                "class `{}` has no input parameter `{input_name}`",
                dst_class.name
            ))
        })
}
