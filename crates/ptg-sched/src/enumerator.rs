//! Component E: walks the Cartesian product of a class's local ranges,
//! filtered by predicates, counting and touching the instances owned by
//! this rank.

use ptg_registry::{DataDescriptor, TaskClass};
use ptg_types::{Assignment, Env, Expr, PtgResult};

/// Recursively enumerates `class`'s locals in declaration order. Returns
/// the number of valid instances whose affinity resolves to `my_rank` —
/// the count `enumerate_tasks()` hands back as the scheduler's stopping
/// condition (Section 6).
///
/// Touching each reachable leaf also forces the corresponding dependency
/// array node into existence, so a subsequent `mark` never races the
/// first allocation of its own path.
pub fn enumerate_local(class: &TaskClass, env: &Env, my_rank: u32) -> PtgResult<usize> {
    enumerate_local_with(class, env, my_rank, |_locals| {})
}

/// As [`enumerate_local`], but invokes `on_instance` with the locals of
/// every valid, locally-owned instance as it is discovered — the hook
/// `ptg-runtime` uses to seed its ready queue with instances that have
/// no inbound dependencies (`expected_inbound_mask == 0`) without a
/// second walk of the same Cartesian product.
pub fn enumerate_local_with(
    class: &TaskClass,
    env: &Env,
    my_rank: u32,
    mut on_instance: impl FnMut(&[i64]),
) -> PtgResult<usize> {
    let mut bound: Vec<(String, i64)> = Vec::with_capacity(class.locals.len());
    let mut locals: Vec<i64> = Vec::with_capacity(class.locals.len());
    let mut count = 0usize;
    walk(class, env, &mut bound, &mut locals, 0, my_rank, &mut count, &mut on_instance)?;
    Ok(count)
}

fn walk(
    class: &TaskClass,
    env: &Env,
    bound: &mut Vec<(String, i64)>,
    locals: &mut Vec<i64>,
    level: usize,
    my_rank: u32,
    count: &mut usize,
    on_instance: &mut impl FnMut(&[i64]),
) -> PtgResult<()> {
    if level == class.locals.len() {
        if !satisfies_predicates(class, env, bound)? {
            return Ok(());
        }
        if class.affinity.rank_of(locals) == my_rank {
            // Force the leaf into existence and claim its initial-IN
            // contribution exactly once; re-enumerating the same
            // instance (or a concurrent enumerator thread) must not
            // double-apply it.
            if let Some(handle) = class.dep_root.locate(&class.locals, env, locals)? {
                handle.try_claim_initial_in();
            }
            on_instance(locals);
            *count += 1;
        }
        return Ok(());
    }

    let sym = &class.locals[level];
    let (min, max) = {
        let assignment = Assignment::new(env, bound);
        let lower = sym.lower.as_ref();
        let upper = sym.upper.as_ref();
        match (lower, upper) {
            (Some(lo), Some(hi)) => ptg_types::range(lo, hi, &assignment)?,
            _ => {
                return Err(ptg_types::PtgError::InvalidProgram(format!(
                    "local `{}` of class `{}` has no declared range",
                    sym.name, class.name
                )))
            }
        }
    };

    for v in min..=max {
        bound.push((sym.name.clone(), v));
        locals.push(v);
        walk(class, env, bound, locals, level + 1, my_rank, count, on_instance)?;
        locals.pop();
        bound.pop();
    }
    Ok(())
}

fn satisfies_predicates(class: &TaskClass, env: &Env, bound: &[(String, i64)]) -> PtgResult<bool> {
    let assignment = Assignment::new(env, bound);
    for p in &class.predicates {
        if !p.truthy(&assignment)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Evaluates a single free-standing expression for truthiness under a
/// fully-bound local assignment — used by the release engine when
/// checking an edge's predicate (Section 4.F) without re-walking the
/// enumerator.
pub fn predicate_holds(expr: &Expr, env: &Env, locals_named: &[(String, i64)]) -> PtgResult<bool> {
    let assignment = Assignment::new(env, locals_named);
    expr.truthy(&assignment)
}
