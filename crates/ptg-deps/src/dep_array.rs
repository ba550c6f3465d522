use ptg_types::{range, Assignment, Env, PtgError, PtgResult, Symbol};
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU32, Ordering};
use std::sync::OnceLock;

/// The leaf of a dependency-array path: a per-instance activation
/// bitmask plus the one-shot `HACK_IN` bit that guards the initial-IN
/// contribution against double-counting (Section 9's open question,
/// resolved here as "set once, never observed as a dependency bit").
struct Leaf {
    mask: AtomicU32,
    hack_in: AtomicBool,
}

impl Leaf {
    fn new() -> Self {
        Self {
            mask: AtomicU32::new(0),
            hack_in: AtomicBool::new(false),
        }
    }
}

enum NodeKind {
    /// One child pointer per value in `[min, max]`, installed lazily.
    Next(Vec<AtomicPtr<Node>>),
    /// One leaf per value in `[min, max]`, allocated eagerly for the node
    /// (the node itself is what's lazy, not the leaves within it).
    Final(Vec<Leaf>),
}

struct Node {
    min: i64,
    #[allow(dead_code)] // kept for range introspection / debugging
    max: i64,
    kind: NodeKind,
}

impl Drop for Node {
    fn drop(&mut self) {
        if let NodeKind::Next(slots) = &mut self.kind {
            for slot in slots.iter() {
                let p = slot.load(Ordering::Acquire);
                if !p.is_null() {
                    drop(unsafe { Box::from_raw(p) });
                }
            }
        }
    }
}

impl Node {
    fn new_next(min: i64, max: i64) -> Self {
        let len = (max - min + 1).max(0) as usize;
        let mut slots = Vec::with_capacity(len);
        slots.resize_with(len, || AtomicPtr::new(std::ptr::null_mut()));
        Node {
            min,
            max,
            kind: NodeKind::Next(slots),
        }
    }

    fn new_final(min: i64, max: i64) -> Self {
        let len = (max - min + 1).max(0) as usize;
        let mut leaves = Vec::with_capacity(len);
        leaves.resize_with(len, Leaf::new);
        Node {
            min,
            max,
            kind: NodeKind::Final(leaves),
        }
    }

    /// Install (or fetch the already-installed) child for `value`. Races
    /// are resolved by a single CAS; the losing allocation is freed.
    fn child_for(&self, value: i64, make_child: impl FnOnce() -> Node) -> &Node {
        let slots = match &self.kind {
            NodeKind::Next(slots) => slots,
            NodeKind::Final(_) => unreachable!("child_for called on a final-level node"),
        };
        let idx = (value - self.min) as usize;
        let slot = &slots[idx];
        let existing = slot.load(Ordering::Acquire);
        if !existing.is_null() {
            return unsafe { &*existing };
        }
        let candidate = Box::into_raw(Box::new(make_child()));
        match slot.compare_exchange(
            std::ptr::null_mut(),
            candidate,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => unsafe { &*candidate },
            Err(winner) => {
                drop(unsafe { Box::from_raw(candidate) });
                unsafe { &*winner }
            }
        }
    }

    fn leaf_for(&self, value: i64) -> &Leaf {
        match &self.kind {
            NodeKind::Final(leaves) => &leaves[(value - self.min) as usize],
            NodeKind::Next(_) => unreachable!("leaf_for called on a non-final node"),
        }
    }
}

/// A handle to one instance's leaf counter, valid for the lifetime of the
/// owning [`DependencyArray`].
pub struct LeafHandle<'a> {
    leaf: &'a Leaf,
}

impl<'a> LeafHandle<'a> {
    /// Atomically bit-ORs `bit` into the leaf's activation mask, returning
    /// the prior value (Component D's `mark`).
    pub fn mark(&self, bit: u32) -> u32 {
        self.leaf.mask.fetch_or(bit, Ordering::AcqRel)
    }

    /// True iff `mark`'s prior value ORed with `bit` equals
    /// `expected_mask` and the initial-IN contribution has already been
    /// applied. Only the thread whose `mark` call sets the last expected
    /// bit observes `true` here.
    pub fn is_ready(prior: u32, bit: u32, expected_mask: u32, hack_in_applied: bool) -> bool {
        (prior | bit) == expected_mask && hack_in_applied
    }

    /// Attempts to claim the one-shot initial-IN application. Returns
    /// `true` exactly once per instance, to whichever thread wins the
    /// race — that thread, and only that thread, applies the initial-IN
    /// contribution.
    pub fn try_claim_initial_in(&self) -> bool {
        self.leaf
            .hack_in
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn hack_in_applied(&self) -> bool {
        self.leaf.hack_in.load(Ordering::Acquire)
    }
}

/// Declares one local's bound expressions, in declaration order — the
/// slice of a task class's locals that a [`DependencyArray`] walks.
pub type LocalBounds<'a> = &'a [Symbol];

/// Lazily-allocated N-dimensional ragged tree of per-instance counters,
/// indexed by local values in declaration order (Component D).
pub struct DependencyArray {
    root: OnceLock<Node>,
}

impl Default for DependencyArray {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyArray {
    pub fn new() -> Self {
        Self {
            root: OnceLock::new(),
        }
    }

    /// Walks `locals` in declaration order, computing each level's
    /// `[min, max]` from `bounds` under the partial assignment built up so
    /// far, lazily installing nodes as needed. Returns `Ok(None)` if any
    /// level's computed range excludes that level's assigned value (the
    /// instance does not exist in this program) — the enumerator skips
    /// it, and a release that produces such a context reports
    /// `UnreachableInstance` rather than panicking.
    pub fn locate<'a>(
        &'a self,
        bounds: LocalBounds,
        env: &Env,
        locals: &[i64],
    ) -> PtgResult<Option<LeafHandle<'a>>> {
        assert_eq!(bounds.len(), locals.len());

        // A zero-local class has exactly one instance. There is no
        // level to range-check, so the root is a single-leaf `Final`
        // node over the degenerate range `[0, 0]`, and the leaf is
        // always the one at index 0.
        if bounds.is_empty() {
            let root = self.root.get_or_init(|| Node::new_final(0, 0));
            return Ok(Some(LeafHandle {
                leaf: root.leaf_for(0),
            }));
        }

        let mut bound_so_far: Vec<(String, i64)> = Vec::with_capacity(locals.len());

        let mut node: &Node = {
            let (min, max) = level_range(&bounds[0], env, &bound_so_far)?;
            if locals[0] < min || locals[0] > max {
                return Ok(None);
            }
            self.root
                .get_or_init(|| new_level_node(bounds, 0, min, max))
        };
        bound_so_far.push((bounds[0].name.clone(), locals[0]));

        for i in 1..bounds.len() {
            let (min, max) = level_range(&bounds[i], env, &bound_so_far)?;
            if locals[i] < min || locals[i] > max {
                return Ok(None);
            }
            node = node.child_for(locals[i], || new_level_node(bounds, i, min, max));
            bound_so_far.push((bounds[i].name.clone(), locals[i]));
        }

        Ok(Some(LeafHandle {
            leaf: node.leaf_for(locals[bounds.len() - 1]),
        }))
    }
}

fn level_range(sym: &Symbol, env: &Env, bound_so_far: &[(String, i64)]) -> PtgResult<(i64, i64)> {
    let assignment = Assignment::new(env, bound_so_far);
    let lower = sym
        .lower
        .as_ref()
        .ok_or_else(|| PtgError::InvalidProgram(format!("local `{}` has no lower bound", sym.name)))?;
    let upper = sym
        .upper
        .as_ref()
        .ok_or_else(|| PtgError::InvalidProgram(format!("local `{}` has no upper bound", sym.name)))?;
    range(lower, upper, &assignment)
}

fn new_level_node(bounds: LocalBounds, level: usize, min: i64, max: i64) -> Node {
    if level + 1 == bounds.len() {
        Node::new_final(min, max)
    } else {
        Node::new_next(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptg_types::Expr;

    fn single_local(lo: i64, hi: i64) -> Vec<Symbol> {
        vec![Symbol::local("i", Expr::Const(lo), Expr::Const(hi))]
    }

    #[test]
    fn marks_and_reports_ready() {
        let bounds = single_local(0, 3);
        let env = Env::new();
        let arr = DependencyArray::new();

        let handle = arr.locate(&bounds, &env, &[2]).unwrap().unwrap();
        assert!(handle.try_claim_initial_in());
        assert!(!handle.try_claim_initial_in(), "claims only once");

        let prior = handle.mark(0b01);
        assert!(!LeafHandle::is_ready(prior, 0b01, 0b11, true));
        let prior = handle.mark(0b10);
        assert!(LeafHandle::is_ready(prior, 0b10, 0b11, true));
    }

    #[test]
    fn zero_local_class_has_one_shared_leaf() {
        let env = Env::new();
        let arr = DependencyArray::new();

        let a = arr.locate(&[], &env, &[]).unwrap().unwrap();
        assert!(a.try_claim_initial_in());
        let prior = a.mark(0b1);
        assert!(LeafHandle::is_ready(prior, 0b1, 0b1, true));

        // a second lookup reaches the same leaf, not a fresh one
        let b = arr.locate(&[], &env, &[]).unwrap().unwrap();
        assert!(!b.try_claim_initial_in(), "claims only once");
    }

    #[test]
    fn out_of_range_is_unreachable() {
        let bounds = single_local(0, 3);
        let env = Env::new();
        let arr = DependencyArray::new();
        assert!(arr.locate(&bounds, &env, &[7]).unwrap().is_none());
    }

    #[test]
    fn ragged_two_level_shares_parent() {
        // second local's range depends on the first: j in [0, i]
        let bounds = vec![
            Symbol::local("i", Expr::Const(0), Expr::Const(3)),
            Symbol::local("j", Expr::Const(0), Expr::sym("i")),
        ];
        let env = Env::new();
        let arr = DependencyArray::new();

        assert!(arr.locate(&bounds, &env, &[0, 0]).unwrap().is_some());
        assert!(arr.locate(&bounds, &env, &[1, 1]).unwrap().is_some());
        // j=2 is out of range when i=1
        assert!(arr.locate(&bounds, &env, &[1, 2]).unwrap().is_none());
    }
}
