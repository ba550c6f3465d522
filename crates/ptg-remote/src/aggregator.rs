//! The remote-deps object (Section 3): per-in-flight cross-rank
//! activation bookkeeping. One is created on the send side when a local
//! release resolves to a remote rank, and one on the receive side when
//! an ACTIVATE arrives; both recycle through the same free-list type as
//! the tile allocator, but a separate instance of it (the
//! `[SUPPLEMENT]` note: two independent free-lists behind one LIFO).
//!
//! Only the agent thread ever touches a `RemoteDeps` — there is no
//! cross-thread sharing here, unlike the dependency array's leaves —
//! so its fields need no atomics.

use ptg_types::{ClassId, ExecutionContext};

pub struct RemoteDeps {
    pub origin: ExecutionContext,
    pub origin_class_name: String,
    pub which: u32,
    pub base_tag: u32,
    completed: u32,
}

impl RemoteDeps {
    pub fn new(origin: ExecutionContext, origin_class_name: String, which: u32, base_tag: u32) -> Self {
        Self {
            origin,
            origin_class_name,
            which,
            base_tag,
            completed: 0,
        }
    }

    /// Marks output slot `k` complete; returns true iff every bit set in
    /// `which` has now completed — the aggregator is recyclable.
    pub fn complete(&mut self, k: u32) -> bool {
        self.completed |= 1 << k;
        self.completed & self.which == self.which
    }

    pub fn which(&self) -> u32 {
        self.which
    }

    pub fn base_tag(&self) -> u32 {
        self.base_tag
    }

    pub fn class(&self) -> ClassId {
        self.origin.class
    }

    /// Rewrites this (recycled) aggregator for a new rendezvous.
    pub fn recycle(&mut self, origin: ExecutionContext, origin_class_name: String, which: u32, base_tag: u32) {
        self.origin = origin;
        self.origin_class_name = origin_class_name;
        self.which = which;
        self.base_tag = base_tag;
        self.completed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_only_once_every_requested_bit_lands() {
        let mut agg = RemoteDeps::new(ExecutionContext::new(ClassId(0), vec![0]), "B".into(), 0b101, 0);
        assert!(!agg.complete(0));
        assert!(agg.complete(2));
    }

    #[test]
    fn recycle_resets_completion() {
        let mut agg = RemoteDeps::new(ExecutionContext::new(ClassId(0), vec![0]), "B".into(), 0b1, 0);
        assert!(agg.complete(0));
        agg.recycle(ExecutionContext::new(ClassId(1), vec![1]), "C".into(), 0b1, 4);
        assert!(agg.complete(0));
    }
}
