//! Wire-tag allocation for GET replies, grounded on `remote_dep_mpi.c`'s
//! `INC_NEXT_TAG` macro: each GET claims a contiguous block of `k` tags
//! starting at `NEXT_TAG`, which then advances by `k` unless doing so
//! would exceed the transport's tag space, in which case it wraps back
//! to `base + k`.

use ptg_types::{PtgError, PtgResult};

pub struct TagAllocator {
    next: u32,
    base: u32,
    max_tag: u32,
}

impl TagAllocator {
    /// `base` is the first tag past the control-message tags
    /// (`ACTIVATE`/`GET` have their own fixed tags); `max_tag` is probed
    /// once from the transport at startup, or `u32::MAX` if the
    /// transport can't report one.
    pub fn new(base: u32, max_tag: u32) -> Self {
        Self { next: base, base, max_tag }
    }

    /// Claims a block of `k` contiguous tags, returning the first. Errors
    /// at init if even one full window's worth of tags (`k`) cannot fit
    /// between `base` and `max_tag` — Section 7's `TagSpaceExhausted`.
    pub fn next(&mut self, k: u32) -> PtgResult<u32> {
        let span = self.max_tag.saturating_sub(self.base);
        if k == 0 || k > span {
            return Err(PtgError::TagSpaceExhausted(format!(
                "window needs {k} contiguous tags but only {span} are available above base {}",
                self.base
            )));
        }
        let tag = self.next;
        if self.next < self.max_tag.saturating_sub(k) {
            self.next += k;
        } else {
            self.next = self.base + k;
        }
        Ok(tag)
    }
}
