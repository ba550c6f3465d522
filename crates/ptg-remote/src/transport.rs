//! The abstract boundary the agent drives — one `ACTIVATE`/`GET`/`PUT`
//! per the wire protocol of Section 6. Production code wires this to a
//! real communicator; tests use a fault-injectable in-process fake
//! (Testable Property 4's "fault injection transport").

use ptg_types::{ClassId, PtgResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivateMsg {
    pub class: ClassId,
    pub class_name: String,
    pub locals: Vec<i64>,
    pub which: u32,
    pub deps_key: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GetMsg {
    pub deps_key: u64,
    pub which: u32,
    pub tag: u32,
}

/// Non-blocking poll-based transport: every `poll_*`/`try_recv_put`
/// returns immediately, `None` meaning "nothing completed yet" — the
/// agent's progress loop is the only place that ever blocks (briefly,
/// via the bounded sleep), never the transport itself.
pub trait Transport: Send + Sync {
    fn rank(&self) -> u32;

    /// `None` if the transport cannot report a ceiling (Section 6: the
    /// agent then assumes `u32::MAX` and warns).
    fn max_tag(&self) -> Option<u32>;

    fn send_activate(&self, to: u32, msg: &ActivateMsg) -> PtgResult<()>;
    fn poll_activate(&self) -> Option<(u32, ActivateMsg)>;

    fn send_get(&self, to: u32, msg: &GetMsg) -> PtgResult<()>;
    fn poll_get(&self) -> Option<(u32, GetMsg)>;

    /// Sends one payload on `tag`; ownership of `payload` passes to the
    /// transport until `poll_send_done` reports it complete.
    fn send_put(&self, to: u32, tag: u32, payload: ptg_deps::TileBuf) -> PtgResult<()>;
    /// Polls whether the outbound PUT on `tag` has completed.
    fn poll_send_done(&self, tag: u32) -> bool;

    /// Polls for an inbound PUT on `tag`, returning the received buffer
    /// once the transfer lands.
    fn poll_recv_put(&self, tag: u32, into: ptg_deps::TileBuf) -> Option<ptg_deps::TileBuf>;

    /// Cancels and frees any persistent receives posted for ACTIVATE and
    /// GET — `CTL(Disable)`/`CTL(Shutdown)` (Section 4.G).
    fn cancel_persistent_receives(&self);
}
