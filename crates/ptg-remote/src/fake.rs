//! An in-process, loopback `Transport` used only by tests — Testable
//! Property 4 ("duplicate ACTIVATE delivered to the receiver ... tested
//! under a fault-injection transport"). Every rank's endpoint shares one
//! [`FakeNetwork`]; messages sent to rank `r` land directly in `r`'s
//! inbox with no real I/O, so a test can run a whole multi-rank
//! rendezvous (Section 6, S4) on one process without MPI.

use crate::transport::{ActivateMsg, GetMsg, Transport};
use ptg_types::PtgResult;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RankInbox {
    activate: Mutex<VecDeque<(u32, ActivateMsg)>>,
    get: Mutex<VecDeque<(u32, GetMsg)>>,
    puts: Mutex<HashMap<u32, ptg_deps::TileBuf>>,
    send_done: Mutex<std::collections::HashSet<u32>>,
}

/// Shared switchboard for a fixed number of ranks. Construct one per
/// test, then build one [`FakeTransport`] per rank over it.
pub struct FakeNetwork {
    inboxes: Vec<RankInbox>,
    /// When set, the next `send_activate` additionally enqueues a
    /// second, duplicate copy of the same message — simulating a
    /// transport that redelivers (Testable Property 4).
    duplicate_next_activate: AtomicBool,
    max_tag: AtomicU32,
}

impl FakeNetwork {
    pub fn new(ranks: usize) -> Arc<Self> {
        Arc::new(Self {
            inboxes: (0..ranks).map(|_| RankInbox::default()).collect(),
            duplicate_next_activate: AtomicBool::new(false),
            max_tag: AtomicU32::new(1 << 20),
        })
    }

    /// Arranges for the next ACTIVATE sent on this network to be
    /// delivered twice, as if the transport had redelivered it.
    pub fn inject_duplicate_activate(&self) {
        self.duplicate_next_activate.store(true, Ordering::SeqCst);
    }

    pub fn set_max_tag(&self, max_tag: u32) {
        self.max_tag.store(max_tag, Ordering::SeqCst);
    }
}

/// One rank's endpoint on a [`FakeNetwork`].
pub struct FakeTransport {
    network: Arc<FakeNetwork>,
    rank: u32,
}

impl FakeTransport {
    pub fn new(network: Arc<FakeNetwork>, rank: u32) -> Self {
        Self { network, rank }
    }
}

impl Transport for FakeTransport {
    fn rank(&self) -> u32 {
        self.rank
    }

    fn max_tag(&self) -> Option<u32> {
        Some(self.network.max_tag.load(Ordering::SeqCst))
    }

    fn send_activate(&self, to: u32, msg: &ActivateMsg) -> PtgResult<()> {
        let inbox = &self.network.inboxes[to as usize];
        inbox.activate.lock().expect("fake inbox poisoned").push_back((self.rank, msg.clone()));
        if self
            .network
            .duplicate_next_activate
            .swap(false, Ordering::SeqCst)
        {
            inbox.activate.lock().expect("fake inbox poisoned").push_back((self.rank, msg.clone()));
        }
        Ok(())
    }

    fn poll_activate(&self) -> Option<(u32, ActivateMsg)> {
        self.network.inboxes[self.rank as usize]
            .activate
            .lock()
            .expect("fake inbox poisoned")
            .pop_front()
    }

    fn send_get(&self, to: u32, msg: &GetMsg) -> PtgResult<()> {
        self.network.inboxes[to as usize]
            .get
            .lock()
            .expect("fake inbox poisoned")
            .push_back((self.rank, *msg));
        Ok(())
    }

    fn poll_get(&self) -> Option<(u32, GetMsg)> {
        self.network.inboxes[self.rank as usize]
            .get
            .lock()
            .expect("fake inbox poisoned")
            .pop_front()
    }

    fn send_put(&self, to: u32, tag: u32, payload: ptg_deps::TileBuf) -> PtgResult<()> {
        self.network.inboxes[to as usize]
            .puts
            .lock()
            .expect("fake inbox poisoned")
            .insert(tag, payload);
        // The loopback completes synchronously: mark it done for the
        // sender immediately rather than modelling in-flight latency.
        self.network.inboxes[self.rank as usize]
            .send_done
            .lock()
            .expect("fake inbox poisoned")
            .insert(tag);
        Ok(())
    }

    fn poll_send_done(&self, tag: u32) -> bool {
        self.network.inboxes[self.rank as usize]
            .send_done
            .lock()
            .expect("fake inbox poisoned")
            .remove(&tag)
    }

    fn poll_recv_put(&self, tag: u32, _into: ptg_deps::TileBuf) -> Option<ptg_deps::TileBuf> {
        self.network.inboxes[self.rank as usize]
            .puts
            .lock()
            .expect("fake inbox poisoned")
            .remove(&tag)
    }

    fn cancel_persistent_receives(&self) {
        // Nothing is posted ahead of time on the fake transport.
    }
}
