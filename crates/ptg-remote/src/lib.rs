//! The remote-deps agent (Component G), command queue (Component H), and
//! the wire protocol types of Section 6 — the single-threaded
//! communication agent that drives the ACTIVATE/GET/PUT rendezvous and
//! the FIFO by which worker threads hand it cross-rank releases.

pub mod agent;
pub mod aggregator;
pub mod command;
pub mod tag;
pub mod transport;

#[cfg(any(test, feature = "fake-transport"))]
pub mod fake;

pub use agent::Agent;
pub use aggregator::RemoteDeps;
pub use command::{Command, CommandQueue, Control};
pub use tag::TagAllocator;
pub use transport::{ActivateMsg, GetMsg, Transport};
