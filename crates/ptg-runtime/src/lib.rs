//! The top-level PTG runtime crate: the `Runtime` struct, the
//! `ProgramDescription` trait (Section 6's program-description
//! contract), worker-pool glue, and environment-knob configuration
//! (Section 6's CLI/env surface). This is the crate an embedder depends
//! on; everything else in the workspace is a leaf component it wires
//! together.

pub mod config;
pub mod program;
pub mod queue;
pub mod remote_sink;
pub mod runtime;
pub mod worker;

pub use config::RuntimeConfig;
pub use program::ProgramDescription;
pub use queue::SharedReadyQueue;
pub use remote_sink::CommandRemoteSink;
pub use runtime::Runtime;
pub use worker::Completion;
