//! Component H: the command queue linking worker threads to the single
//! remote-deps agent thread. A closed sum type per Section 9's redesign
//! note, rather than the source's `action`-discriminated union.

use ptg_types::ExecutionContext;
use std::collections::VecDeque;
use std::sync::Mutex;

/// The agent's tri-state lifecycle switch (Section 4.G's `CTL(enable)`),
/// given named variants instead of the source's bare `{-1,0,1}` ints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    /// Post all persistent receives; `dep_enabled = true`.
    Enable,
    /// Cancel and free all persistent receives; `dep_enabled = false`.
    Disable,
    /// Disable, then exit the agent's loop and let its thread join.
    Shutdown,
}

/// One unit of work handed from a worker thread to the agent.
pub enum Command {
    /// Posted by the release engine when an edge resolves to a remote
    /// rank: "tell `rank` we have `which` outputs ready for `origin`".
    Activate {
        origin: ExecutionContext,
        origin_class_name: String,
        rank: u32,
        which: u32,
    },
    Control(Control),
    /// A local loopback copy, serviced by the agent's self-send/recv
    /// path rather than a worker thread touching the transport.
    Memcpy {
        source: ptg_deps::TileBuf,
        destination: ptg_deps::TileBuf,
    },
}

/// Mutex-guarded FIFO. Multiple producer threads may push; exactly one
/// consumer (the agent thread, or a worker draining release jobs) pops.
/// The same type backs both directions Component H describes.
pub struct CommandQueue<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> Default for CommandQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CommandQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, item: T) {
        self.items.lock().expect("command queue poisoned").push_back(item);
    }

    /// Pops at most one item — the agent drains "up to one command" per
    /// progress-loop iteration (Section 4.G).
    pub fn pop(&self) -> Option<T> {
        self.items.lock().expect("command queue poisoned").pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().expect("command queue poisoned").is_empty()
    }
}
