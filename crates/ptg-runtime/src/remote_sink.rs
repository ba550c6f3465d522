//! Wires the local release engine's [`RemoteSink`] to the agent's command
//! queue (Section 4.F: "post DEP_ACTIVATE to the agent"), without
//! `ptg-sched` needing to know `ptg-remote` exists.

use ptg_registry::ClassRegistry;
use ptg_remote::{Command, CommandQueue};
use ptg_sched::RemoteSink;
use ptg_types::ExecutionContext;
use std::sync::Arc;

pub struct CommandRemoteSink {
    queue: Arc<CommandQueue<Command>>,
    registry: Arc<ClassRegistry>,
}

impl CommandRemoteSink {
    pub fn new(queue: Arc<CommandQueue<Command>>, registry: Arc<ClassRegistry>) -> Self {
        Self { queue, registry }
    }
}

impl RemoteSink for CommandRemoteSink {
    fn activate(&self, origin: &ExecutionContext, rank: u32, which: u32) {
        let origin_class_name = self
            .registry
            .element_at(origin.class)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        self.queue.push(Command::Activate {
            origin: origin.clone(),
            origin_class_name,
            rank,
            which,
        });
    }
}
