//! Section 6's program-description contract: the interface the (out of
//! scope) DSL compiler implements and the core consumes. `anyhow` is
//! used at this boundary, the way `bpmn-lite-core::store::ProcessStore`
//! returns `anyhow::Result` for its externally-implemented trait methods,
//! while the core's own internals stay on `PtgError`.

use ptg_registry::ClassRegistry;
use ptg_types::Env;

/// Populates a fresh [`ClassRegistry`]/[`Env`] pair and binds any
/// globals the program needs before enumeration. Implemented by
/// generated code from the (out-of-scope) DSL compiler; the runtime
/// calls `load_objects` exactly once, before any worker thread starts,
/// and freezes the registry immediately afterward.
pub trait ProgramDescription: Send + Sync {
    /// Registers every task class the program declares, including their
    /// hooks and affinity descriptors (Section 6: `load_objects`).
    fn load_objects(&self, registry: &mut ClassRegistry, env: &mut Env) -> anyhow::Result<()>;

    /// Binds the program's global symbols before enumeration begins
    /// (Section 6: `assign_global`, called once per global). The
    /// default does nothing — not every program has globals beyond its
    /// locals' own bounds.
    fn assign_globals(&self, _env: &mut Env) -> anyhow::Result<()> {
        Ok(())
    }
}
