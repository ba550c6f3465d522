use crate::class::TaskClass;
use crate::hashtable::NameIndex;
use ptg_types::{ClassId, PtgError, PtgResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// Default `MAX_COLLISIONS` — overridable via the `MAX_COLLISIONS`
/// environment knob (Section 6), read by `ptg-runtime`.
pub const DEFAULT_MAX_COLLISIONS: usize = 8;

/// Process-wide ordered table of task classes. Append-only during
/// program load; frozen (read-only) once enumeration begins — mutating
/// a frozen registry is a programming error and panics rather than
/// returning a recoverable error, the same way the source treats it.
pub struct ClassRegistry {
    classes: Vec<Arc<TaskClass>>,
    by_name: NameIndex<usize>,
    frozen: bool,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::with_max_collisions(DEFAULT_MAX_COLLISIONS)
    }

    pub fn with_max_collisions(max_collisions: usize) -> Self {
        Self {
            classes: Vec::new(),
            by_name: NameIndex::new(max_collisions),
            frozen: false,
        }
    }

    /// Registers a new class, returning its [`ClassId`]. Panics if the
    /// registry has been frozen.
    pub fn register(&mut self, class: TaskClass) -> ClassId {
        assert!(!self.frozen, "cannot register a class after freeze()");
        let index = self.classes.len();
        let id = ClassId(index as u32);
        debug!(class = %class.name, id = index, "registering task class");
        self.by_name.insert(class.name.clone(), index);
        self.classes.push(Arc::new(class));
        id
    }

    /// Idempotent: returns the existing class if `name` is already
    /// registered, otherwise builds one with `make` and registers it.
    pub fn find_or_create(&mut self, name: &str, make: impl FnOnce(ClassId) -> TaskClass) -> Arc<TaskClass> {
        if let Some(existing) = self.find(name) {
            return existing;
        }
        assert!(!self.frozen, "cannot register a class after freeze()");
        let index = self.classes.len();
        let id = ClassId(index as u32);
        let class = make(id);
        self.by_name.insert(class.name.clone(), index);
        self.classes.push(Arc::new(class));
        self.classes[index].clone()
    }

    pub fn find(&self, name: &str) -> Option<Arc<TaskClass>> {
        self.by_name.get(name).map(|&i| self.classes[i].clone())
    }

    pub fn element_at(&self, id: ClassId) -> PtgResult<Arc<TaskClass>> {
        self.classes
            .get(id.0 as usize)
            .cloned()
            .ok_or_else(|| PtgError::InvalidProgram(format!("no class registered at index {}", id.0)))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Freezes the registry. After this, `register`/`find_or_create`
    /// panic; enumeration and scheduling may begin.
    pub fn freeze(&mut self) {
        if self.classes.is_empty() {
            warn!("freezing a registry with no registered classes");
        }
        debug!(classes = self.classes.len(), "registry frozen");
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TaskClass>> {
        self.classes.iter()
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{ClassFlags, DataDescriptor};
    use ptg_deps::DependencyArray;
    use ptg_types::{AccessMode, DatatypeId, Parameter};

    struct FixedRank(u32);
    impl DataDescriptor for FixedRank {
        fn rank_of(&self, _locals: &[i64]) -> u32 {
            self.0
        }
    }

    fn dummy_class(id: ClassId, name: &str) -> TaskClass {
        TaskClass {
            id,
            name: name.to_string(),
            locals: Vec::new(),
            predicates: Vec::new(),
            inputs: Vec::new(),
            outputs: vec![Parameter {
                name: "out".into(),
                mode: AccessMode::Write,
                datatype: DatatypeId(0),
            }],
            output_edges: vec![Vec::new()],
            expected_inbound_mask: 0,
            flags: ClassFlags::default(),
            affinity: Arc::new(FixedRank(0)),
            hook: Arc::new(|_: &ptg_types::ExecutionContext| crate::hook::HookStatus::Done),
            dep_root: DependencyArray::new(),
        }
    }

    #[test]
    fn register_find_and_freeze() {
        let mut reg = ClassRegistry::new();
        let id = reg.register(dummy_class(ClassId(0), "T"));
        assert_eq!(reg.find("T").unwrap().id, id);
        assert_eq!(reg.element_at(id).unwrap().name, "T");
        reg.freeze();
        assert!(reg.is_frozen());
    }

    #[test]
    #[should_panic]
    fn register_after_freeze_panics() {
        let mut reg = ClassRegistry::new();
        reg.freeze();
        reg.register(dummy_class(ClassId(0), "T"));
    }

    #[test]
    fn find_or_create_is_idempotent() {
        let mut reg = ClassRegistry::new();
        let a = reg.find_or_create("T", |id| dummy_class(id, "T"));
        let b = reg.find_or_create("T", |id| dummy_class(id, "T"));
        assert_eq!(a.id, b.id);
        assert_eq!(reg.len(), 1);
    }
}
