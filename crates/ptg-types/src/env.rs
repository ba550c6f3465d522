use std::collections::HashMap;

/// Globals bound once, before enumeration (Section 6: `assign_global`).
#[derive(Debug, Default, Clone)]
pub struct Env {
    globals: HashMap<String, i64>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign_global(&mut self, name: impl Into<String>, value: i64) {
        self.globals.insert(name.into(), value);
    }

    pub fn global(&self, name: &str) -> Option<i64> {
        self.globals.get(name).copied()
    }
}

/// A partial (or complete) binding of a class's locals, in declaration
/// order, layered over the process-wide [`Env`]. Locals shadow globals of
/// the same name.
pub struct Assignment<'a> {
    env: &'a Env,
    bound: &'a [(String, i64)],
}

impl<'a> Assignment<'a> {
    pub fn new(env: &'a Env, bound: &'a [(String, i64)]) -> Self {
        Self { env, bound }
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.bound
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
            .or_else(|| self.env.global(name))
    }
}
