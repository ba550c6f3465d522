//! Section 6's environment knobs, plus the worker-count setting the core
//! leaves to "worker-pool construction" (Section 1's out-of-scope list) —
//! `ptg-runtime` still has to pick something to actually run a program,
//! so it is configured here rather than left as a stub.

use ptg_registry::DEFAULT_MAX_COLLISIONS;
use tracing::warn;

/// Concurrency window `W` per remote-deps agent (Section 4.G). Default
/// matches the source's example configuration of 3.
pub const DEFAULT_WINDOW_SIZE: usize = 3;
/// Agent idle sleep, in nanoseconds, when neither a transport completion
/// nor a queued command is available (Section 4.G).
pub const DEFAULT_YIELD_NS: u64 = 5_000;

/// Runtime-wide configuration, built via [`RuntimeConfig::from_env`] or
/// the builder methods, the way `ob-workflow::definition` assembles its
/// structs — a plain struct with `with_*` setters rather than a derive
/// macro, since every field here has a simple scalar default.
#[derive(Clone, Copy, Debug)]
pub struct RuntimeConfig {
    pub window_size: usize,
    pub yield_ns: u64,
    pub max_collisions: usize,
    pub workers: usize,
    pub tile_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            yield_ns: DEFAULT_YIELD_NS,
            max_collisions: DEFAULT_MAX_COLLISIONS,
            workers: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            tile_size: 64,
        }
    }
}

impl RuntimeConfig {
    /// Reads `WINDOW_SIZE`, `YIELD_NS` and `MAX_COLLISIONS` (Section 6).
    /// A set-but-unparseable value is logged and the default kept —
    /// there is no startup-abort path for malformed env, only for
    /// malformed programs (Section 7).
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.window_size = env_usize("WINDOW_SIZE", cfg.window_size);
        cfg.yield_ns = env_u64("YIELD_NS", cfg.yield_ns);
        cfg.max_collisions = env_usize("MAX_COLLISIONS", cfg.max_collisions);
        cfg
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_tile_size(mut self, tile_size: usize) -> Self {
        self.tile_size = tile_size;
        self
    }
}

fn env_usize(name: &str, default: usize) -> usize {
    match std::env::var(name) {
        Ok(v) => v.parse().unwrap_or_else(|_| {
            warn!(name, value = %v, "malformed env knob, keeping default");
            default
        }),
        Err(_) => default,
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(v) => v.parse().unwrap_or_else(|_| {
            warn!(name, value = %v, "malformed env knob, keeping default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_constants() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.window_size, 3);
        assert_eq!(cfg.yield_ns, 5_000);
        assert_eq!(cfg.max_collisions, DEFAULT_MAX_COLLISIONS);
    }

    #[test]
    fn builder_overrides_stick() {
        let cfg = RuntimeConfig::default().with_workers(7).with_window_size(9);
        assert_eq!(cfg.workers, 7);
        assert_eq!(cfg.window_size, 9);
    }
}
