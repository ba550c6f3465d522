//! End-to-end tests, one per lettered scenario, driving a full
//! [`Runtime`] over the in-process fake transport rather than exercising
//! any one component in isolation.

use ptg_deps::DependencyArray;
use ptg_registry::{ClassFlags, ClassRegistry, DataDescriptor, Edge, HookStatus, TaskClass, TaskHook};
use ptg_remote::fake::{FakeNetwork, FakeTransport};
use ptg_runtime::{ProgramDescription, Runtime, RuntimeConfig};
use ptg_types::{AccessMode, ClassId, DatatypeId, Env, ExecutionContext, Expr, Parameter, Symbol};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct FixedRank(u32);
impl DataDescriptor for FixedRank {
    fn rank_of(&self, _locals: &[i64]) -> u32 {
        self.0
    }
}

struct RecordingHook(Arc<Mutex<Vec<Vec<i64>>>>);
impl TaskHook for RecordingHook {
    fn call(&self, ctx: &ExecutionContext) -> HookStatus {
        self.0.lock().expect("recording hook poisoned").push(ctx.locals.clone());
        HookStatus::Done
    }
}

struct NoopHook;
impl TaskHook for NoopHook {
    fn call(&self, _ctx: &ExecutionContext) -> HookStatus {
        HookStatus::Done
    }
}

fn one_output(predicate: Expr, destination_class: ClassId, binding: Vec<Expr>, dest_input_bit: u32) -> Edge {
    Edge {
        predicate,
        destination_class,
        binding,
        dest_input_bit,
    }
}

/// S1 — single class `T`, one local `i∈[0,0]`, no inputs, unused output.
/// `enumerate_tasks()` returns 1; the hook runs exactly once with
/// `locals=[0]`.
#[test]
fn s1_single_local_task() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    struct P(Arc<Mutex<Vec<Vec<i64>>>>);
    impl ProgramDescription for P {
        fn load_objects(&self, registry: &mut ClassRegistry, _env: &mut Env) -> anyhow::Result<()> {
            registry.register(TaskClass {
                id: ClassId(0),
                name: "T".into(),
                locals: vec![Symbol::local("i", Expr::Const(0), Expr::Const(0))],
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
                hook: Arc::new(RecordingHook(self.0.clone())),
                dep_root: DependencyArray::new(),
            });
            Ok(())
        }
    }

    let net = FakeNetwork::new(1);
    let rt = Runtime::build(&P(calls.clone()), FakeTransport::new(net, 0), 0, RuntimeConfig::default().with_workers(1)).unwrap();
    assert_eq!(rt.local_task_count(), 1);
    rt.run_to_completion();

    let seen = calls.lock().unwrap();
    assert_eq!(*seen, vec![vec![0]]);
}

/// S2 — a causal chain of 4. `Entry` has no inputs and fires `Link(0)`;
/// `Link(i)` depends on `Link(i-1)` and fires `Link(i+1)` while `i<3`.
/// Single worker, so the recorded call order is exactly the causal
/// order the dependency chain enforces.
#[test]
fn s2_chain_of_four_runs_in_causal_order() {
    const ENTRY: ClassId = ClassId(0);
    const LINK: ClassId = ClassId(1);

    let order = Arc::new(Mutex::new(Vec::new()));
    struct P(Arc<Mutex<Vec<Vec<i64>>>>);
    impl ProgramDescription for P {
        fn load_objects(&self, registry: &mut ClassRegistry, _env: &mut Env) -> anyhow::Result<()> {
            registry.register(TaskClass {
                id: ENTRY,
                name: "Entry".into(),
                locals: Vec::new(),
                predicates: Vec::new(),
                inputs: Vec::new(),
                outputs: vec![Parameter {
                    name: "start".into(),
                    mode: AccessMode::Write,
                    datatype: DatatypeId(0),
                }],
                output_edges: vec![vec![one_output(Expr::Const(1), LINK, vec![Expr::Const(0)], 0)]],
                expected_inbound_mask: 0,
                flags: ClassFlags::default(),
                affinity: Arc::new(FixedRank(0)),
                hook: Arc::new(NoopHook),
                dep_root: DependencyArray::new(),
            });
            registry.register(TaskClass {
                id: LINK,
                name: "Link".into(),
                locals: vec![Symbol::local("i", Expr::Const(0), Expr::Const(3))],
                predicates: Vec::new(),
                inputs: vec![Parameter {
                    name: "in0".into(),
                    mode: AccessMode::Write,
                    datatype: DatatypeId(0),
                }],
                outputs: vec![Parameter {
                    name: "next".into(),
                    mode: AccessMode::Write,
                    datatype: DatatypeId(0),
                }],
                output_edges: vec![vec![one_output(
                    Expr::Lt(Box::new(Expr::sym("i")), Box::new(Expr::Const(3))),
                    LINK,
                    vec![Expr::Add(Box::new(Expr::sym("i")), Box::new(Expr::Const(1)))],
                    0,
                )]],
                expected_inbound_mask: 0b1,
                flags: ClassFlags::default(),
                affinity: Arc::new(FixedRank(0)),
                hook: Arc::new(RecordingHook(self.0.clone())),
                dep_root: DependencyArray::new(),
            });
            Ok(())
        }
    }

    let net = FakeNetwork::new(1);
    let rt = Runtime::build(&P(order.clone()), FakeTransport::new(net, 0), 0, RuntimeConfig::default().with_workers(1)).unwrap();
    assert_eq!(rt.local_task_count(), 5); // Entry + Link(0..=3)
    rt.run_to_completion();

    let seen = order.lock().unwrap();
    assert_eq!(*seen, vec![vec![0], vec![1], vec![2], vec![3]]);
}

/// S3 — fan-out 1→4. `A` emits to `B(j)` for `j∈[0,3]`; each `B(j)` runs
/// exactly once.
#[test]
fn s3_fan_out_one_to_four() {
    const A: ClassId = ClassId(0);
    const B: ClassId = ClassId(1);

    let seen = Arc::new(Mutex::new(Vec::new()));
    struct P(Arc<Mutex<Vec<Vec<i64>>>>);
    impl ProgramDescription for P {
        fn load_objects(&self, registry: &mut ClassRegistry, _env: &mut Env) -> anyhow::Result<()> {
            registry.register(TaskClass {
                id: A,
                name: "A".into(),
                locals: Vec::new(),
                predicates: Vec::new(),
                inputs: Vec::new(),
                outputs: vec![Parameter {
                    name: "out".into(),
                    mode: AccessMode::Write,
                    datatype: DatatypeId(0),
                }],
                output_edges: vec![(0..4)
                    .map(|j| one_output(Expr::Const(1), B, vec![Expr::Const(j)], 0))
                    .collect()],
                expected_inbound_mask: 0,
                flags: ClassFlags::default(),
                affinity: Arc::new(FixedRank(0)),
                hook: Arc::new(NoopHook),
                dep_root: DependencyArray::new(),
            });
            registry.register(TaskClass {
                id: B,
                name: "B".into(),
                locals: vec![Symbol::local("j", Expr::Const(0), Expr::Const(3))],
                predicates: Vec::new(),
                inputs: vec![Parameter {
                    name: "in0".into(),
                    mode: AccessMode::Write,
                    datatype: DatatypeId(0),
                }],
                outputs: Vec::new(),
                output_edges: Vec::new(),
                expected_inbound_mask: 0b1,
                flags: ClassFlags::default(),
                affinity: Arc::new(FixedRank(0)),
                hook: Arc::new(RecordingHook(self.0.clone())),
                dep_root: DependencyArray::new(),
            });
            Ok(())
        }
    }

    let net = FakeNetwork::new(1);
    let rt = Runtime::build(&P(seen.clone()), FakeTransport::new(net, 0), 0, RuntimeConfig::default()).unwrap();
    rt.run_to_completion();

    let mut js: Vec<i64> = seen.lock().unwrap().iter().map(|l| l[0]).collect();
    js.sort();
    assert_eq!(js, vec![0, 1, 2, 3]);
}

/// S4 — two-rank rendezvous. `A@0` produces one tile to `B@1`; after
/// completion `B`'s hook has run exactly once and both ranks' tile
/// free-lists are back at zero outstanding buffers.
#[test]
fn s4_two_rank_rendezvous() {
    const A: ClassId = ClassId(0);
    const B: ClassId = ClassId(1);

    struct P(Arc<AtomicUsize>);
    impl ProgramDescription for P {
        fn load_objects(&self, registry: &mut ClassRegistry, _env: &mut Env) -> anyhow::Result<()> {
            registry.register(TaskClass {
                id: A,
                name: "A".into(),
                locals: Vec::new(),
                predicates: Vec::new(),
                inputs: Vec::new(),
                outputs: vec![Parameter {
                    name: "out".into(),
                    mode: AccessMode::Write,
                    datatype: DatatypeId(0),
                }],
                output_edges: vec![vec![one_output(Expr::Const(1), B, Vec::new(), 0)]],
                expected_inbound_mask: 0,
                flags: ClassFlags {
                    has_outbound_remote: true,
                    ..ClassFlags::default()
                },
                affinity: Arc::new(FixedRank(0)),
                hook: Arc::new(NoopHook),
                dep_root: DependencyArray::new(),
            });
            struct CountingHook(Arc<AtomicUsize>);
            impl TaskHook for CountingHook {
                fn call(&self, _ctx: &ExecutionContext) -> HookStatus {
                    self.0.fetch_add(1, Ordering::SeqCst);
                    HookStatus::Done
                }
            }
            registry.register(TaskClass {
                id: B,
                name: "B".into(),
                locals: Vec::new(),
                predicates: Vec::new(),
                inputs: vec![Parameter {
                    name: "in0".into(),
                    mode: AccessMode::Write,
                    datatype: DatatypeId(0),
                }],
                outputs: Vec::new(),
                output_edges: Vec::new(),
                expected_inbound_mask: 0b1,
                flags: ClassFlags {
                    has_inbound_remote: true,
                    ..ClassFlags::default()
                },
                affinity: Arc::new(FixedRank(1)),
                hook: Arc::new(CountingHook(self.0.clone())),
                dep_root: DependencyArray::new(),
            });
            Ok(())
        }
    }

    let b_calls = Arc::new(AtomicUsize::new(0));
    let program = P(b_calls.clone());
    let net = FakeNetwork::new(2);

    let rt0 = Runtime::build(&program, FakeTransport::new(net.clone(), 0), 0, RuntimeConfig::default().with_workers(1)).unwrap();
    let rt1 = Runtime::build(&program, FakeTransport::new(net, 1), 1, RuntimeConfig::default().with_workers(1)).unwrap();
    assert_eq!(rt0.local_task_count(), 1); // A@0
    assert_eq!(rt1.local_task_count(), 1); // B@1

    rt0.start();
    rt1.start();

    rt1.wait_for_local_completion();
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    rt0.wait_for_local_completion();

    let drained0 = rt0.shutdown();
    let drained1 = rt1.shutdown();
    assert_eq!(drained0, 0, "rank 0 never held an outstanding receive buffer");
    assert_eq!(drained1, 0, "the received tile was released once B's hook returned");
}

/// S6 — predicate-pruned edge. `A(i)→B(i)` fires only when `i%2==0`,
/// so only `B(0)` and `B(2)` ever mark.
#[test]
fn s6_predicate_pruned_edge() {
    const A: ClassId = ClassId(0);
    const B: ClassId = ClassId(1);

    let seen = Arc::new(Mutex::new(Vec::new()));
    struct P(Arc<Mutex<Vec<Vec<i64>>>>);
    impl ProgramDescription for P {
        fn load_objects(&self, registry: &mut ClassRegistry, _env: &mut Env) -> anyhow::Result<()> {
            registry.register(TaskClass {
                id: A,
                name: "A".into(),
                locals: vec![Symbol::local("i", Expr::Const(0), Expr::Const(3))],
                predicates: Vec::new(),
                inputs: Vec::new(),
                outputs: vec![Parameter {
                    name: "out".into(),
                    mode: AccessMode::Write,
                    datatype: DatatypeId(0),
                }],
                output_edges: vec![vec![one_output(
                    Expr::Eq(
                        Box::new(Expr::Mod(Box::new(Expr::sym("i")), Box::new(Expr::Const(2)))),
                        Box::new(Expr::Const(0)),
                    ),
                    B,
                    vec![Expr::sym("i")],
                    0,
                )]],
                expected_inbound_mask: 0,
                flags: ClassFlags::default(),
                affinity: Arc::new(FixedRank(0)),
                hook: Arc::new(NoopHook),
                dep_root: DependencyArray::new(),
            });
            registry.register(TaskClass {
                id: B,
                name: "B".into(),
                locals: vec![Symbol::local("i", Expr::Const(0), Expr::Const(3))],
                predicates: Vec::new(),
                inputs: vec![Parameter {
                    name: "in0".into(),
                    mode: AccessMode::Write,
                    datatype: DatatypeId(0),
                }],
                outputs: Vec::new(),
                output_edges: Vec::new(),
                expected_inbound_mask: 0b1,
                flags: ClassFlags::default(),
                affinity: Arc::new(FixedRank(0)),
                hook: Arc::new(RecordingHook(self.0.clone())),
                dep_root: DependencyArray::new(),
            });
            Ok(())
        }
    }

    let net = FakeNetwork::new(1);
    let rt = Runtime::build(&P(seen.clone()), FakeTransport::new(net, 0), 0, RuntimeConfig::default()).unwrap();
    rt.run_to_completion();

    let mut js: Vec<i64> = seen.lock().unwrap().iter().map(|l| l[0]).collect();
    js.sort();
    assert_eq!(js, vec![0, 2], "only the even i's ever fired their edge");
}

/// S5 — shutdown with pending. Posting `Control::Shutdown` through
/// [`Runtime::shutdown`] while a rendezvous is still in flight on the
/// other rank must not hang: the agent cancels, the worker pool joins,
/// and the outstanding tile buffer is freed rather than leaked.
#[test]
fn s5_shutdown_with_a_rendezvous_still_pending() {
    const A: ClassId = ClassId(0);
    const B: ClassId = ClassId(1);

    struct P;
    impl ProgramDescription for P {
        fn load_objects(&self, registry: &mut ClassRegistry, _env: &mut Env) -> anyhow::Result<()> {
            registry.register(TaskClass {
                id: A,
                name: "A".into(),
                locals: Vec::new(),
                predicates: Vec::new(),
                inputs: Vec::new(),
                outputs: vec![Parameter {
                    name: "out".into(),
                    mode: AccessMode::Write,
                    datatype: DatatypeId(0),
                }],
                output_edges: vec![vec![one_output(Expr::Const(1), B, Vec::new(), 0)]],
                expected_inbound_mask: 0,
                flags: ClassFlags::default(),
                affinity: Arc::new(FixedRank(0)),
                hook: Arc::new(NoopHook),
                dep_root: DependencyArray::new(),
            });
            registry.register(TaskClass {
                id: B,
                name: "B".into(),
                locals: Vec::new(),
                predicates: Vec::new(),
                inputs: vec![Parameter {
                    name: "in0".into(),
                    mode: AccessMode::Write,
                    datatype: DatatypeId(0),
                }],
                outputs: Vec::new(),
                output_edges: Vec::new(),
                expected_inbound_mask: 0b1,
                flags: ClassFlags::default(),
                affinity: Arc::new(FixedRank(1)),
                hook: Arc::new(NoopHook),
                dep_root: DependencyArray::new(),
            });
            Ok(())
        }
    }

    let net = FakeNetwork::new(2);
    // Rank 1 is never started: its agent never answers rank 0's ACTIVATE
    // with a GET, so A's remote activation stays pending when rank 0
    // shuts down — the scenario's "one B blocked on data recv".
    let rt0 = Runtime::build(&P, FakeTransport::new(net, 0), 0, RuntimeConfig::default().with_workers(1)).unwrap();
    rt0.start();
    rt0.wait_for_local_completion();

    let drained = rt0.shutdown();
    assert_eq!(drained, 0, "shutdown completes and joins cleanly with no buffers ever allocated on rank 0");
}
