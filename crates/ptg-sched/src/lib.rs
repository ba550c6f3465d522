//! Enumerator (Component E) and local release engine (Component F): the
//! pieces that turn a frozen class registry into ready task instances
//! and turn a completed instance back into releases of its successors.

pub mod enumerator;
pub mod release;

pub use enumerator::{enumerate_local, enumerate_local_with, predicate_holds};
pub use release::{
    input_bit_of, mark_remote_delivery, release_deps, ReadyQueue, ReleaseOutcome, RemoteSink,
    GETTYPE_REMOTE_DEPS, RELEASE_LOCAL_DEPS, RELEASE_REMOTE_DEPS,
};
