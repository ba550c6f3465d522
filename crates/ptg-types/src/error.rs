use thiserror::Error;

/// Errors produced while evaluating a program's symbolic description or
/// while releasing dependencies at runtime.
///
/// `InvalidProgram` and `UndefinedSymbol` are detected at enumeration time
/// and abort startup; `UnreachableInstance` is a per-release, non-fatal
/// condition that is counted and dropped.
#[derive(Debug, Error)]
pub enum PtgError {
    #[error("invalid program: {0}")]
    InvalidProgram(String),

    #[error("undefined symbol `{0}` in assignment")]
    UndefinedSymbol(String),

    #[error("release produced an instance outside its declared range: {0}")]
    UnreachableInstance(String),

    /// Fatal: the transport reported a failure on an ACTIVATE/GET/PUT
    /// exchange. The runtime makes no attempt to recover a partial DAG.
    #[error("transport failure on rank {rank}: {message}")]
    TransportFailure { rank: u32, message: String },

    /// Fatal: a free-list miss and a fresh allocation both failed.
    #[error("buffer exhausted: {0}")]
    BufferExhausted(String),

    /// Fatal at init: `MAX_TAG` is smaller than the tag space one full
    /// concurrency window requires.
    #[error("tag space exhausted: {0}")]
    TagSpaceExhausted(String),
}

pub type PtgResult<T> = Result<T, PtgError>;
