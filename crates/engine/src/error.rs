//! Engine error types (thiserror-based).

use thiserror::Error;

use pm_media::{CodecError, DemuxError, SinkError};

use crate::session::SessionState;

/// Top-level player error.
#[derive(Error, Debug)]
pub enum PlayerError {
    /// Command issued from a state that does not allow it. The session is
    /// unchanged.
    #[error("operation not allowed in state {0:?}")]
    InvalidOperation(SessionState),

    #[error("demux error: {0}")]
    Demux(#[from] DemuxError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("audio sink error: {0}")]
    Sink(#[from] SinkError),

    /// The sink accepted fewer bytes than the capped request — the
    /// backpressure arithmetic no longer holds, so the session faults.
    #[error("audio sink wrote {written} of {requested} requested bytes")]
    ShortWrite { requested: usize, written: usize },

    #[error("failed to spawn player worker: {0}")]
    Spawn(#[from] std::io::Error),

    /// The worker thread is gone; no further commands can be processed.
    #[error("player worker disconnected")]
    WorkerGone,
}

/// Convenience Result type for player operations.
pub type PlayerResult<T> = Result<T, PlayerError>;
