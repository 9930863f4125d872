use std::io;

use thiserror::Error;

/// Failures that end the server as a whole.
///
/// Per-connection and per-command problems never surface here; they are
/// logged where they happen.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("listener failed: {0}")]
    Accept(#[source] io::Error),

    #[error("coordinator stopped")]
    CoordinatorClosed,

    #[error("coordinator task failed: {0}")]
    CoordinatorTask(#[from] tokio::task::JoinError),
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;
