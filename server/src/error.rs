//! Startup and transport failures of the server process.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("server is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Io(#[from] io::Error),
}
