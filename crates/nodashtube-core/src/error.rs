//! Error types for the session manager.
//!
//! Per-request errors (`StartError`, `CancelError`) are recovered by the caller
//! and turned into a response. `IndexError` means the download directory itself
//! is gone or unreadable and is treated as fatal by the daemon.

use std::io;
use std::path::PathBuf;

/// Why a start request did not result in a running download.
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// A session for this source id is already registered.
    #[error("download of {0} is already in progress")]
    AlreadyInProgress(String),
    /// The external downloader could not be launched; the session was rolled back.
    #[error("could not start downloader for {source_id}: {source}")]
    Spawn {
        source_id: String,
        #[source]
        source: io::Error,
    },
}

/// Why a cancel request failed.
#[derive(Debug, thiserror::Error)]
pub enum CancelError {
    /// No session is registered for this source id.
    #[error("{0} is not in progress")]
    NotFound(String),
    /// The kill request failed. The session has been removed anyway.
    #[error("could not terminate download of {source_id}: {source}")]
    Termination {
        source_id: String,
        #[source]
        source: io::Error,
    },
}

/// The download directory could not be inspected.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("download directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
}
