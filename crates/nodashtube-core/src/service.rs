//! Request-facing facade over the supervisor, registry, stored index and done log.
//!
//! Built once by the daemon and shared by every control connection. Per-request
//! failures become a [`Response`]; only an `IndexError` escapes, and the daemon
//! treats that as fatal.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;

use crate::control::{Request, Response};
use crate::done::DoneLog;
use crate::error::{CancelError, IndexError, StartError};
use crate::index::{IndexSnapshot, StoredIndex, TEMP_SUFFIX};
use crate::process::Launcher;
use crate::registry::SessionRegistry;
use crate::session::SessionView;
use crate::supervisor::Supervisor;

/// Answer to a conditional listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    NotModified,
    Modified(IndexSnapshot),
}

pub struct DownloadService {
    supervisor: Supervisor,
    registry: Arc<SessionRegistry>,
    index: Arc<StoredIndex>,
    done: Arc<DoneLog>,
}

impl DownloadService {
    /// Wire up the components over an existing `download_dir` and build the
    /// initial listing. Also returns the channel on which completion watchers
    /// report directory failures.
    pub fn new(
        download_dir: impl Into<PathBuf>,
        launcher: Arc<dyn Launcher>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<IndexError>), IndexError> {
        let registry = Arc::new(SessionRegistry::new());
        let index = Arc::new(StoredIndex::new(download_dir));
        let done = Arc::new(DoneLog::new());
        index.refresh_if_stale()?;

        let (supervisor, fatal_rx) = Supervisor::new(
            Arc::clone(&registry),
            Arc::clone(&index),
            Arc::clone(&done),
            launcher,
        );
        let service = Self {
            supervisor,
            registry,
            index,
            done,
        };
        Ok((service, fatal_rx))
    }

    pub fn download_dir(&self) -> &Path {
        self.index.dir()
    }

    pub fn start(&self, source_id: &str) -> Result<(), StartError> {
        self.supervisor.start(source_id)
    }

    pub fn cancel(&self, source_id: &str) -> Result<(), CancelError> {
        self.supervisor.cancel(source_id)
    }

    /// In-progress sessions. Also refreshes the index, since clients poll this.
    pub fn status(&self) -> Result<BTreeMap<String, SessionView>, IndexError> {
        self.index.refresh_if_stale()?;
        Ok(self.registry.snapshot())
    }

    /// Completed files, or `NotModified` when nothing is downloading and the
    /// listing has not changed after `if_modified_since` (whole seconds).
    pub fn stored(&self, if_modified_since: Option<SystemTime>) -> Result<Listing, IndexError> {
        self.stored_since_secs(if_modified_since.map(unix_secs))
    }

    /// [`stored`](Self::stored) with the threshold already in unix seconds.
    /// Any `u64` is accepted; values past `SystemTime`'s range just compare as later.
    pub fn stored_since_secs(&self, if_modified_since: Option<u64>) -> Result<Listing, IndexError> {
        self.index.refresh_if_stale()?;
        let snapshot = self.index.snapshot();
        if let (Some(since), Some(last)) = (if_modified_since, snapshot.last_modified) {
            if self.registry.is_empty() && unix_secs(last) <= since {
                return Ok(Listing::NotModified);
            }
        }
        Ok(Listing::Modified(snapshot))
    }

    /// Path of a completed file. Only names in the current listing resolve.
    pub fn stored_path(&self, name: &str) -> Option<PathBuf> {
        self.index
            .contains(name)
            .then(|| self.index.dir().join(name))
    }

    /// Path of the file being written for `source_id`, once its name is known.
    pub fn partial_path(&self, source_id: &str) -> Option<PathBuf> {
        let session = self.registry.lookup(source_id)?;
        let filename = session.filename()?;
        Some(self.index.dir().join(format!("{}{}", filename, TEMP_SUFFIX)))
    }

    /// Filename produced by a finished download of `source_id`.
    pub fn done(&self, source_id: &str) -> Option<String> {
        self.done.get(source_id)
    }

    /// Serve one control request.
    pub fn handle(&self, request: Request) -> Result<Response, IndexError> {
        let response = match request {
            Request::Start(id) => match self.start(&id) {
                Ok(()) => Response::Accepted,
                Err(StartError::AlreadyInProgress(_)) => Response::AlreadyInProgress,
                Err(e @ StartError::Spawn { .. }) => Response::SpawnFailed {
                    message: e.to_string(),
                },
            },
            Request::Cancel(id) => match self.cancel(&id) {
                Ok(()) => Response::Cancelled,
                Err(CancelError::NotFound(_)) => Response::NotFound,
                Err(e @ CancelError::Termination { .. }) => Response::CancelFailed {
                    message: e.to_string(),
                },
            },
            Request::Status => Response::Status {
                sessions: self.status()?,
            },
            Request::Stored { since } => {
                match self.stored_since_secs(since)? {
                    Listing::NotModified => Response::NotModified,
                    Listing::Modified(snapshot) => Response::Stored {
                        entries: snapshot.entries,
                        last_modified: snapshot.last_modified.map(unix_secs),
                    },
                }
            }
            Request::Done(id) => match self.done(&id) {
                Some(filename) => Response::Done { filename },
                None => Response::NotFound,
            },
            Request::File(name) => path_response(self.stored_path(&name)),
            Request::Partial(id) => path_response(self.partial_path(&id)),
        };
        Ok(response)
    }
}

fn path_response(path: Option<PathBuf>) -> Response {
    match path {
        Some(path) => Response::Path { path },
        None => Response::NotFound,
    }
}

/// Whole seconds since the epoch; times before it clamp to 0.
pub fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs())
}
