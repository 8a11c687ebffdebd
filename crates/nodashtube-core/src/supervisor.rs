//! Starts downloader processes and watches them to completion.
//!
//! `start` registers a session before spawning so duplicate requests for the
//! same source id are rejected without launching anything. Each spawned process
//! gets one detached watcher task that, on exit, records the result, removes the
//! session and refreshes the stored index.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::done::DoneLog;
use crate::error::{CancelError, IndexError, StartError};
use crate::index::StoredIndex;
use crate::process::{ExitFuture, Launched, Launcher, ProcessExit};
use crate::registry::SessionRegistry;
use crate::session::Session;

pub struct Supervisor {
    registry: Arc<SessionRegistry>,
    index: Arc<StoredIndex>,
    done: Arc<DoneLog>,
    launcher: Arc<dyn Launcher>,
    /// Directory failures seen by watchers; the daemon treats them as fatal.
    fatal_tx: mpsc::UnboundedSender<IndexError>,
}

impl Supervisor {
    /// Build a supervisor plus the receiving end of its fatal-error channel.
    pub fn new(
        registry: Arc<SessionRegistry>,
        index: Arc<StoredIndex>,
        done: Arc<DoneLog>,
        launcher: Arc<dyn Launcher>,
    ) -> (Self, mpsc::UnboundedReceiver<IndexError>) {
        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
        let supervisor = Self {
            registry,
            index,
            done,
            launcher,
            fatal_tx,
        };
        (supervisor, fatal_rx)
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Start downloading `source_id` in the index directory. Must be called
    /// from within a Tokio runtime.
    pub fn start(&self, source_id: &str) -> Result<(), StartError> {
        let session = Arc::new(Session::new(source_id));
        if !self.registry.try_add(Arc::clone(&session)) {
            tracing::info!(source_id, "not starting: already in progress");
            return Err(StartError::AlreadyInProgress(source_id.to_owned()));
        }

        let Launched { handle, exit } =
            match self
                .launcher
                .launch(source_id, self.index.dir(), session.sink())
            {
                Ok(launched) => launched,
                Err(source) => {
                    self.registry.remove_session(&session);
                    tracing::warn!(source_id, "could not start downloader: {}", source);
                    return Err(StartError::Spawn {
                        source_id: source_id.to_owned(),
                        source,
                    });
                }
            };

        if session.attach(handle) {
            tracing::info!(source_id, "starting download");
        } else {
            tracing::info!(source_id, "cancelled while starting");
        }
        self.spawn_watcher(session, exit);
        Ok(())
    }

    /// Terminate and forget the download for `source_id`.
    pub fn cancel(&self, source_id: &str) -> Result<(), CancelError> {
        match self.registry.cancel(source_id) {
            Ok(()) => {
                tracing::info!(source_id, "cancelled download");
                Ok(())
            }
            Err(CancelError::NotFound(id)) => {
                tracing::info!(source_id, "could not cancel: not in progress");
                Err(CancelError::NotFound(id))
            }
            Err(e) => {
                tracing::warn!(source_id, "{}", e);
                Err(e)
            }
        }
    }

    fn spawn_watcher(&self, session: Arc<Session>, exit: ExitFuture) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        let index = Arc::clone(&self.index);
        let done = Arc::clone(&self.done);
        let fatal_tx = self.fatal_tx.clone();

        tokio::spawn(async move {
            let outcome = exit.await;
            let source_id = session.source_id();
            // Losing the removal means a cancel got there first: not done.
            let removed = registry.remove_session(&session);
            match &outcome {
                ProcessExit::Success if removed => {
                    let filename = session.filename().unwrap_or_default();
                    done.record(source_id, filename);
                    tracing::info!(source_id, filename, "download done");
                }
                ProcessExit::Success => {
                    tracing::debug!(source_id, "exited after cancel");
                }
                ProcessExit::Failure(reason) => {
                    tracing::warn!(source_id, "downloader did not finish successfully: {}", reason);
                }
            }

            match tokio::task::spawn_blocking(move || index.refresh_if_stale()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::error!("stored index refresh failed: {}", e);
                    let _ = fatal_tx.send(e);
                }
                Err(e) => tracing::error!("stored index refresh task: {}", e),
            }
        })
    }
}
