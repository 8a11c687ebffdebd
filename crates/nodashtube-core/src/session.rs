//! One in-flight download: source id, its progress parser, and the handle used
//! to terminate the downloader process.

use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::progress::{OutputSink, ProgressParser};

/// Termination capability for a running downloader. The OS handle itself never
/// leaves the launcher.
pub trait ProcessHandle: Send + Sync + fmt::Debug {
    /// Ask the process to stop. Best effort; an error usually means it already exited.
    fn terminate(&self) -> io::Result<()>;
}

/// Where the session is in its life: the process handle is attached only after
/// a successful spawn.
#[derive(Debug)]
enum HandleSlot {
    Starting,
    Running(Box<dyn ProcessHandle>),
    /// Cancelled before the handle arrived; the process is killed on attach.
    Cancelled,
}

/// Live record of one in-progress download.
#[derive(Debug)]
pub struct Session {
    source_id: String,
    parser: Arc<ProgressParser>,
    handle: Mutex<HandleSlot>,
}

impl Session {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            parser: Arc::new(ProgressParser::new()),
            handle: Mutex::new(HandleSlot::Starting),
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Output filename, once the downloader announced it.
    pub fn filename(&self) -> Option<&str> {
        self.parser.filename()
    }

    pub fn progress(&self) -> String {
        self.parser.progress()
    }

    /// Sink the launcher writes stdout into. Crate-private so observers cannot
    /// feed the parser.
    pub(crate) fn sink(&self) -> Arc<dyn OutputSink> {
        Arc::clone(&self.parser) as Arc<dyn OutputSink>
    }

    /// Attach the process handle after spawn. Returns false if the session was
    /// cancelled in the meantime, in which case the process is terminated here.
    pub(crate) fn attach(&self, handle: Box<dyn ProcessHandle>) -> bool {
        let mut slot = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*slot, HandleSlot::Starting) {
            *slot = HandleSlot::Running(handle);
            return true;
        }
        drop(slot);
        if let Err(e) = handle.terminate() {
            tracing::warn!(source_id = %self.source_id, "terminate after late cancel: {}", e);
        }
        false
    }

    /// Request termination of the downloader.
    pub(crate) fn terminate(&self) -> io::Result<()> {
        let mut slot = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        match &*slot {
            HandleSlot::Running(handle) => handle.terminate(),
            HandleSlot::Starting => {
                *slot = HandleSlot::Cancelled;
                Ok(())
            }
            HandleSlot::Cancelled => Ok(()),
        }
    }

    /// Read-only copy for rendering.
    pub fn view(&self) -> SessionView {
        SessionView {
            source_id: self.source_id.clone(),
            filename: self.filename().map(str::to_owned),
            progress: self.progress(),
        }
    }
}

/// Point-in-time copy of a session's observable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub source_id: String,
    pub filename: Option<String>,
    pub progress: String,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Handle that counts terminate calls and optionally fails them.
    #[derive(Debug, Default)]
    pub(crate) struct FakeHandle {
        pub(crate) kills: Arc<AtomicUsize>,
        pub(crate) fail: bool,
    }

    impl ProcessHandle for FakeHandle {
        fn terminate(&self) -> io::Result<()> {
            self.kills.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(io::Error::new(io::ErrorKind::Other, "no such process"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn view_reflects_parser_output() {
        let s = Session::new("http://x");
        let v = s.view();
        assert_eq!(v.source_id, "http://x");
        assert_eq!(v.filename, None);
        assert_eq!(v.progress, "");

        s.sink().write(b"[download] Destination: x.mp4\n[download]  9.9%\r");
        let v = s.view();
        assert_eq!(v.filename.as_deref(), Some("x.mp4"));
        assert_eq!(v.progress, "[download]  9.9%");
    }

    #[test]
    fn terminate_before_attach_kills_on_attach() {
        let s = Session::new("http://x");
        s.terminate().unwrap();
        let kills = Arc::new(AtomicUsize::new(0));
        let attached = s.attach(Box::new(FakeHandle {
            kills: Arc::clone(&kills),
            fail: false,
        }));
        assert!(!attached);
        assert_eq!(kills.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn terminate_after_attach_reaches_handle() {
        let s = Session::new("http://x");
        let kills = Arc::new(AtomicUsize::new(0));
        assert!(s.attach(Box::new(FakeHandle {
            kills: Arc::clone(&kills),
            fail: true,
        })));
        assert!(s.terminate().is_err());
        assert_eq!(kills.load(Ordering::SeqCst), 1);
    }
}
