//! Launching the external downloader.
//!
//! The supervisor only sees a [`Launcher`]: it hands over the source id, the
//! working directory and an output sink, and gets back a termination handle plus
//! a future that resolves when the process exits. `CommandLauncher` is the real
//! implementation on top of `tokio::process`.

use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::oneshot;

use crate::progress::OutputSink;
use crate::session::ProcessHandle;

/// How long to keep draining stdout after the process has exited. A grandchild
/// that inherited the pipe can otherwise hold it open indefinitely.
const STDOUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

const READ_CHUNK: usize = 8 * 1024;

/// How a downloader process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessExit {
    Success,
    /// Non-zero exit, killed by a signal, or waiting on it failed.
    Failure(String),
}

impl ProcessExit {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessExit::Success)
    }
}

pub type ExitFuture = Pin<Box<dyn Future<Output = ProcessExit> + Send>>;

/// A started process: kill switch and completion future.
pub struct Launched {
    pub handle: Box<dyn ProcessHandle>,
    pub exit: ExitFuture,
}

pub trait Launcher: Send + Sync {
    /// Spawn the downloader for `source_id` in `dir`, delivering stdout to `sink`.
    /// Must be called from within a Tokio runtime.
    fn launch(
        &self,
        source_id: &str,
        dir: &Path,
        sink: Arc<dyn OutputSink>,
    ) -> io::Result<Launched>;
}

/// Runs `program args... <source_id>` as a child process.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: String,
    args: Vec<String>,
}

impl CommandLauncher {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Launcher for CommandLauncher {
    fn launch(
        &self,
        source_id: &str,
        dir: &Path,
        sink: Arc<dyn OutputSink>,
    ) -> io::Result<Launched> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(source_id)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;
        tracing::debug!(pid = ?child.id(), program = %self.program, source_id, "spawned downloader");

        let pump = child
            .stdout
            .take()
            .map(|stdout| tokio::spawn(pump_output(stdout, sink)));
        let (kill_tx, kill_rx) = oneshot::channel();
        let exit = Box::pin(wait_for_exit(child, pump, kill_rx));

        Ok(Launched {
            handle: Box::new(KillSwitch {
                tx: Mutex::new(Some(kill_tx)),
            }),
            exit,
        })
    }
}

/// Termination handle for a `CommandLauncher` child. The child itself is owned
/// by the exit future; a kill request is delivered to it over a oneshot.
#[derive(Debug)]
struct KillSwitch {
    tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl ProcessHandle for KillSwitch {
    fn terminate(&self) -> io::Result<()> {
        let Some(tx) = self.tx.lock().unwrap_or_else(PoisonError::into_inner).take() else {
            // Already requested.
            return Ok(());
        };
        tx.send(()).map_err(|()| {
            io::Error::new(io::ErrorKind::NotFound, "process already exited")
        })
    }
}

async fn pump_output(mut stdout: ChildStdout, sink: Arc<dyn OutputSink>) {
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match stdout.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => sink.write(&buf[..n]),
            Err(e) => {
                tracing::debug!("downloader stdout read failed: {}", e);
                break;
            }
        }
    }
}

async fn wait_for_exit(
    mut child: Child,
    pump: Option<tokio::task::JoinHandle<()>>,
    mut kill_rx: oneshot::Receiver<()>,
) -> ProcessExit {
    // A dropped sender (session gone without a kill) disables the kill branch.
    let waited = tokio::select! {
        status = child.wait() => Some(status),
        Ok(()) = &mut kill_rx => None,
    };
    let status = match waited {
        Some(status) => status,
        None => match child.kill().await {
            Ok(()) => child.wait().await,
            Err(e) => Err(e),
        },
    };

    if let Some(pump) = pump {
        if tokio::time::timeout(STDOUT_DRAIN_TIMEOUT, pump).await.is_err() {
            tracing::debug!("stdout still open after exit; stopped draining");
        }
    }

    match status {
        Ok(status) if status.success() => ProcessExit::Success,
        Ok(status) => ProcessExit::Failure(status.to_string()),
        Err(e) => ProcessExit::Failure(format!("wait failed: {}", e)),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::progress::ProgressParser;

    fn sh(script: &str) -> CommandLauncher {
        CommandLauncher::new("sh", vec!["-c".into(), script.into(), "sh".into()])
    }

    #[tokio::test]
    async fn output_reaches_sink_and_exit_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let parser = Arc::new(ProgressParser::new());
        let launched = sh("printf '[download] Destination: %s.mp4\\n' \"$1\"")
            .launch("clip", dir.path(), Arc::clone(&parser) as Arc<dyn OutputSink>)
            .unwrap();
        assert_eq!(launched.exit.await, ProcessExit::Success);
        assert_eq!(parser.filename(), Some("clip.mp4"));
    }

    #[tokio::test]
    async fn runs_in_download_dir() {
        let dir = tempfile::tempdir().unwrap();
        let parser = Arc::new(ProgressParser::new());
        let launched = sh("touch made-here")
            .launch("x", dir.path(), parser as Arc<dyn OutputSink>)
            .unwrap();
        assert!(launched.exit.await.is_success());
        assert!(dir.path().join("made-here").exists());
    }

    #[tokio::test]
    async fn nonzero_exit_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let parser = Arc::new(ProgressParser::new());
        let launched = sh("exit 3")
            .launch("x", dir.path(), parser as Arc<dyn OutputSink>)
            .unwrap();
        assert!(!launched.exit.await.is_success());
    }

    #[tokio::test]
    async fn terminate_stops_process() {
        let dir = tempfile::tempdir().unwrap();
        let parser = Arc::new(ProgressParser::new());
        let launched = sh("sleep 30")
            .launch("x", dir.path(), parser as Arc<dyn OutputSink>)
            .unwrap();
        launched.handle.terminate().unwrap();
        let exit = tokio::time::timeout(Duration::from_secs(10), launched.exit)
            .await
            .expect("process should stop after terminate");
        assert!(!exit.is_success());
    }

    #[tokio::test]
    async fn terminate_after_exit_errors() {
        let dir = tempfile::tempdir().unwrap();
        let parser = Arc::new(ProgressParser::new());
        let launched = sh("true")
            .launch("x", dir.path(), parser as Arc<dyn OutputSink>)
            .unwrap();
        let Launched { handle, exit } = launched;
        assert!(exit.await.is_success());
        assert!(handle.terminate().is_err());
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let parser = Arc::new(ProgressParser::new());
        let launcher = CommandLauncher::new("/nonexistent/nodashtube-downloader", Vec::new());
        assert!(launcher
            .launch("x", dir.path(), parser as Arc<dyn OutputSink>)
            .is_err());
    }
}
