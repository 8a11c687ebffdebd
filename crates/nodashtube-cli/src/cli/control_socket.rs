//! Control socket: server (during `nodashtube serve`) and client (every other command).
//! Protocol: one request line in, one JSON response line out (see `nodashtube_core::control`).

use anyhow::{Context, Result};
use nodashtube_core::control::{Request, Response};
use nodashtube_core::error::IndexError;
use nodashtube_core::service::DownloadService;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

/// Bind the control socket, replacing a stale socket file left by a previous run.
pub fn bind(path: &Path) -> Result<UnixListener> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("could not create socket dir {}", parent.display()))?;
    }
    let _ = std::fs::remove_file(path);
    UnixListener::bind(path)
        .with_context(|| format!("could not bind control socket {}", path.display()))
}

/// Accept connections forever, serving each on its own task. Directory failures
/// hit while serving are forwarded on `fatal_tx`.
pub async fn serve(
    listener: UnixListener,
    service: Arc<DownloadService>,
    fatal_tx: mpsc::UnboundedSender<IndexError>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let service = Arc::clone(&service);
                let fatal_tx = fatal_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, &service, &fatal_tx).await {
                        tracing::debug!("control connection: {}", e);
                    }
                });
            }
            Err(e) => tracing::debug!("control socket accept: {}", e),
        }
    }
}

async fn handle_connection(
    stream: UnixStream,
    service: &DownloadService,
    fatal_tx: &mpsc::UnboundedSender<IndexError>,
) -> Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Some(line) = lines.next_line().await? {
        let response = match Request::parse(&line) {
            Ok(request) => {
                tracing::debug!(%request, "control request");
                match service.handle(request) {
                    Ok(response) => response,
                    Err(e) => {
                        let _ = fatal_tx.send(e);
                        Response::Error {
                            message: "download directory unavailable".to_string(),
                        }
                    }
                }
            }
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        };
        let mut json = serde_json::to_string(&response)?;
        json.push('\n');
        write.write_all(json.as_bytes()).await?;
    }
    Ok(())
}

/// Send one request to the daemon and wait for its response.
pub async fn send(socket_path: &Path, request: &Request) -> Result<Response> {
    let stream = UnixStream::connect(socket_path).await.with_context(|| {
        format!(
            "could not connect to {} (is `nodashtube serve` running?)",
            socket_path.display()
        )
    })?;
    let (read, mut write) = stream.into_split();
    write.write_all(format!("{}\n", request).as_bytes()).await?;
    write.shutdown().await?;

    let line = BufReader::new(read)
        .lines()
        .next_line()
        .await?
        .context("daemon closed the connection without a response")?;
    let response = serde_json::from_str(&line)
        .with_context(|| format!("malformed response from daemon: {}", line))?;
    Ok(response)
}
