//! `nodashtube serve` – run the download daemon until interrupted.

use anyhow::{Context, Result};
use nodashtube_core::config::{self, NdtConfig};
use nodashtube_core::process::CommandLauncher;
use nodashtube_core::service::DownloadService;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::cli::control_socket;

pub async fn run_serve(cfg: &NdtConfig, dl_dir: Option<&Path>, socket: &Path) -> Result<()> {
    let download_dir = cfg.download_dir(dl_dir);
    config::ensure_download_dir(&download_dir)?;

    let launcher = Arc::new(CommandLauncher::new(
        cfg.downloader.program.clone(),
        cfg.downloader.args.clone(),
    ));
    let (service, mut watcher_fatal) = DownloadService::new(&download_dir, launcher)
        .context("could not read download dir")?;
    let service = Arc::new(service);

    let listener = control_socket::bind(socket)?;
    let (request_fatal_tx, mut request_fatal) = mpsc::unbounded_channel();
    let server = tokio::spawn(control_socket::serve(
        listener,
        Arc::clone(&service),
        request_fatal_tx,
    ));
    tracing::info!(
        dir = %download_dir.display(),
        socket = %socket.display(),
        program = %cfg.downloader.program,
        "serving"
    );
    println!(
        "Downloading to {} (control socket {})",
        download_dir.display(),
        socket.display()
    );

    let result = tokio::select! {
        Some(e) = watcher_fatal.recv() => Err(e),
        Some(e) = request_fatal.recv() => Err(e),
        _ = tokio::signal::ctrl_c() => Ok(()),
    };

    server.abort();
    let _ = std::fs::remove_file(socket);
    match result {
        Ok(()) => {
            tracing::info!("shutting down");
            Ok(())
        }
        Err(e) => {
            tracing::error!("download dir lost: {}", e);
            Err(anyhow::Error::new(e).context("download directory is no longer usable"))
        }
    }
}
