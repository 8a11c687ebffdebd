//! `nodashtube status` – show in-progress downloads.

use anyhow::Result;
use nodashtube_core::control::{Request, Response};
use std::path::Path;

use crate::cli::control_socket;

pub async fn run_status(socket: &Path) -> Result<()> {
    let sessions = match control_socket::send(socket, &Request::Status).await? {
        Response::Status { sessions } => sessions,
        other => return super::unexpected(other),
    };
    if sessions.is_empty() {
        println!("No downloads in progress.");
        return Ok(());
    }
    println!("{:<40} {:<40} {}", "URL", "FILE", "PROGRESS");
    for (url, view) in sessions {
        let file = view
            .filename
            .map(|f| format!("{f}.part"))
            .unwrap_or_else(|| "-".to_string());
        println!("{:<40} {:<40} {}", url, file, view.progress.trim());
    }
    Ok(())
}
