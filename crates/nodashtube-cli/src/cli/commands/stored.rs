//! `nodashtube stored [--since SECS]` – list completed downloads.

use anyhow::Result;
use nodashtube_core::control::{Request, Response};
use std::path::Path;

use crate::cli::control_socket;

pub async fn run_stored(socket: &Path, since: Option<u64>) -> Result<()> {
    match control_socket::send(socket, &Request::Stored { since }).await? {
        Response::NotModified => println!("Not modified."),
        Response::Stored {
            entries,
            last_modified,
        } => {
            if let Some(secs) = last_modified {
                tracing::debug!(last_modified = secs, "stored listing");
            }
            if entries.is_empty() {
                println!("No stored downloads.");
            }
            for name in entries {
                println!("{name}");
            }
        }
        other => super::unexpected(other)?,
    }
    Ok(())
}
