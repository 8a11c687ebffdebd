//! `nodashtube cancel <url>` – stop a download and forget it.

use anyhow::Result;
use nodashtube_core::control::{Request, Response};
use std::path::Path;

use crate::cli::control_socket;

pub async fn run_cancel(socket: &Path, url: &str) -> Result<()> {
    match control_socket::send(socket, &Request::Cancel(url.to_string())).await? {
        Response::Cancelled => println!("Cancelled {url}"),
        Response::NotFound => println!("{url} is not in progress"),
        // The session is gone either way; the kill itself failed.
        Response::CancelFailed { message } => {
            tracing::warn!("{}", message);
            println!("Removed {url} (terminate failed: {message})");
        }
        other => super::unexpected(other)?,
    }
    Ok(())
}
