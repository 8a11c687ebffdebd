//! `nodashtube done <url>` – file produced by a finished download.

use anyhow::Result;
use nodashtube_core::control::{Request, Response};
use std::path::Path;

use crate::cli::control_socket;

pub async fn run_done(socket: &Path, url: &str) -> Result<()> {
    match control_socket::send(socket, &Request::Done(url.to_string())).await? {
        Response::Done { filename } if filename.is_empty() => {
            println!("{url} finished (file name unknown)")
        }
        Response::Done { filename } => println!("{filename}"),
        Response::NotFound => println!("{url} has not finished"),
        other => super::unexpected(other)?,
    }
    Ok(())
}
