//! `nodashtube add <url>` – start a download.

use anyhow::{bail, Result};
use nodashtube_core::control::{Request, Response};
use std::path::Path;

use crate::cli::control_socket;

pub async fn run_add(socket: &Path, url: &str) -> Result<()> {
    match control_socket::send(socket, &Request::Start(url.to_string())).await? {
        Response::Accepted => println!("Started download of {url}"),
        Response::AlreadyInProgress => println!("{url} is already in progress"),
        Response::SpawnFailed { message } => bail!("{}", message),
        other => super::unexpected(other)?,
    }
    Ok(())
}
