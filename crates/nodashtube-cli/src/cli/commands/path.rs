//! `nodashtube file <name>` and `nodashtube partial <url>` – resolve servable paths.

use anyhow::{bail, Result};
use nodashtube_core::control::{Request, Response};
use std::path::Path;

use crate::cli::control_socket;

pub async fn run_file(socket: &Path, name: &str) -> Result<()> {
    print_path(socket, Request::File(name.to_string()), name).await
}

pub async fn run_partial(socket: &Path, url: &str) -> Result<()> {
    print_path(socket, Request::Partial(url.to_string()), url).await
}

async fn print_path(socket: &Path, request: Request, what: &str) -> Result<()> {
    match control_socket::send(socket, &request).await? {
        Response::Path { path } => println!("{}", path.display()),
        Response::NotFound => bail!("{} not found", what),
        other => super::unexpected(other)?,
    }
    Ok(())
}
