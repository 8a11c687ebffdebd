//! CLI for NoDashTube: `serve` runs the daemon, every other command talks to it
//! over the control socket.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Parser, Subcommand};
use nodashtube_core::config;
use std::path::PathBuf;

use commands::{
    run_add, run_cancel, run_done, run_file, run_partial, run_serve, run_status, run_stored,
};

/// Top-level CLI for NoDashTube.
#[derive(Debug, Parser)]
#[command(name = "nodashtube")]
#[command(about = "NoDashTube: run and watch youtube-dl downloads", long_about = None)]
pub struct Cli {
    /// Control socket path (defaults to the config value, then the XDG state dir).
    #[arg(long, global = true, value_name = "PATH")]
    pub socket: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the download daemon.
    Serve {
        /// Where to write the downloads (defaults to <tmp>/nodashtube).
        #[arg(long = "dl-dir", value_name = "DIR")]
        dl_dir: Option<PathBuf>,
    },

    /// Start downloading a URL.
    Add {
        /// Video URL handed to the downloader.
        url: String,
    },

    /// Cancel an in-progress download.
    Cancel {
        /// URL the download was started with.
        url: String,
    },

    /// Show in-progress downloads.
    Status,

    /// List completed downloads.
    Stored {
        /// Only list if something changed after this unix timestamp.
        #[arg(long, value_name = "UNIX_SECS")]
        since: Option<u64>,
    },

    /// Show the file a finished URL produced.
    Done {
        url: String,
    },

    /// Print the path of a completed file.
    File {
        /// File name as shown by `stored`.
        name: String,
    },

    /// Print the path of the partial file of an in-progress download.
    Partial {
        url: String,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let socket = cfg.control_socket(cli.socket.as_deref())?;

        match cli.command {
            CliCommand::Serve { dl_dir } => run_serve(&cfg, dl_dir.as_deref(), &socket).await?,
            CliCommand::Add { url } => run_add(&socket, &url).await?,
            CliCommand::Cancel { url } => run_cancel(&socket, &url).await?,
            CliCommand::Status => run_status(&socket).await?,
            CliCommand::Stored { since } => run_stored(&socket, since).await?,
            CliCommand::Done { url } => run_done(&socket, &url).await?,
            CliCommand::File { name } => run_file(&socket, &name).await?,
            CliCommand::Partial { url } => run_partial(&socket, &url).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
