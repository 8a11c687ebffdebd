//! CLI command handlers. `serve` runs the daemon; the rest are thin control clients.

mod add;
mod cancel;
mod done;
mod path;
mod serve;
mod status;
mod stored;

pub use add::run_add;
pub use cancel::run_cancel;
pub use done::run_done;
pub use path::{run_file, run_partial};
pub use serve::run_serve;
pub use status::run_status;
pub use stored::run_stored;

use anyhow::{bail, Result};
use nodashtube_core::control::Response;

/// Turn responses every client treats the same way into errors.
fn unexpected(response: Response) -> Result<()> {
    match response {
        Response::Error { message } => bail!("daemon error: {}", message),
        other => bail!("unexpected response from daemon: {:?}", other),
    }
}
