//! Control protocol between the daemon and its clients.
//!
//! One request per line: `<verb>[ <argument>]`. The argument is the rest of the
//! line, so filenames with spaces survive. Each request gets exactly one JSON
//! response line.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::session::SessionView;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Start downloading a source id.
    Start(String),
    Cancel(String),
    /// In-progress sessions.
    Status,
    /// Completed files; `since` is unix seconds for a conditional fetch.
    Stored { since: Option<u64> },
    /// Filename a finished source id produced.
    Done(String),
    /// Path of a completed file, if it is in the stored index.
    File(String),
    /// Path of the `.part` file of an in-progress source id.
    Partial(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty request")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("{0} needs an argument")]
    MissingArgument(&'static str),
    #[error("invalid timestamp: {0}")]
    InvalidSince(String),
}

impl Request {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(&['\r', '\n'][..]).trim_start();
        if line.is_empty() {
            return Err(ParseError::Empty);
        }
        let (verb, arg) = match line.split_once(' ') {
            Some((verb, arg)) => (verb, arg.trim_start()),
            None => (line, ""),
        };
        let required = |name: &'static str| {
            if arg.is_empty() {
                Err(ParseError::MissingArgument(name))
            } else {
                Ok(arg.to_string())
            }
        };
        match verb {
            "start" => required("start").map(Request::Start),
            "cancel" => required("cancel").map(Request::Cancel),
            "status" => Ok(Request::Status),
            "stored" => {
                let arg = arg.trim();
                if arg.is_empty() {
                    return Ok(Request::Stored { since: None });
                }
                arg.parse::<u64>()
                    .map(|s| Request::Stored { since: Some(s) })
                    .map_err(|_| ParseError::InvalidSince(arg.to_string()))
            }
            "done" => required("done").map(Request::Done),
            "file" => required("file").map(Request::File),
            "partial" => required("partial").map(Request::Partial),
            other => Err(ParseError::UnknownCommand(other.to_string())),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Start(id) => write!(f, "start {}", id),
            Request::Cancel(id) => write!(f, "cancel {}", id),
            Request::Status => write!(f, "status"),
            Request::Stored { since: None } => write!(f, "stored"),
            Request::Stored { since: Some(s) } => write!(f, "stored {}", s),
            Request::Done(id) => write!(f, "done {}", id),
            Request::File(name) => write!(f, "file {}", name),
            Request::Partial(id) => write!(f, "partial {}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "response", rename_all = "snake_case")]
pub enum Response {
    Accepted,
    AlreadyInProgress,
    SpawnFailed {
        message: String,
    },
    Cancelled,
    /// Termination failed; the session was still removed.
    CancelFailed {
        message: String,
    },
    NotFound,
    Status {
        sessions: BTreeMap<String, SessionView>,
    },
    Stored {
        entries: Vec<String>,
        /// Unix seconds of the last rebuild.
        last_modified: Option<u64>,
    },
    NotModified,
    Done {
        filename: String,
    },
    Path {
        path: PathBuf,
    },
    Error {
        message: String,
    },
}
