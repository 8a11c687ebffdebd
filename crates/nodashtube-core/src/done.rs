//! Filenames of downloads that finished successfully, by source id.
//!
//! Lets a polling client that saw a source id disappear from the status listing
//! find out which file it produced. Volatile; cancelled and failed downloads are
//! not recorded.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
pub struct DoneLog {
    finished: RwLock<HashMap<String, String>>,
}

impl DoneLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or overwrite) the filename produced for `source_id`. The filename
    /// is empty if the downloader never announced one.
    pub fn record(&self, source_id: &str, filename: &str) {
        self.finished
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(source_id.to_owned(), filename.to_owned());
    }

    pub fn get(&self, source_id: &str) -> Option<String> {
        self.finished
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source_id)
            .cloned()
    }
}
