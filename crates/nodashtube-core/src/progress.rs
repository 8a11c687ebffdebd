//! Incremental parser for the downloader's stdout.
//!
//! The downloader announces its output file once, on a newline-terminated line
//! starting with [`DESTINATION_MARKER`], then repaints a single progress line
//! terminated by `\r`. The parser first seeks the marker; once the filename is
//! known it only tracks the most recent `\r`-terminated line and drops consumed
//! bytes so the buffer never holds more than one partial line.

use std::sync::{Mutex, OnceLock, PoisonError, RwLock};

/// Literal the downloader prints right before the chosen output filename.
pub const DESTINATION_MARKER: &[u8] = b"[download] Destination: ";

/// Narrow write-only interface the process launcher feeds subprocess output into.
pub trait OutputSink: Send + Sync {
    fn write(&self, chunk: &[u8]);
}

/// Streaming parser owned by one session.
#[derive(Debug, Default)]
pub struct ProgressParser {
    /// Unconsumed output. Only touched from the single output-delivery path.
    buf: Mutex<Vec<u8>>,
    /// Set at most once; its presence is the "filename resolved" state.
    filename: OnceLock<String>,
    /// The only field read concurrently by observers.
    last_line: RwLock<String>,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output filename, once the destination line has been seen.
    pub fn filename(&self) -> Option<&str> {
        self.filename.get().map(String::as_str)
    }

    /// Most recent progress line (empty until something was parsed).
    pub fn progress(&self) -> String {
        self.last_line
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Bytes currently buffered and not yet consumed.
    pub fn buffered_len(&self) -> usize {
        self.buf.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn set_progress(&self, line: &[u8]) {
        let line = String::from_utf8_lossy(line).into_owned();
        *self
            .last_line
            .write()
            .unwrap_or_else(PoisonError::into_inner) = line;
    }

    /// Seeking state. Until the marker shows up, the last complete line is
    /// reported as progress so that marker-less output still surfaces something.
    fn seek_filename(&self, buf: &mut Vec<u8>) {
        match find_destination(buf) {
            Some((name, line_end)) => {
                if self.filename.set(name).is_ok() {
                    tracing::debug!(filename = ?self.filename(), "resolved output filename");
                }
                buf.drain(..=line_end);
                self.consume_progress(buf);
            }
            None => {
                if let Some(line) = last_complete_line(buf) {
                    self.set_progress(line);
                }
            }
        }
    }

    /// Streaming state: the span between the last `\n` before the last `\r`
    /// and that `\r` becomes the progress line; everything up to the `\r` is dropped.
    fn consume_progress(&self, buf: &mut Vec<u8>) {
        let Some(cr) = buf.iter().rposition(|&b| b == b'\r') else {
            return;
        };
        let start = buf[..cr]
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |nl| nl + 1);
        self.set_progress(&buf[start..cr]);
        buf.drain(..=cr);
    }
}

impl OutputSink for ProgressParser {
    fn write(&self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        let mut buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        buf.extend_from_slice(chunk);
        if self.filename.get().is_none() {
            self.seek_filename(&mut buf);
        } else {
            self.consume_progress(&mut buf);
        }
    }
}

/// Finds the first destination line carrying a non-empty name. Returns the name
/// and the index of the newline that terminates it.
fn find_destination(buf: &[u8]) -> Option<(String, usize)> {
    let mut from = 0;
    while let Some(pos) = find_subslice(&buf[from..], DESTINATION_MARKER) {
        let name_start = from + pos + DESTINATION_MARKER.len();
        let nl = name_start + buf[name_start..].iter().position(|&b| b == b'\n')?;
        let mut name = &buf[name_start..nl];
        if let [rest @ .., b'\r'] = name {
            name = rest;
        }
        if !name.is_empty() {
            return Some((String::from_utf8_lossy(name).into_owned(), nl));
        }
        from = nl + 1;
    }
    None
}

/// Last non-empty line that is already terminated by `\n` or `\r`.
fn last_complete_line(buf: &[u8]) -> Option<&[u8]> {
    let is_delim = |b: &u8| *b == b'\n' || *b == b'\r';
    let end = buf.iter().rposition(is_delim)?;
    let complete = &buf[..end];
    let trimmed_end = complete.iter().rposition(|b| !is_delim(b))? + 1;
    let content = &complete[..trimmed_end];
    let start = content.iter().rposition(is_delim).map_or(0, |i| i + 1);
    Some(&content[start..])
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
