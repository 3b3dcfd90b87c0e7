//! Streaming mbox splitter.
//!
//! Reads the archive line by line through a buffered reader, hands each
//! complete message to a callback in on-disk order, and stops as soon as
//! the callback asks it to. Never loads the whole file into memory.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{MailError, Result};

/// Size of the internal read buffer.
const READ_BUFFER_SIZE: usize = 256 * 1024;

/// Default maximum message size in bytes (64 MB). Longer messages are
/// truncated, not rejected.
const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Splits an mbox file into raw messages.
///
/// Tolerant of:
///
/// - Mixed `\n` and `\r\n` line endings
/// - `From ` lines not preceded by a blank line (logs a warning)
/// - Truncated messages at EOF
/// - A UTF-8 BOM at the start of the file
pub struct MboxParser {
    path: PathBuf,
    file_size: u64,
    max_message_size: usize,
}

impl MboxParser {
    /// Create a parser for the given archive.
    ///
    /// Verifies that the path exists and is a file, but does NOT validate
    /// that it is actually an mbox.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MailError::NotFound(format!("Mailbox not found: {}", path.display()))
            } else {
                MailError::io(&path, e)
            }
        })?;
        if !metadata.is_file() {
            return Err(MailError::Parse(format!(
                "'{}' is not a mailbox file",
                path.display()
            )));
        }
        Ok(Self {
            path,
            file_size: metadata.len(),
            max_message_size: MAX_MESSAGE_SIZE,
        })
    }

    pub fn with_max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = max;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Walk the archive, calling `on_message(index, raw_bytes)` for each
    /// message. `index` counts from 0 in file order. Returning
    /// `ControlFlow::Break` stops the scan without reading further.
    ///
    /// Returns the number of messages delivered to the callback.
    pub fn for_each_message<F>(&self, mut on_message: F) -> Result<usize>
    where
        F: FnMut(usize, &[u8]) -> ControlFlow<()>,
    {
        if self.file_size == 0 {
            return Ok(0);
        }

        let file = File::open(&self.path).map_err(|e| MailError::io(&self.path, e))?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        let mut delivered = 0usize;
        let mut message_buf: Vec<u8> = Vec::with_capacity(64 * 1024);
        let mut line_buf: Vec<u8> = Vec::with_capacity(4096);
        let mut prev_line_was_empty = true;
        let mut oversize_logged = false;
        let mut offset: u64 = 0;

        loop {
            line_buf.clear();
            let read = reader
                .read_until(b'\n', &mut line_buf)
                .map_err(|e| MailError::io(&self.path, e))?;
            if read == 0 {
                break;
            }

            if is_mbox_separator(&line_buf) {
                if !prev_line_was_empty {
                    warn!(
                        path = %self.path.display(),
                        offset,
                        "Found 'From ' separator without preceding blank line"
                    );
                }
                // A whitespace-only preamble before the first separator is
                // not a message.
                if !message_buf.iter().all(u8::is_ascii_whitespace) {
                    let flow = on_message(delivered, &message_buf);
                    delivered += 1;
                    if flow.is_break() {
                        debug!(path = %self.path.display(), delivered, "Archive scan stopped early");
                        return Ok(delivered);
                    }
                }
                message_buf.clear();
                oversize_logged = false;
                message_buf.extend_from_slice(&line_buf);
            } else if message_buf.len() + line_buf.len() <= self.max_message_size {
                message_buf.extend_from_slice(&line_buf);
            } else if !oversize_logged {
                warn!(
                    path = %self.path.display(),
                    offset,
                    max_size = self.max_message_size,
                    "Message exceeds maximum size, truncating body"
                );
                oversize_logged = true;
            }

            prev_line_was_empty = is_blank_line(&line_buf);
            offset += read as u64;
        }

        // Trailing content counts as a message only if it holds more than
        // blank lines.
        if !message_buf.iter().all(u8::is_ascii_whitespace) {
            let _ = on_message(delivered, &message_buf);
            delivered += 1;
        }

        debug!(path = %self.path.display(), delivered, "Archive scan complete");
        Ok(delivered)
    }

    /// Count the messages in the archive.
    pub fn count(&self) -> Result<usize> {
        self.for_each_message(|_, _| ControlFlow::Continue(()))
    }
}

/// Check whether a line is an mbox separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    let line = line.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(line);
    line.starts_with(b"From ")
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}
