//! Paginated reads and linear search over a single mbox archive.
//!
//! Each call opens the archive, streams it once in on-disk order and
//! closes it again. Scans stop as soon as the requested window or match
//! budget is filled.

use std::ops::ControlFlow;
use std::path::Path;

use tracing::debug;

use crate::error::{MailError, Result};
use crate::model::message::Message;
use crate::parser::mbox::MboxParser;
use crate::parser::mime::normalize;

/// Return the messages in `[offset, offset + limit)` in archive order.
///
/// An offset at or past the end yields an empty list. A message that
/// cannot be normalized fails the whole read.
pub fn read_archive(path: &Path, limit: usize, offset: usize) -> Result<Vec<Message>> {
    let parser = MboxParser::new(path)?;
    if limit == 0 {
        return Ok(Vec::new());
    }

    let end = offset.saturating_add(limit);
    let mut messages = Vec::with_capacity(limit.min(256));
    let mut failure: Option<MailError> = None;

    parser.for_each_message(|index, raw| {
        if index < offset {
            return ControlFlow::Continue(());
        }
        match normalize(raw) {
            Ok(message) => messages.push(message),
            Err(e) => {
                failure = Some(e);
                return ControlFlow::Break(());
            }
        }
        if index + 1 >= end {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })?;

    if let Some(e) = failure {
        return Err(e);
    }
    debug!(path = %path.display(), offset, limit, returned = messages.len(), "Read archive window");
    Ok(messages)
}

/// Return up to `limit` messages whose subject, sender or body contains
/// `query`, compared case-insensitively, in archive order.
pub fn search_archive(path: &Path, query: &str, limit: usize) -> Result<Vec<Message>> {
    let parser = MboxParser::new(path)?;
    if limit == 0 {
        return Ok(Vec::new());
    }

    let needle = query.to_lowercase();
    let mut hits = Vec::new();
    let mut failure: Option<MailError> = None;

    let scanned = parser.for_each_message(|_, raw| {
        let message = match normalize(raw) {
            Ok(message) => message,
            Err(e) => {
                failure = Some(e);
                return ControlFlow::Break(());
            }
        };
        if matches_query(&message, &needle) {
            hits.push(message);
            if hits.len() >= limit {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    })?;

    if let Some(e) = failure {
        return Err(e);
    }
    debug!(path = %path.display(), query, scanned, hits = hits.len(), "Searched archive");
    Ok(hits)
}

/// `needle` must already be lowercase.
fn matches_query(message: &Message, needle: &str) -> bool {
    [&message.subject, &message.from, &message.body]
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}
