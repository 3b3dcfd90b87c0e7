//! Remote store backend: folders and messages served over IMAP.
//!
//! Every call opens its own session, drives it through select/search/fetch
//! and logs out again. Nothing is cached between calls.

pub mod session;

use tracing::{debug, warn};

use crate::backend::{FolderLister, MessageReader, MessageSearcher};
use crate::config::Config;
use crate::error::Result;
use crate::model::folder::{FolderKind, FolderListing, FolderRef};
use crate::model::message::{Entry, Message, MessageView, SearchHit};
use crate::parser::mime::normalize;

pub use session::{display_name, Connector, ImapConnector, ImapSession, MailSession, SessionGuard};

/// Folder searched when the caller names none.
pub const DEFAULT_FOLDER: &str = "INBOX";

/// Reads and searches a remote store through a [`Connector`].
#[derive(Debug, Clone)]
pub struct RemoteStore<C: Connector> {
    connector: C,
}

impl RemoteStore<ImapConnector> {
    pub fn from_config(config: &Config) -> Self {
        Self::new(ImapConnector::from_config(config))
    }
}

impl<C: Connector> RemoteStore<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    /// Fetch and normalize each sequence number in order. A message that
    /// fails to decode becomes an error entry in its slot.
    fn fetch_all<T: From<Message>>(
        session: &mut SessionGuard<C::Session>,
        ids: &[u32],
    ) -> Result<Vec<Entry<T>>> {
        let mut entries = Vec::with_capacity(ids.len());
        for &seq in ids {
            let raw = session.fetch_raw(seq)?;
            match normalize(&raw) {
                Ok(message) => entries.push(Entry::Item(T::from(message))),
                Err(e) => {
                    warn!(seq, error = %e, "Fetched message could not be decoded");
                    entries.push(Entry::error(e));
                }
            }
        }
        Ok(entries)
    }
}

impl<C: Connector> FolderLister for RemoteStore<C> {
    fn list_folders(&self) -> Result<FolderListing> {
        let mut session = self.connector.open()?;
        let raw_names = session.list_folders()?;
        session.close();

        let folders = raw_names
            .into_iter()
            .map(|raw| FolderRef {
                name: display_name(&raw),
                path: raw,
                kind: FolderKind::Imap,
            })
            .collect();
        Ok(FolderListing {
            folders,
            profile: None,
        })
    }
}

impl<C: Connector> MessageReader for RemoteStore<C> {
    fn read(&self, folder: &str, limit: usize, offset: usize) -> Result<Vec<Entry<MessageView>>> {
        let mut session = self.connector.open()?;
        session.select(folder)?;
        let ids = session.search("ALL")?;
        let window = newest_first_window(&ids, limit, offset);
        debug!(folder, total = ids.len(), offset, limit, window = window.len(), "Reading folder");

        let entries = Self::fetch_all(&mut session, &window)?;
        session.close();
        Ok(entries)
    }
}

impl<C: Connector> MessageSearcher for RemoteStore<C> {
    fn search(
        &self,
        query: &str,
        folder: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Entry<SearchHit>>> {
        let folder = folder.unwrap_or(DEFAULT_FOLDER);
        let mut session = self.connector.open()?;
        session.select(folder)?;

        let ids = session.search(&search_criteria(query))?;
        let selected: Vec<u32> = ids.iter().copied().take(limit).collect();
        debug!(folder, query, matched = ids.len(), fetching = selected.len(), "Searching folder");

        let entries = Self::fetch_all(&mut session, &selected)?;
        session.close();
        Ok(entries)
    }
}

/// Select the page `[offset, offset + limit)` of `ids` counted from the
/// newest end, newest first. `ids` must be ascending.
pub fn newest_first_window(ids: &[u32], limit: usize, offset: usize) -> Vec<u32> {
    ids.iter().rev().skip(offset).take(limit).copied().collect()
}

/// IMAP criteria matching `query` in the subject or the sender.
pub fn search_criteria(query: &str) -> String {
    let quoted = quote(query);
    format!("OR SUBJECT {quoted} FROM {quoted}")
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
