//! The capability traits every backend implements.
//!
//! Read-side operations are split by family so a store only has to
//! provide what it can answer; [`MailStore`] bundles the three read-side
//! traits for the dispatcher. Sending is separate because the relay is
//! independent of where messages are read from.

use crate::error::Result;
use crate::model::folder::FolderListing;
use crate::model::message::{Entry, MessageView, SearchHit};

/// Lists the folders a backend can read.
pub trait FolderLister {
    fn list_folders(&self) -> Result<FolderListing>;
}

/// Paginated reads from one folder.
pub trait MessageReader {
    /// Return up to `limit` messages starting at `offset`, in the
    /// backend's stable read order.
    fn read(&self, folder: &str, limit: usize, offset: usize) -> Result<Vec<Entry<MessageView>>>;
}

/// Query matching over one folder or the whole store.
pub trait MessageSearcher {
    /// Return at most `limit` hits. `folder == None` means the backend's
    /// default scope.
    fn search(&self, query: &str, folder: Option<&str>, limit: usize)
        -> Result<Vec<Entry<SearchHit>>>;
}

/// A plain-text message to hand to the relay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Comma-separated carbon-copy recipients.
    pub cc: Option<String>,
}

/// Transmits composed messages.
pub trait MessageSender: Send + Sync {
    /// Returns a human-readable confirmation on success.
    fn send(&self, message: &OutgoingMessage) -> Result<String>;
}

/// A store answering every read-side operation.
pub trait MailStore: FolderLister + MessageReader + MessageSearcher + Send + Sync {}

impl<T> MailStore for T where T: FolderLister + MessageReader + MessageSearcher + Send + Sync {}
