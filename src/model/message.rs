//! Canonical message record and the shapes it is rendered into.

use serde::{Deserialize, Serialize};

/// Maximum body length (in characters) returned by a full read.
pub const READ_BODY_LIMIT: usize = 2000;

/// Maximum body preview length (in characters) attached to a search hit.
pub const SEARCH_PREVIEW_LIMIT: usize = 500;

/// A normalized email message.
///
/// Every field is a plain string: headers that are missing in the source
/// come through as `""`, so callers see the same shape no matter which
/// backend produced the message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Decoded `Subject:`.
    pub subject: String,
    /// Decoded `From:`.
    pub from: String,
    /// Decoded `To:`.
    pub to: String,
    /// Raw `Date:` header, not reparsed.
    pub date: String,
    /// `Message-ID:` header as sent.
    pub message_id: String,
    /// First `text/plain` part, or empty if there is none.
    pub body: String,
}

/// A message as returned by `read`: the body capped at
/// [`READ_BODY_LIMIT`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageView {
    pub subject: String,
    pub from: String,
    pub to: String,
    pub date: String,
    pub message_id: String,
    pub body: String,
    pub body_truncated: bool,
}

impl From<Message> for MessageView {
    fn from(msg: Message) -> Self {
        let (body, body_truncated) = truncate_chars(&msg.body, READ_BODY_LIMIT);
        Self {
            subject: msg.subject,
            from: msg.from,
            to: msg.to,
            date: msg.date,
            message_id: msg.message_id,
            body,
            body_truncated,
        }
    }
}

/// A message as returned by `search`: a short body preview and, for
/// searches spanning several archives, the archive it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub subject: String,
    pub from: String,
    pub to: String,
    pub date: String,
    pub message_id: String,
    pub body_preview: String,
    pub body_truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
}

impl From<Message> for SearchHit {
    fn from(msg: Message) -> Self {
        let (body_preview, body_truncated) = truncate_chars(&msg.body, SEARCH_PREVIEW_LIMIT);
        Self {
            subject: msg.subject,
            from: msg.from,
            to: msg.to,
            date: msg.date,
            message_id: msg.message_id,
            body_preview,
            body_truncated,
            folder: None,
        }
    }
}

impl SearchHit {
    pub fn in_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }
}

/// One element of a result list: either an item or a sentinel standing
/// in for an archive that could not be read.
///
/// Serialized untagged, so a sentinel renders as `{"error": "..."}` next
/// to ordinary records and callers detect it by the `error` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entry<T> {
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        folder: Option<String>,
    },
    Item(T),
}

impl<T> Entry<T> {
    pub fn error(error: impl ToString) -> Self {
        Self::Error {
            error: error.to_string(),
            folder: None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn item(&self) -> Option<&T> {
        match self {
            Self::Item(item) => Some(item),
            Self::Error { .. } => None,
        }
    }
}

/// Cap `text` at `max` characters. Returns the (possibly shortened) text
/// and whether anything was cut.
pub fn truncate_chars(text: &str, max: usize) -> (String, bool) {
    match text.char_indices().nth(max) {
        Some((byte_pos, _)) => (text[..byte_pos].to_string(), true),
        None => (text.to_string(), false),
    }
}
