//! Folder references handed out by `list_folders`.

use serde::{Deserialize, Serialize};

/// What kind of store a folder reference points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderKind {
    /// A single-file mbox archive on disk.
    Mbox,
    /// A mailbox on an IMAP server.
    Imap,
}

/// A browsable collection of messages.
///
/// `path` is opaque to everything except the backend that produced it: a
/// filesystem path for archives, the raw mailbox name for IMAP. Pass it
/// back unchanged to `read` or `search`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRef {
    /// Human-readable name.
    pub name: String,
    /// Opaque reference understood by the producing backend.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FolderKind,
}

/// Result of `list_folders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderListing {
    pub folders: Vec<FolderRef>,
    /// Profile directory the archives were found in (archive backend only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}
