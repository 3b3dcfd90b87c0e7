//! Local archive backend: mbox files inside a Thunderbird profile.

pub mod profile;
pub mod reader;

use std::path::Path;

use tracing::{debug, warn};

use crate::backend::{FolderLister, MessageReader, MessageSearcher};
use crate::config::Config;
use crate::error::{MailError, Result};
use crate::model::folder::FolderListing;
use crate::model::message::{Entry, MessageView, SearchHit};

pub use profile::{enumerate_archives, ProfileLocator};
pub use reader::{read_archive, search_archive};

/// Serves folders, reads and searches from local mbox archives.
///
/// Holds no open files; each call opens what it needs and closes it.
#[derive(Debug, Clone)]
pub struct ArchiveBackend {
    locator: ProfileLocator,
}

impl ArchiveBackend {
    pub fn new(locator: ProfileLocator) -> Self {
        Self { locator }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(ProfileLocator::from_config(config))
    }

    /// Search every archive of the profile, stamping each hit with the
    /// archive's display name. An archive that fails contributes one
    /// error entry and the scan moves on.
    fn search_profile(&self, query: &str, limit: usize) -> Result<Vec<Entry<SearchHit>>> {
        let profile = self.locator.locate()?;
        let mut results: Vec<Entry<SearchHit>> = Vec::new();

        for archive in enumerate_archives(&profile) {
            if results.len() >= limit {
                break;
            }
            let remaining = limit - results.len();
            match search_archive(Path::new(&archive.path), query, remaining) {
                Ok(hits) => results.extend(
                    hits.into_iter()
                        .map(|m| Entry::Item(SearchHit::from(m).in_folder(&archive.name))),
                ),
                Err(e) => {
                    warn!(archive = %archive.path, error = %e, "Skipping unreadable archive");
                    results.push(Entry::Error {
                        error: e.to_string(),
                        folder: Some(archive.name.clone()),
                    });
                }
            }
        }

        results.truncate(limit);
        Ok(results)
    }
}

impl FolderLister for ArchiveBackend {
    fn list_folders(&self) -> Result<FolderListing> {
        let profile = self.locator.locate()?;
        Ok(FolderListing {
            folders: enumerate_archives(&profile),
            profile: Some(profile.to_string_lossy().into_owned()),
        })
    }
}

impl MessageReader for ArchiveBackend {
    fn read(&self, folder: &str, limit: usize, offset: usize) -> Result<Vec<Entry<MessageView>>> {
        let path = Path::new(folder);
        if !path.exists() {
            return Err(MailError::NotFound(format!("Mailbox not found: {folder}")));
        }
        match read_archive(path, limit, offset) {
            Ok(messages) => Ok(messages
                .into_iter()
                .map(|m| Entry::Item(MessageView::from(m)))
                .collect()),
            Err(e) => {
                warn!(archive = folder, error = %e, "Archive could not be read");
                Ok(vec![Entry::error(e)])
            }
        }
    }
}

impl MessageSearcher for ArchiveBackend {
    fn search(
        &self,
        query: &str,
        folder: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Entry<SearchHit>>> {
        match folder.map(Path::new).filter(|p| p.exists()) {
            Some(path) => match search_archive(path, query, limit) {
                Ok(hits) => Ok(hits
                    .into_iter()
                    .map(|m| Entry::Item(SearchHit::from(m)))
                    .collect()),
                Err(e) => {
                    warn!(archive = %path.display(), error = %e, "Archive could not be searched");
                    Ok(vec![Entry::error(e)])
                }
            },
            None => {
                if let Some(folder) = folder {
                    debug!(folder, "Folder does not exist, searching the whole profile");
                }
                self.search_profile(query, limit)
            }
        }
    }
}
