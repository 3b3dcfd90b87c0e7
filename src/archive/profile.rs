//! Thunderbird profile discovery and archive enumeration.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{MailError, Result};
use crate::model::folder::{FolderKind, FolderRef};

/// Subdirectories of a profile that hold mbox archives.
const MAIL_DIRS: &[&str] = &["Mail", "ImapMail"];

/// Extensions of Thunderbird index and bookkeeping files living next to
/// the archives.
const METADATA_EXTENSIONS: &[&str] = &["msf", "dat", "html", "json"];

/// Profile directory name suffixes that mark the default profile.
const DEFAULT_PROFILE_SUFFIXES: &[&str] = &[".default", ".default-release"];

/// Resolves the profile directory to read archives from.
#[derive(Debug, Clone, Default)]
pub struct ProfileLocator {
    explicit: Option<PathBuf>,
    default_root: Option<PathBuf>,
}

impl ProfileLocator {
    pub fn new(explicit: Option<PathBuf>, default_root: Option<PathBuf>) -> Self {
        Self {
            explicit,
            default_root,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.profile_path(), default_profiles_root())
    }

    /// Resolve the profile directory.
    ///
    /// An explicitly configured path wins and is returned as-is. Otherwise
    /// the platform root is scanned for a directory named `*.default` or
    /// `*.default-release`, falling back to the first directory found.
    pub fn locate(&self) -> Result<PathBuf> {
        if let Some(ref explicit) = self.explicit {
            return Ok(explicit.clone());
        }

        let not_found = || MailError::NotFound("Thunderbird profile not found".into());
        let root = self
            .default_root
            .as_deref()
            .filter(|root| root.is_dir())
            .ok_or_else(not_found)?;

        let mut profiles: Vec<PathBuf> = std::fs::read_dir(root)
            .map_err(|e| MailError::io(root, e))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        profiles.sort();

        let default = profiles.iter().find(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy())
                .is_some_and(|name| DEFAULT_PROFILE_SUFFIXES.iter().any(|s| name.ends_with(s)))
        });

        let profile = default.or_else(|| profiles.first()).cloned().ok_or_else(not_found)?;
        debug!(profile = %profile.display(), "Located profile");
        Ok(profile)
    }
}

/// Platform-specific directory that holds Thunderbird profiles.
pub fn default_profiles_root() -> Option<PathBuf> {
    if cfg!(target_os = "macos") {
        dirs::home_dir().map(|home| home.join("Library").join("Thunderbird").join("Profiles"))
    } else if cfg!(windows) {
        dirs::config_dir().map(|appdata| appdata.join("Thunderbird").join("Profiles"))
    } else {
        dirs::home_dir().map(|home| home.join(".thunderbird"))
    }
}

/// List every mbox archive under the profile's mail directories.
///
/// Hidden files and Thunderbird index/metadata files are skipped. Names
/// are relative to the mail directory they were found in.
pub fn enumerate_archives(profile: &Path) -> Vec<FolderRef> {
    let mut archives = Vec::new();

    for dir in MAIL_DIRS {
        let base = profile.join(dir);
        if !base.is_dir() {
            continue;
        }
        let walker = WalkDir::new(&base).sort_by_file_name().into_iter();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_archive_name(&entry.file_name().to_string_lossy()) {
                continue;
            }
            let path = entry.path();
            let name = path.strip_prefix(&base).unwrap_or(path);
            archives.push(FolderRef {
                name: name.to_string_lossy().into_owned(),
                path: path.to_string_lossy().into_owned(),
                kind: FolderKind::Mbox,
            });
        }
    }

    debug!(profile = %profile.display(), count = archives.len(), "Enumerated archives");
    archives
}

fn is_archive_name(name: &str) -> bool {
    if name.starts_with('.') {
        return false;
    }
    match name.rsplit_once('.') {
        Some((_, ext)) => !METADATA_EXTENSIONS
            .iter()
            .any(|m| ext.eq_ignore_ascii_case(m)),
        None => true,
    }
}
