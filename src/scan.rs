//! Archive Scan Driver
//!
//! An archive root holds year-prefixed subdirectories, each with zero or
//! more `.ichat` files. [`MessageSource`] enumerates both levels in
//! lexicographic order (hidden entries skipped), decodes every file
//! sequentially, and accumulates the results: folder order, then file
//! order, then in-file sequence order. Output is never re-sorted by
//! timestamp.
//!
//! A file that fails to decode is recorded as a [`FileFailure`] and the
//! scan moves on; accumulated messages survive alongside the failure list.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::message::{Message, decode_file};
use crate::{Error, Result};

/// File extension of archive files
pub const ARCHIVE_EXTENSION: &str = "ichat";

/// A message archive rooted at one directory tree
#[derive(Debug, Clone)]
pub struct MessageSource {
    archive_root: PathBuf,
    attachments_root: Option<PathBuf>,
    named_handles: HashMap<String, String>,
    filter_folders_by_year: bool,
}

/// Everything one scan produced
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// All decoded messages, in folder/file/sequence order
    pub messages: Vec<Message>,
    /// Files (or folders) that failed to decode, with their errors
    pub failures: Vec<FileFailure>,
}

/// A per-file decode failure recorded during a scan
#[derive(Debug)]
pub struct FileFailure {
    /// Path of the file or folder that failed
    pub path: PathBuf,
    /// What went wrong
    pub error: Error,
}

impl MessageSource {
    /// Create a source over an archive root directory
    pub fn new<P: AsRef<Path>>(archive_root: P) -> Self {
        MessageSource {
            archive_root: archive_root.as_ref().to_path_buf(),
            attachments_root: None,
            named_handles: HashMap::new(),
            filter_folders_by_year: true,
        }
    }

    /// Set the directory tree searched for attachment files
    pub fn attachments_root<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.attachments_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Supply external identifier-to-name overrides for display names
    pub fn named_handles(mut self, handles: HashMap<String, String>) -> Self {
        self.named_handles = handles;
        self
    }

    /// Whether a year filter also restricts folders by name prefix
    ///
    /// On by default. Folder names conventionally start with a year, but a
    /// folder's year and a message's calendar year can diverge, so the
    /// folder-level restriction is a separate policy from the per-message
    /// filter.
    pub fn filter_folders_by_year(mut self, enabled: bool) -> Self {
        self.filter_folders_by_year = enabled;
        self
    }

    /// Scan the archive root and decode every message
    ///
    /// With `year` set, messages from other calendar years are dropped and
    /// (by default) so are folders without the year prefix.
    pub fn collect_messages(&self, year: Option<i32>) -> Result<ScanOutcome> {
        let mut outcome = ScanOutcome::default();

        let mut folders = list_directory(&self.archive_root)?
            .into_iter()
            .filter(|(_, is_dir)| *is_dir)
            .map(|(name, _)| name)
            .collect::<Vec<_>>();
        if let Some(year) = year
            && self.filter_folders_by_year
        {
            let prefix = year.to_string();
            folders.retain(|name| name.starts_with(&prefix));
        }
        folders.sort();

        for folder in folders {
            let folder_path = self.archive_root.join(&folder);
            let mut files = match list_directory(&folder_path) {
                Ok(entries) => entries
                    .into_iter()
                    .filter(|(name, is_dir)| {
                        !is_dir
                            && Path::new(name)
                                .extension()
                                .is_some_and(|extension| extension == ARCHIVE_EXTENSION)
                    })
                    .map(|(name, _)| name)
                    .collect::<Vec<_>>(),
                Err(error) => {
                    outcome.failures.push(FileFailure {
                        path: folder_path,
                        error,
                    });
                    continue;
                },
            };
            files.sort();

            for file in files {
                let path = folder_path.join(&file);
                match decode_file(
                    &path,
                    self.attachments_root.as_deref(),
                    year,
                    &self.named_handles,
                ) {
                    Ok(mut messages) => outcome.messages.append(&mut messages),
                    Err(error) => outcome.failures.push(FileFailure { path, error }),
                }
            }
        }

        Ok(outcome)
    }
}

/// List one directory level as `(name, is_directory)` pairs
///
/// Hidden entries and names that are not valid Unicode are skipped. No
/// ordering is assumed from the file system; callers sort.
fn list_directory(path: &Path) -> Result<Vec<(String, bool)>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let is_dir = entry.file_type()?.is_dir();
        entries.push((name, is_dir));
    }
    Ok(entries)
}

/// Collect every message under an archive root
///
/// Convenience wrapper over [`MessageSource`] for callers that need no
/// further configuration.
pub fn collect_messages<P: AsRef<Path>, Q: AsRef<Path>>(
    archive_root: P,
    attachments_root: Option<Q>,
    year: Option<i32>,
) -> Result<ScanOutcome> {
    let mut source = MessageSource::new(archive_root);
    if let Some(root) = attachments_root {
        source = source.attachments_root(root);
    }
    source.collect_messages(year)
}
