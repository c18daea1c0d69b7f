//! Attachment Locator
//!
//! Attachments live in an arbitrarily nested directory tree in which each
//! attachment owns one directory named after its transfer GUID, holding the
//! file under its recorded name. The locator walks that tree depth-first
//! with an explicit work stack, visiting children in lexicographic order so
//! repeated scans resolve identically. Unreadable directories prune their
//! branch; a failed search is "not found", never an error.

use std::fs;
use std::path::{Path, PathBuf};

/// Find the directory named after an attachment's transfer GUID
pub fn find_attachment_dir(root: &Path, transfer_guid: &str) -> Option<PathBuf> {
    let mut pending = vec![root.to_path_buf()];

    while let Some(directory) = pending.pop() {
        if directory
            .file_name()
            .is_some_and(|name| name == transfer_guid)
        {
            return Some(directory);
        }

        let Ok(entries) = fs::read_dir(&directory) else {
            continue;
        };
        let mut children = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_dir()))
            .map(|entry| entry.path())
            .collect::<Vec<_>>();
        children.sort();

        // pushed in reverse so the lexicographically smallest pops first
        for child in children.into_iter().rev() {
            pending.push(child);
        }
    }
    None
}

/// Resolve an attachment's on-disk path from its GUID and recorded file name
pub fn resolve_attachment(root: &Path, transfer_guid: &str, file_name: &str) -> Option<PathBuf> {
    let directory = find_attachment_dir(root, transfer_guid)?;
    let path = directory.join(file_name);
    path.exists().then_some(path)
}
