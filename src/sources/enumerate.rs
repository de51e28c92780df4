use std::fs::File;
use std::path::Path;

use log::{debug, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::sources::SourceDescriptor;

fn is_zip_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("zip"))
        .unwrap_or(false)
}

/// Descriptors for the file members of a ZIP archive on disk
fn archive_members(path: &Path) -> Vec<SourceDescriptor> {
    let archive = SourceDescriptor::os(path);
    let zip = File::open(path)
        .map_err(zip::result::ZipError::Io)
        .and_then(ZipArchive::new);

    match zip {
        Ok(zip) => {
            let mut names: Vec<&str> = zip.file_names().filter(|n| !n.ends_with('/')).collect();
            names.sort();
            names
                .into_iter()
                .map(|name| SourceDescriptor::zip_member(archive.clone(), name))
                .collect()
        }
        Err(e) => {
            warn!("Unable to list archive {}, treating it as a plain file: {}", path.display(), e);
            vec![archive]
        }
    }
}

/// Expand a user supplied path into one descriptor per regular file.
///
/// Directories are walked recursively without following links or crossing
/// file systems. With `expand_archives`, every ZIP archive contributes its
/// members in addition to the archive file itself.
pub fn enumerate_sources(root: &Path, expand_archives: bool, skip_paths: &[String]) -> Vec<SourceDescriptor> {
    let mut sources = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .same_file_system(true)
        .sort_by_file_name();

    for entry in walker
        .into_iter()
        .filter_entry(|e| !skip_paths.iter().any(|skip| e.path().starts_with(skip)))
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        sources.push(SourceDescriptor::os(path));
        if expand_archives && is_zip_archive(path) {
            sources.extend(
                archive_members(path)
                    .into_iter()
                    .filter(|d| d.parent.is_some()),
            );
        }
    }

    debug!("Enumerated {} sources under {}", sources.len(), root.display());
    sources
}
