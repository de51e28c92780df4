use std::fs::{self, File, Metadata};
use std::io::{BufRead, BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use log::debug;
use zip::ZipArchive;

use crate::constants::HASH_BUFFER_SIZE;
use crate::sources::{SourceDescriptor, SourceError, SourceType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEntryType {
    File,
    Directory,
    Link,
    Other,
}

/// File system metadata of a resolved source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub entry_type: FileEntryType,
    pub accessed: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub changed: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
}

impl FileStat {
    fn from_metadata(metadata: &Metadata) -> Self {
        let entry_type = if metadata.is_file() {
            FileEntryType::File
        } else if metadata.is_dir() {
            FileEntryType::Directory
        } else if metadata.file_type().is_symlink() {
            FileEntryType::Link
        } else {
            FileEntryType::Other
        };

        Self {
            size: metadata.len(),
            entry_type,
            accessed: metadata.accessed().ok().map(system_time_to_utc),
            modified: metadata.modified().ok().map(system_time_to_utc),
            changed: changed_time(metadata),
            created: metadata.created().ok().map(system_time_to_utc),
        }
    }

    /// Earliest known timestamp, preferring creation then change time
    pub fn earliest_known_time(&self) -> Option<DateTime<Utc>> {
        self.created.or(self.changed).or(self.modified)
    }
}

fn system_time_to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

#[cfg(unix)]
fn changed_time(metadata: &Metadata) -> Option<DateTime<Utc>> {
    use std::os::unix::fs::MetadataExt;
    Utc.timestamp_opt(metadata.ctime(), metadata.ctime_nsec() as u32).single()
}

#[cfg(not(unix))]
fn changed_time(_metadata: &Metadata) -> Option<DateTime<Utc>> {
    None
}

fn zip_time_to_utc(time: zip::DateTime) -> Option<DateTime<Utc>> {
    let naive = NaiveDate::from_ymd_opt(time.year().into(), time.month().into(), time.day().into())?
        .and_hms_opt(time.hour().into(), time.minute().into(), time.second().into())?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Readable and seekable content of a source
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

#[derive(Debug, Clone)]
enum SourceContent {
    Path(PathBuf),
    Memory(Arc<Vec<u8>>),
}

/// A source descriptor resolved to readable content plus metadata.
#[derive(Debug, Clone)]
pub struct SourceFile {
    descriptor: SourceDescriptor,
    stat: FileStat,
    content: SourceContent,
}

impl SourceFile {
    pub fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    pub fn stat(&self) -> &FileStat {
        &self.stat
    }

    pub fn display_name(&self) -> String {
        self.descriptor.display_name()
    }

    /// Local path when the source is a plain file system entry
    pub fn local_path(&self) -> Option<&Path> {
        match &self.content {
            SourceContent::Path(path) => Some(path),
            SourceContent::Memory(_) => None,
        }
    }

    /// Open a fresh reader positioned at the start of the content
    pub fn open(&self) -> Result<Box<dyn ReadSeek>, SourceError> {
        match &self.content {
            SourceContent::Path(path) => {
                let file = File::open(path).map_err(|e| SourceError::Io {
                    location: self.display_name(),
                    source: e,
                })?;
                Ok(Box::new(file))
            }
            SourceContent::Memory(data) => Ok(Box::new(Cursor::new(ArcBytes(Arc::clone(data))))),
        }
    }

    /// First line of the content, without the line terminator
    pub fn first_line(&self, max_length: usize) -> Result<Option<String>, SourceError> {
        let reader = self.open()?;
        let mut line = Vec::new();
        BufReader::new(reader.take(max_length as u64))
            .read_until(b'\n', &mut line)
            .map_err(|e| SourceError::Io {
                location: self.display_name(),
                source: e,
            })?;
        if line.is_empty() {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&line);
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

struct ArcBytes(Arc<Vec<u8>>);

impl AsRef<[u8]> for ArcBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Resolve a descriptor, following its nesting chain.
pub fn resolve(descriptor: &SourceDescriptor) -> Result<SourceFile, SourceError> {
    match (descriptor.type_indicator, descriptor.parent.as_deref()) {
        (SourceType::Os, None) => resolve_os(descriptor),
        (SourceType::Zip, Some(parent)) => {
            let archive = resolve(parent)?;
            resolve_zip_member(descriptor, &archive)
        }
        (type_indicator, _) => Err(SourceError::UnsupportedNesting {
            type_indicator,
            location: descriptor.display_name(),
        }),
    }
}

fn resolve_os(descriptor: &SourceDescriptor) -> Result<SourceFile, SourceError> {
    let path = PathBuf::from(&descriptor.location);
    let metadata = fs::metadata(&path).map_err(|e| SourceError::Io {
        location: descriptor.display_name(),
        source: e,
    })?;
    if !metadata.is_file() {
        return Err(SourceError::NotAFile(descriptor.display_name()));
    }

    Ok(SourceFile {
        descriptor: descriptor.clone(),
        stat: FileStat::from_metadata(&metadata),
        content: SourceContent::Path(path),
    })
}

fn resolve_zip_member(descriptor: &SourceDescriptor, archive: &SourceFile) -> Result<SourceFile, SourceError> {
    let archive_error = |source| SourceError::Archive {
        location: archive.display_name(),
        source,
    };

    let mut zip = ZipArchive::new(archive.open()?).map_err(archive_error)?;
    let mut member = zip.by_name(&descriptor.location).map_err(archive_error)?;
    if member.is_dir() {
        return Err(SourceError::NotAFile(descriptor.display_name()));
    }

    // Declared sizes come from the archive and are not trusted
    let declared = usize::try_from(member.size()).unwrap_or(usize::MAX);
    let mut data = Vec::with_capacity(declared.min(HASH_BUFFER_SIZE));
    member.read_to_end(&mut data).map_err(|e| SourceError::Io {
        location: descriptor.display_name(),
        source: e,
    })?;
    debug!("Extracted {} ({} bytes)", descriptor.display_name(), data.len());

    let stat = FileStat {
        size: data.len() as u64,
        entry_type: FileEntryType::File,
        accessed: None,
        modified: zip_time_to_utc(member.last_modified()),
        changed: None,
        created: None,
    };

    Ok(SourceFile {
        descriptor: descriptor.clone(),
        stat,
        content: SourceContent::Memory(Arc::new(data)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_zip_archive;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_os_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.log");
        fs::write(&path, "first line\r\nsecond line\n").unwrap();

        let file = resolve(&SourceDescriptor::os(&path)).unwrap();
        assert_eq!(file.stat().size, 24);
        assert_eq!(file.stat().entry_type, FileEntryType::File);
        assert!(file.stat().modified.is_some());
        assert_eq!(file.local_path(), Some(path.as_path()));
        assert_eq!(file.first_line(1024).unwrap().as_deref(), Some("first line"));
    }

    #[test]
    fn test_resolve_directory_and_missing() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            resolve(&SourceDescriptor::os(temp_dir.path())),
            Err(SourceError::NotAFile(_))
        ));
        assert!(matches!(
            resolve(&SourceDescriptor::os(temp_dir.path().join("missing"))),
            Err(SourceError::Io { .. })
        ));
    }

    #[test]
    fn test_resolve_zip_member() {
        let temp_dir = TempDir::new().unwrap();
        let archive_path = temp_dir.path().join("logs.zip");
        create_zip_archive(&archive_path, &[("var/log/wifi.log", b"hello zip\n")]).unwrap();

        let archive = SourceDescriptor::os(&archive_path);
        let file = resolve(&SourceDescriptor::zip_member(archive.clone(), "var/log/wifi.log")).unwrap();
        assert_eq!(file.stat().size, 10);
        assert!(file.local_path().is_none());

        let mut content = String::new();
        file.open().unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "hello zip\n");

        assert!(matches!(
            resolve(&SourceDescriptor::zip_member(archive, "missing.log")),
            Err(SourceError::Archive { .. })
        ));
    }

    #[test]
    fn test_zip_without_parent_is_rejected() {
        let descriptor = SourceDescriptor {
            type_indicator: SourceType::Zip,
            location: "a.txt".to_string(),
            parent: None,
        };
        assert!(matches!(resolve(&descriptor), Err(SourceError::UnsupportedNesting { .. })));
    }
}
