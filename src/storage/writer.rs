use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use uuid::Uuid;

use crate::containers::{AttributeContainer, ContainerError, ContainerRegistry, Session};
use crate::storage::error::StoreError;
use crate::storage::format::{
    write_frame, write_index, RecordLocation, StoreFooter, StoreHeader, StreamIndex, INDEX_SEGMENT_LENGTH,
    MAX_RECORD_SIZE,
};
use crate::storage::{FlushPolicy, StorageWriter};

/// Append-only writer for a store file.
///
/// Exactly one writer holds a store file open. Containers are appended in
/// call order; the per-type index, the session record and the footer are
/// written by [`close`](StorageWriter::close).
pub struct StoreWriter {
    path: PathBuf,
    file: Option<BufWriter<File>>,
    registry: Arc<ContainerRegistry>,
    session_identifier: Uuid,
    flush_policy: FlushPolicy,
    offset: u64,
    index: StreamIndex,
    index_segment_length: usize,
    max_record_size: u32,
    unsynced: usize,
    number_of_containers: u64,
}

impl StoreWriter {
    /// Create a new store file bound to `session`.
    ///
    /// The header is written and synced before this returns. Fails with
    /// [`StoreError::AlreadyExists`] rather than overwriting an existing file.
    pub fn create(
        session: &Session,
        path: &Path,
        registry: Arc<ContainerRegistry>,
        flush_policy: FlushPolicy,
    ) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => StoreError::AlreadyExists(path.to_path_buf()),
                _ => StoreError::io("creating store file", path, e),
            })?;

        let mut file = BufWriter::new(file);
        let offset = StoreHeader::new(session.identifier)
            .write(&mut file)
            .map_err(|e| StoreError::io("writing store header", path, e))?;
        file.flush()
            .and_then(|_| file.get_ref().sync_data())
            .map_err(|e| StoreError::io("writing store header", path, e))?;

        info!("Opened store {} for session {}", path.display(), session.identifier);

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            registry,
            session_identifier: session.identifier,
            flush_policy,
            offset,
            index: StreamIndex::new(),
            index_segment_length: INDEX_SEGMENT_LENGTH,
            max_record_size: MAX_RECORD_SIZE,
            unsynced: 0,
            number_of_containers: 0,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_limits(mut self, index_segment_length: usize, max_record_size: u32) -> Self {
        self.index_segment_length = index_segment_length;
        self.max_record_size = max_record_size;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_identifier(&self) -> Uuid {
        self.session_identifier
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    fn sync(file: &mut BufWriter<File>) -> std::io::Result<()> {
        file.flush()?;
        file.get_ref().sync_data()
    }

    fn append(&mut self, container: &AttributeContainer, payload: &[u8]) -> std::io::Result<()> {
        let file = match self.file.as_mut() {
            Some(file) => file,
            None => return Ok(()),
        };

        let offset = self.offset;
        let size = write_frame(file, payload)?;

        self.unsynced += 1;
        let sync_now = match self.flush_policy {
            FlushPolicy::EveryContainer => true,
            FlushPolicy::Batched(batch_size) => self.unsynced >= batch_size,
        };
        if sync_now {
            Self::sync(file)?;
            self.unsynced = 0;
        }

        self.offset += size;
        self.index
            .entry(container.container_type().to_string())
            .or_default()
            .push(RecordLocation {
                offset,
                length: payload.len() as u32,
            });
        self.number_of_containers += 1;
        Ok(())
    }
}

impl StorageWriter for StoreWriter {
    fn add_container(&mut self, container: &AttributeContainer) -> Result<(), StoreError> {
        if self.file.is_none() {
            return Err(StoreError::WriterClosed(self.path.clone()));
        }

        let schema = self.registry.lookup(container.container_type())?;
        schema.validate(container)?;
        let payload = container.encode()?;
        if payload.len() > self.max_record_size as usize {
            return Err(ContainerError::RecordTooLarge {
                container_type: container.container_type().to_string(),
                size: payload.len(),
                limit: self.max_record_size as usize,
            }
            .into());
        }

        if let Err(e) = self.append(container, &payload) {
            // A partially written frame leaves the file unusable for appends
            self.file = None;
            return Err(StoreError::io("appending container", &self.path, e));
        }
        Ok(())
    }

    fn close(&mut self, session: &Session) -> Result<(), StoreError> {
        if session.identifier != self.session_identifier {
            return Err(StoreError::SessionMismatch {
                expected: self.session_identifier,
                found: session.identifier,
            });
        }
        let mut file = self
            .file
            .take()
            .ok_or_else(|| StoreError::WriterClosed(self.path.clone()))?;

        let session_record = serde_json::to_vec(session).map_err(ContainerError::from)?;

        let result = (|| -> std::io::Result<()> {
            let index_offset = self.offset;
            let session_offset = index_offset + write_index(&mut file, &self.index, self.index_segment_length)?;
            write_frame(&mut file, &session_record)?;
            StoreFooter {
                index_offset,
                session_offset,
            }
            .write(&mut file)?;
            file.flush()?;
            file.get_ref().sync_all()
        })();
        result.map_err(|e| StoreError::io("finalizing store", &self.path, e))?;

        debug!(
            "Store index holds {} container types",
            self.index.len()
        );
        info!(
            "Closed store {} with {} containers",
            self.path.display(),
            self.number_of_containers
        );
        Ok(())
    }

    fn number_of_containers(&self) -> u64 {
        self.number_of_containers
    }
}

impl Drop for StoreWriter {
    fn drop(&mut self) {
        if let Some(file) = self.file.as_mut() {
            warn!(
                "Store {} dropped without being closed, it will not be readable",
                self.path.display()
            );
            let _ = file.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::ContainerError;
    use crate::test_utils::{new_event, test_registry};
    use tempfile::TempDir;

    #[test]
    fn test_create_refuses_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("storage.rtl");
        std::fs::write(&path, b"existing").unwrap();

        let result = StoreWriter::create(&Session::new(), &path, test_registry(), FlushPolicy::EveryContainer);
        assert!(matches!(result, Err(StoreError::AlreadyExists(_))));
        assert_eq!(std::fs::read(&path).unwrap(), b"existing");
    }

    #[test]
    fn test_add_after_close_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("storage.rtl");
        let registry = test_registry();
        let session = Session::new();

        let mut writer = StoreWriter::create(&session, &path, Arc::clone(&registry), FlushPolicy::EveryContainer).unwrap();
        writer.add_container(&new_event(&registry, 1)).unwrap();
        writer.close(&session).unwrap();

        assert!(writer.is_closed());
        assert!(matches!(
            writer.add_container(&new_event(&registry, 2)),
            Err(StoreError::WriterClosed(_))
        ));
        assert!(matches!(writer.close(&session), Err(StoreError::WriterClosed(_))));
    }

    #[test]
    fn test_invalid_container_is_rejected_without_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("storage.rtl");
        let registry = test_registry();
        let session = Session::new();

        let mut writer = StoreWriter::create(&session, &path, Arc::clone(&registry), FlushPolicy::Batched(10)).unwrap();
        let mut invalid = new_event(&registry, 1);
        invalid.set("not_in_schema", crate::containers::AttributeValue::Integer(1));

        let result = writer.add_container(&invalid);
        assert!(matches!(result, Err(StoreError::Container(ContainerError::UnknownAttribute { .. }))));
        assert!(!result.unwrap_err().is_fatal());
        assert_eq!(writer.number_of_containers(), 0);

        // Writer is still usable
        writer.add_container(&new_event(&registry, 1)).unwrap();
        writer.close(&session).unwrap();
    }

    #[test]
    fn test_oversized_container_is_rejected_without_closing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("storage.rtl");
        let registry = test_registry();
        let session = Session::new();

        let mut writer = StoreWriter::create(&session, &path, Arc::clone(&registry), FlushPolicy::EveryContainer)
            .unwrap()
            .with_limits(INDEX_SEGMENT_LENGTH, 1024);

        let mut large = new_event(&registry, 1);
        large.set("timestamp_desc", crate::containers::AttributeValue::string("x".repeat(4096)));
        let result = writer.add_container(&large);
        assert!(matches!(
            result,
            Err(StoreError::Container(ContainerError::RecordTooLarge { limit: 1024, .. }))
        ));
        assert!(!result.unwrap_err().is_fatal());
        assert!(!writer.is_closed());

        writer.add_container(&new_event(&registry, 2)).unwrap();
        writer.close(&session).unwrap();

        let reader = crate::storage::StoreReader::open(&path, registry).unwrap();
        assert_eq!(reader.number_of_containers("test:event"), 1);
    }

    #[test]
    fn test_index_larger_than_one_segment() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("storage.rtl");
        let registry = test_registry();
        let session = Session::new();

        let mut writer = StoreWriter::create(&session, &path, Arc::clone(&registry), FlushPolicy::Batched(50))
            .unwrap()
            .with_limits(7, MAX_RECORD_SIZE);
        for i in 0..100 {
            writer.add_container(&new_event(&registry, i)).unwrap();
        }
        writer
            .add_container(&crate::containers::defaults::new_report(&registry, "test", "done").unwrap())
            .unwrap();
        writer.close(&session).unwrap();

        let reader = crate::storage::StoreReader::open(&path, registry).unwrap();
        assert_eq!(reader.number_of_containers("test:event"), 100);
        assert_eq!(reader.number_of_containers("report"), 1);
        let timestamps: Vec<i64> = reader
            .get_containers("test:event")
            .unwrap()
            .map(|c| c.unwrap().timestamp().unwrap())
            .collect();
        assert_eq!(timestamps, (0..100).collect::<Vec<i64>>());
    }

    #[test]
    fn test_close_with_other_session_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("storage.rtl");
        let session = Session::new();
        let mut writer = StoreWriter::create(&session, &path, test_registry(), FlushPolicy::EveryContainer).unwrap();

        assert!(matches!(
            writer.close(&Session::new()),
            Err(StoreError::SessionMismatch { .. })
        ));
        writer.close(&session).unwrap();
    }
}
