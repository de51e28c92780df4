use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

use crate::containers::{AttributeContainer, ContainerRegistry, Session};
use crate::storage::error::StoreError;
use crate::storage::format::{
    read_frame, FrameError, IndexSegment, RecordLocation, StoreFooter, StoreHeader, StreamIndex, FOOTER_SIZE,
    FRAME_PREFIX_SIZE, HEADER_SIZE,
};

/// Reader for a closed store file.
///
/// Opening validates the header, footer, index and session record; container
/// records are read lazily and their checksums verified on access.
#[derive(Debug)]
pub struct StoreReader {
    path: PathBuf,
    registry: Arc<ContainerRegistry>,
    header: StoreHeader,
    index: StreamIndex,
    session: Session,
}

impl StoreReader {
    pub fn open(path: &Path, registry: Arc<ContainerRegistry>) -> Result<Self, StoreError> {
        let mut file = File::open(path).map_err(|e| StoreError::io("opening store file", path, e))?;
        let file_size = file
            .metadata()
            .map_err(|e| StoreError::io("reading store metadata", path, e))?
            .len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(StoreError::corrupt(path, format!("file too small ({} bytes)", file_size)));
        }

        let mut header_bytes = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header_bytes)
            .map_err(|e| StoreError::io("reading store header", path, e))?;
        let header = StoreHeader::parse(&header_bytes).map_err(|reason| StoreError::corrupt(path, reason))?;

        let mut footer_bytes = [0u8; FOOTER_SIZE as usize];
        file.seek(SeekFrom::Start(file_size - FOOTER_SIZE))
            .and_then(|_| file.read_exact(&mut footer_bytes))
            .map_err(|e| StoreError::io("reading store footer", path, e))?;
        let footer = StoreFooter::parse(&footer_bytes).map_err(|reason| StoreError::corrupt(path, reason))?;

        let trailer_end = file_size - FOOTER_SIZE;
        if footer.index_offset < HEADER_SIZE
            || footer.session_offset < footer.index_offset
            || footer.session_offset >= trailer_end
        {
            return Err(StoreError::corrupt(path, "footer offsets out of range"));
        }

        let index = read_index(&mut file, path, footer.index_offset, footer.session_offset)?;

        for (container_type, locations) in &index {
            if let Some(bad) = locations
                .iter()
                .find(|l| l.offset < HEADER_SIZE || l.end() > footer.index_offset)
            {
                return Err(StoreError::corrupt(
                    path,
                    format!("index entry for {} at offset {} is out of range", container_type, bad.offset),
                ));
            }
        }

        let session_payload = read_frame_at(&mut file, path, footer.session_offset, None)?;
        let session: Session = serde_json::from_slice(&session_payload)
            .map_err(|e| StoreError::corrupt(path, format!("unreadable session record: {}", e)))?;

        if session.identifier != header.session_identifier {
            return Err(StoreError::corrupt(
                path,
                format!(
                    "session record {} does not match header session {}",
                    session.identifier, header.session_identifier
                ),
            ));
        }

        debug!(
            "Opened store {} with {} container types",
            path.display(),
            index.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            registry,
            header,
            index,
            session,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format_version(&self) -> u32 {
        self.header.format_version
    }

    /// The persisted session record
    pub fn get_session(&self) -> &Session {
        &self.session
    }

    /// Container types present in the store, sorted
    pub fn container_types(&self) -> Vec<&str> {
        self.index.keys().map(String::as_str).collect()
    }

    pub fn number_of_containers(&self, container_type: &str) -> usize {
        self.index.get(container_type).map_or(0, Vec::len)
    }

    /// Lazily iterate the containers of one type in write order.
    ///
    /// Every call starts a fresh pass over the stream. Unknown types yield an
    /// empty sequence.
    pub fn get_containers(&self, container_type: &str) -> Result<ContainerIter<'_>, StoreError> {
        let file = File::open(&self.path).map_err(|e| StoreError::io("opening store file", &self.path, e))?;
        let locations = self
            .index
            .get(container_type)
            .map(Vec::as_slice)
            .unwrap_or_default();

        Ok(ContainerIter {
            reader: self,
            file: BufReader::new(file),
            locations: locations.iter(),
        })
    }

    /// Random access by container type and sequence number
    pub fn get_container(&self, container_type: &str, sequence_number: usize) -> Result<Option<AttributeContainer>, StoreError> {
        let location = match self.index.get(container_type).and_then(|l| l.get(sequence_number)) {
            Some(location) => *location,
            None => return Ok(None),
        };
        let mut file = File::open(&self.path).map_err(|e| StoreError::io("opening store file", &self.path, e))?;
        self.read_container(&mut file, location).map(Some)
    }

    fn read_container<R: Read + Seek>(&self, file: &mut R, location: RecordLocation) -> Result<AttributeContainer, StoreError> {
        let payload = read_frame_at(file, &self.path, location.offset, Some(location.length))?;
        Ok(AttributeContainer::decode(&self.registry, &payload)?)
    }
}

/// Read the index segments lying between the index and session offsets
fn read_index<R: Read + Seek>(file: &mut R, path: &Path, start: u64, end: u64) -> Result<StreamIndex, StoreError> {
    let mut index = StreamIndex::new();
    let mut offset = start;

    while offset < end {
        let payload = read_frame_at(file, path, offset, None)?;
        offset += FRAME_PREFIX_SIZE + payload.len() as u64;
        if offset > end {
            return Err(StoreError::corrupt(path, "index segment overlaps the session record"));
        }

        let segment: IndexSegment = serde_json::from_slice(&payload)
            .map_err(|e| StoreError::corrupt(path, format!("unreadable index segment: {}", e)))?;
        index
            .entry(segment.container_type)
            .or_default()
            .extend(segment.locations);
    }
    Ok(index)
}

fn read_frame_at<R: Read + Seek>(
    file: &mut R,
    path: &Path,
    offset: u64,
    expected_length: Option<u32>,
) -> Result<Vec<u8>, StoreError> {
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| StoreError::io("seeking store record", path, e))?;
    read_frame(file, expected_length).map_err(|e| match e {
        FrameError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            StoreError::corrupt(path, format!("truncated record at offset {}", offset))
        }
        FrameError::Io(e) => StoreError::io("reading store record", path, e),
        FrameError::Invalid(reason) => StoreError::corrupt(path, format!("{} at offset {}", reason, offset)),
    })
}

/// Lazy sequence of the containers of one type
pub struct ContainerIter<'a> {
    reader: &'a StoreReader,
    file: BufReader<File>,
    locations: std::slice::Iter<'a, RecordLocation>,
}

impl Iterator for ContainerIter<'_> {
    type Item = Result<AttributeContainer, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        let location = *self.locations.next()?;
        Some(self.reader.read_container(&mut self.file, location))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.locations.size_hint()
    }
}
