//! On-disk layout of the store file.
//!
//! ```text
//! +--------------------------------------------------+
//! | header: "RTLSTORE" | version u32 | session uuid  |
//! +--------------------------------------------------+
//! | frame: len u32 | crc32 u32 | container JSON      |  <- appended in write order,
//! | frame ...                                        |     grouped per type by the index
//! +--------------------------------------------------+
//! | frame: index segment JSON                        |  <- one or more, each holding
//! | frame ...                                        |     a run of one type's locations
//! | frame: session JSON                              |
//! +--------------------------------------------------+
//! | footer: index offset u64 | session offset u64 |  |
//! |         "RTLFOOT1"                               |
//! +--------------------------------------------------+
//! ```
//!
//! All integers are little endian.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{
    STORE_FOOTER_MAGIC as FOOTER_MAGIC, STORE_FORMAT_VERSION as FORMAT_VERSION,
    STORE_HEADER_MAGIC as HEADER_MAGIC,
};

pub use crate::constants::{
    STORE_FOOTER_SIZE as FOOTER_SIZE, STORE_FRAME_PREFIX_SIZE as FRAME_PREFIX_SIZE,
    STORE_HEADER_SIZE as HEADER_SIZE, STORE_INDEX_SEGMENT_LENGTH as INDEX_SEGMENT_LENGTH,
    STORE_MAX_RECORD_SIZE as MAX_RECORD_SIZE,
};

/// Position of one record frame in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLocation {
    pub offset: u64,
    pub length: u32,
}

impl RecordLocation {
    /// Offset one past the end of the frame
    pub fn end(&self) -> u64 {
        self.offset + FRAME_PREFIX_SIZE + u64::from(self.length)
    }
}

/// Per container type list of record locations, in write order
pub type StreamIndex = BTreeMap<String, Vec<RecordLocation>>;

/// A consecutive run of one container type's index entries.
///
/// The index is split into segments so that no single frame grows with the
/// number of containers in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSegment {
    pub container_type: String,
    pub locations: Vec<RecordLocation>,
}

/// Write `index` as segments of at most `segment_length` entries, returning
/// the number of bytes written
pub fn write_index<W: Write>(writer: &mut W, index: &StreamIndex, segment_length: usize) -> std::io::Result<u64> {
    let mut written = 0;
    for (container_type, locations) in index {
        for chunk in locations.chunks(segment_length.max(1)) {
            let segment = IndexSegment {
                container_type: container_type.clone(),
                locations: chunk.to_vec(),
            };
            let payload = serde_json::to_vec(&segment)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            written += write_frame(writer, &payload)?;
        }
    }
    Ok(written)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreHeader {
    pub format_version: u32,
    pub session_identifier: Uuid,
}

impl StoreHeader {
    pub fn new(session_identifier: Uuid) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            session_identifier,
        }
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<u64> {
        writer.write_all(HEADER_MAGIC)?;
        writer.write_all(&self.format_version.to_le_bytes())?;
        writer.write_all(self.session_identifier.as_bytes())?;
        Ok(HEADER_SIZE)
    }

    /// Parse a header, describing what is wrong on failure
    pub fn parse(bytes: &[u8; HEADER_SIZE as usize]) -> Result<Self, String> {
        if &bytes[0..8] != HEADER_MAGIC {
            return Err("missing store header signature".to_string());
        }
        let format_version = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        if format_version != FORMAT_VERSION {
            return Err(format!(
                "unsupported format version {} (expected {})",
                format_version, FORMAT_VERSION
            ));
        }
        let mut identifier = [0u8; 16];
        identifier.copy_from_slice(&bytes[12..28]);
        Ok(Self {
            format_version,
            session_identifier: Uuid::from_bytes(identifier),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreFooter {
    pub index_offset: u64,
    pub session_offset: u64,
}

impl StoreFooter {
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<u64> {
        writer.write_all(&self.index_offset.to_le_bytes())?;
        writer.write_all(&self.session_offset.to_le_bytes())?;
        writer.write_all(FOOTER_MAGIC)?;
        Ok(FOOTER_SIZE)
    }

    pub fn parse(bytes: &[u8; FOOTER_SIZE as usize]) -> Result<Self, String> {
        if &bytes[16..24] != FOOTER_MAGIC {
            return Err("missing store footer, the writer was not closed".to_string());
        }
        let mut index_offset = [0u8; 8];
        index_offset.copy_from_slice(&bytes[0..8]);
        let mut session_offset = [0u8; 8];
        session_offset.copy_from_slice(&bytes[8..16]);
        Ok(Self {
            index_offset: u64::from_le_bytes(index_offset),
            session_offset: u64::from_le_bytes(session_offset),
        })
    }
}

/// Write one length-prefixed, checksummed frame and return its total size
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> std::io::Result<u64> {
    let length = u32::try_from(payload.len())
        .ok()
        .filter(|l| *l <= MAX_RECORD_SIZE)
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("record of {} bytes exceeds the maximum record size", payload.len()),
            )
        })?;

    writer.write_all(&length.to_le_bytes())?;
    writer.write_all(&crc32fast::hash(payload).to_le_bytes())?;
    writer.write_all(payload)?;
    Ok(FRAME_PREFIX_SIZE + u64::from(length))
}

/// Read a frame whose expected payload length is known from the index
pub fn read_frame<R: Read>(reader: &mut R, expected_length: Option<u32>) -> Result<Vec<u8>, FrameError> {
    let mut prefix = [0u8; FRAME_PREFIX_SIZE as usize];
    reader.read_exact(&mut prefix)?;

    let length = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
    let checksum = u32::from_le_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]);

    if let Some(expected) = expected_length {
        if expected != length {
            return Err(FrameError::Invalid(format!(
                "frame length {} does not match indexed length {}",
                length, expected
            )));
        }
    }
    if length > MAX_RECORD_SIZE {
        return Err(FrameError::Invalid(format!("frame length {} is too large", length)));
    }

    let mut payload = vec![0u8; length as usize];
    reader.read_exact(&mut payload)?;

    if crc32fast::hash(&payload) != checksum {
        return Err(FrameError::Invalid("frame checksum mismatch".to_string()));
    }
    Ok(payload)
}

#[derive(Debug)]
pub enum FrameError {
    Io(std::io::Error),
    Invalid(String),
}

impl From<std::io::Error> for FrameError {
    fn from(e: std::io::Error) -> Self {
        FrameError::Io(e)
    }
}
