//! Test utilities for rs-timeline
//!
//! This module provides common testing utilities, fixtures and test parsers
//! for use across all test modules.

#![cfg(test)]

use anyhow::Result;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::{NamedTempFile, TempDir};
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::containers::schema::AttributeKind;
use crate::containers::{AttributeContainer, AttributeValue, ContainerRegistry, ContainerSchema};
use crate::parsers::{Parser, ParserContext, ParserError};
use crate::sources::SourceFile;

/// Container type registered by [`test_registry`]
pub const TEST_EVENT: &str = "test:event";

/// A Mac OS X wifi.log excerpt crossing a year boundary.
///
/// Yields four events; the last line carries an impossible date.
pub const WIFI_LOG: &str = "Thu Nov 14 20:36:37.222 ***Starting Up***
Thu Nov 14 20:36:43.818 <airportd[88]> airportdProcessDLILEvent: en0 attached (up)
Thu Nov 14 20:36:44.409 <airportd[88]> _doAutoJoin: Already associated to \u{201c}CampusNet\u{201d}. Bailing on auto-join.
Tue Dec 31 23:59:38.165 <airportd[88]> _processSystemPSKAssoc: No password for network <CWNetwork: 0x7fdfe970b250> [ssid=AndroidAP, bssid=88:30:8a:7a:61:88, security=WPA2 Personal, rssi=-25, channel=<CWChannel: 0x7fdfe9712870> [channelNumber=1(2GHz), channelWidth={20MHz}], ibss=0] in the system keychain
Wed Jan  1 00:00:01.000 <kernel> en0: link up
Fri Feb 30 10:00:00.000 <kernel> en0: invalid day
";

/// Creates a temporary directory that is automatically cleaned up
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a temporary file with the given content
pub fn create_temp_file(content: &[u8]) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content)?;
    file.flush()?;
    Ok(file)
}

/// Creates a test file structure in a temporary directory
pub fn create_test_file_structure() -> Result<TempDir> {
    let temp_dir = create_temp_dir()?;
    let base_path = temp_dir.path();

    // Create directory structure
    fs::create_dir_all(base_path.join("dir1/subdir1"))?;
    fs::create_dir_all(base_path.join("dir2"))?;

    // Create test files
    fs::write(base_path.join("file1.txt"), b"Test content 1")?;
    fs::write(base_path.join("file2.log"), b"Test log content")?;
    fs::write(base_path.join("dir1/file3.txt"), b"Test content 3")?;
    fs::write(base_path.join("dir1/subdir1/file4.txt"), b"Test content 4")?;
    fs::write(base_path.join("dir2/file5.log"), b"Another log file")?;

    Ok(temp_dir)
}

/// Creates a ZIP archive holding the given (name, content) members
pub fn create_zip_archive(path: &Path, members: &[(&str, &[u8])]) -> Result<()> {
    let mut zip = ZipWriter::new(File::create(path)?);
    for (name, content) in members {
        zip.start_file(*name, FileOptions::default())?;
        zip.write_all(content)?;
    }
    zip.finish()?;
    Ok(())
}

/// A non-event schema with one attribute of every kind
pub fn test_schema() -> ContainerSchema {
    ContainerSchema::new("test:container")
        .attribute("name", AttributeKind::String)
        .optional("count", AttributeKind::Integer)
        .optional("flag", AttributeKind::Boolean)
        .optional("seen", AttributeKind::Timestamp)
        .optional("state", AttributeKind::enumeration(&["new", "old"]))
        .optional("data", AttributeKind::Bytes)
}

/// Registry with the default container types plus [`TEST_EVENT`]
pub fn test_registry() -> Arc<ContainerRegistry> {
    let registry = ContainerRegistry::with_default_containers();
    registry
        .register(ContainerSchema::event(TEST_EVENT))
        .expect("test event type registers once");
    Arc::new(registry)
}

/// A [`TEST_EVENT`] container at `timestamp` microseconds
pub fn new_event(registry: &ContainerRegistry, timestamp: i64) -> AttributeContainer {
    AttributeContainer::new(registry, TEST_EVENT)
        .expect("test event type is registered")
        .with("timestamp", AttributeValue::Timestamp(timestamp))
        .with("timestamp_desc", AttributeValue::string("Test Time"))
        .with("parser", AttributeValue::string("test"))
        .with("source", AttributeValue::string("OS:/evidence/test.log"))
}

/// Parser that panics on every source
pub struct PanickingParser;

impl Parser for PanickingParser {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn description(&self) -> &'static str {
        "Panics during extraction"
    }

    fn container_schemas(&self) -> Vec<ContainerSchema> {
        Vec::new()
    }

    fn supports(&self, _file: &SourceFile) -> bool {
        true
    }

    fn extract(&self, _context: &ParserContext<'_>, file: &SourceFile) -> Result<Vec<AttributeContainer>, ParserError> {
        panic!("cannot handle {}", file.display_name());
    }
}

/// Parser that spends a fixed time on every source, stopping early on abort
pub struct SlowParser {
    duration: Duration,
}

impl SlowParser {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl Parser for SlowParser {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn description(&self) -> &'static str {
        "Sleeps before producing nothing"
    }

    fn container_schemas(&self) -> Vec<ContainerSchema> {
        Vec::new()
    }

    fn supports(&self, _file: &SourceFile) -> bool {
        true
    }

    fn extract(&self, context: &ParserContext<'_>, _file: &SourceFile) -> Result<Vec<AttributeContainer>, ParserError> {
        let start = Instant::now();
        while start.elapsed() < self.duration {
            if context.is_aborted() {
                return Err(ParserError::Aborted);
            }
            thread::sleep(Duration::from_millis(10));
        }
        Ok(Vec::new())
    }
}

/// Parser that records the order sources reach it and emits
/// `test:recorded` events at out-of-order timestamps
pub struct RecordingParser {
    claimed: Arc<Mutex<Vec<String>>>,
}

impl RecordingParser {
    pub const TIMESTAMPS: [i64; 3] = [3, 1, 2];

    pub fn new(claimed: Arc<Mutex<Vec<String>>>) -> Self {
        Self { claimed }
    }
}

impl Parser for RecordingParser {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn description(&self) -> &'static str {
        "Records source order"
    }

    fn container_schemas(&self) -> Vec<ContainerSchema> {
        vec![ContainerSchema::event("test:recorded")]
    }

    fn supports(&self, _file: &SourceFile) -> bool {
        true
    }

    fn extract(&self, context: &ParserContext<'_>, file: &SourceFile) -> Result<Vec<AttributeContainer>, ParserError> {
        let source = file.display_name();
        self.claimed.lock().unwrap().push(source.clone());

        Self::TIMESTAMPS
            .iter()
            .map(|timestamp| {
                Ok(AttributeContainer::new(context.registry, "test:recorded")?
                    .with("timestamp", AttributeValue::Timestamp(*timestamp))
                    .with("timestamp_desc", AttributeValue::string("Recorded"))
                    .with("parser", AttributeValue::string("recording"))
                    .with("source", AttributeValue::string(&source)))
            })
            .collect()
    }
}
