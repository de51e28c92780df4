//! Integration tests for end-to-end extraction.
//!
//! These tests drive the engine the way the command line front-end does:
//! enumerate sources, preprocess the volume, process into a store file and
//! read the result back.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::Result;
use tempfile::TempDir;

use rust_timeline::config::EngineConfig;
use rust_timeline::containers::{PreprocessObject, Session, SessionStatus};
use rust_timeline::multi_processing::MultiProcessEngine;
use rust_timeline::sources::{enumerate_sources, SourceDescriptor};
use rust_timeline::storage::{MemoryStorageWriter, StoreReader, StoreWriter};

const WIFI_LOG: &str = "Thu Nov 14 20:36:37.222 ***Starting Up***
Thu Nov 14 20:36:43.818 <airportd[88]> airportdProcessDLILEvent: en0 attached (up)
Thu Nov 14 20:36:44.409 <airportd[88]> _doAutoJoin: Already associated to \u{201c}CampusNet\u{201d}. Bailing on auto-join.
Wed Jan  1 00:00:01.000 <kernel> en0: link up
";

/// A small macOS-like volume with five log files
fn create_volume() -> Result<TempDir> {
    let temp_dir = TempDir::new()?;
    let root = temp_dir.path();
    fs::create_dir_all(root.join("private/etc"))?;
    fs::create_dir_all(root.join("private/var/log"))?;
    fs::create_dir_all(root.join("Users/alice"))?;
    fs::write(root.join("private/etc/hostname"), "forensics-mac\n")?;
    for i in 0..5 {
        fs::write(root.join(format!("private/var/log/wifi_{}.log", i)), WIFI_LOG)?;
    }
    Ok(temp_dir)
}

fn log_sources(root: &Path) -> Vec<SourceDescriptor> {
    enumerate_sources(&root.join("private/var/log"), false, &[])
}

#[test]
fn test_extract_volume_to_store() -> Result<()> {
    let volume = create_volume()?;
    let output = TempDir::new()?;
    let store = output.path().join("case.rtl");

    let engine = MultiProcessEngine::with_defaults(EngineConfig::default())?;
    let preprocess = engine.preprocess_sources(&[SourceDescriptor::os(volume.path())]);
    assert_eq!(preprocess.hostname.as_deref(), Some("forensics-mac"));

    let sources = log_sources(volume.path());
    assert_eq!(sources.len(), 5);

    let mut session = Session::new().with_label("integration");
    let session_identifier = session.identifier;
    let mut writer = StoreWriter::create(&session, &store, engine.registry(), EngineConfig::default().flush_policy())?;
    let status = engine.process_sources(&mut session, &sources, &preprocess, &mut writer, Some("macwifi"), 2)?;

    assert_eq!(status.tasks_completed, 5);
    assert_eq!(status.tasks_failed, 0);
    assert_eq!(session.status, SessionStatus::Completed);

    let reader = StoreReader::open(&store, engine.registry())?;
    assert_eq!(reader.get_session().identifier, session_identifier);
    assert_eq!(reader.get_session().label.as_deref(), Some("integration"));
    assert_eq!(reader.get_session().status, SessionStatus::Completed);
    assert_eq!(reader.number_of_containers("mac:wifilog:line"), 15);
    assert_eq!(reader.number_of_containers("preprocess"), 1);
    assert_eq!(reader.number_of_containers("report"), 1);

    let written: u64 = reader
        .container_types()
        .iter()
        .map(|t| reader.number_of_containers(t) as u64)
        .sum();
    assert_eq!(written, status.containers_written);
    Ok(())
}

/// Five sources with a bound of two never exceed two outstanding tasks
#[test]
fn test_bounded_outstanding_tasks() -> Result<()> {
    let volume = create_volume()?;
    let sources = log_sources(volume.path());

    let engine = MultiProcessEngine::with_defaults(EngineConfig {
        number_of_workers: Some(4),
        ..EngineConfig::default()
    })?;
    let mut session = Session::new();
    let mut writer = MemoryStorageWriter::new(engine.registry());

    let status = engine.process_sources(&mut session, &sources, &PreprocessObject::new(), &mut writer, None, 2)?;

    assert_eq!(status.tasks_scheduled, 5);
    assert!(status.peak_outstanding_tasks >= 1);
    assert!(status.peak_outstanding_tasks <= 2);
    assert_eq!(status.tasks_completed + status.tasks_failed + status.tasks_abandoned, 5);
    assert_eq!(status.tasks_completed, 5);
    Ok(())
}

/// One failing source among six does not keep the others out of the store
#[test]
fn test_failing_source_among_many() -> Result<()> {
    let volume = create_volume()?;
    let mut sources = log_sources(volume.path());
    sources.insert(3, SourceDescriptor::os(volume.path().join("private/var/log/rotated.log")));

    let engine = MultiProcessEngine::with_defaults(EngineConfig::default())?;
    let mut session = Session::new();
    let mut writer = MemoryStorageWriter::new(engine.registry());

    let status = engine.process_sources(&mut session, &sources, &PreprocessObject::new(), &mut writer, Some("macwifi"), 3)?;

    assert_eq!(status.tasks_failed, 1);
    assert_eq!(status.tasks_completed, 5);
    assert_eq!(session.counters.errors, status.tasks_failed as u64);
    assert_eq!(writer.containers_of_type("extraction_error").count(), 1);

    let sources_with_events: BTreeSet<&str> = writer
        .containers_of_type("mac:wifilog:line")
        .filter_map(|c| c.get("source").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(sources_with_events.len(), 5);
    assert_eq!(writer.containers_of_type("mac:wifilog:line").count(), 15);
    Ok(())
}

#[test]
fn test_archive_members_are_extracted() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let archive = temp_dir.path().join("logs.zip");
    {
        use std::io::Write;
        let mut zip = zip::ZipWriter::new(fs::File::create(&archive)?);
        zip.start_file("var/log/wifi.log", zip::write::FileOptions::default())?;
        zip.write_all(WIFI_LOG.as_bytes())?;
        zip.finish()?;
    }

    let sources = enumerate_sources(temp_dir.path(), true, &[]);
    assert_eq!(sources.len(), 2);

    let engine = MultiProcessEngine::with_defaults(EngineConfig::default())?;
    let mut session = Session::new();
    let mut writer = MemoryStorageWriter::new(engine.registry());
    let status = engine.process_sources(&mut session, &sources, &PreprocessObject::new(), &mut writer, Some("macwifi"), 4)?;

    assert_eq!(status.tasks_completed, 2);
    let events: Vec<_> = writer.containers_of_type("mac:wifilog:line").collect();
    assert_eq!(events.len(), 3);
    assert!(events
        .iter()
        .all(|e| e.get("source").and_then(|v| v.as_str()).map_or(false, |s| s.starts_with("ZIP:"))));
    Ok(())
}
