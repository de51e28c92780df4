//! # rs-timeline
//!
//! A parallel forensic timeline extraction engine with a typed, append-only
//! attribute container store, written in Rust.
//!
//! ## Overview
//!
//! rs-timeline runs many independent extraction routines ("parsers") over a
//! set of sources on a pool of worker threads and funnels everything they
//! produce through a single collector into one durable store file. Every
//! record is an attribute container whose type is registered, with a fixed
//! schema, before extraction starts.
//!
//! ## Features
//!
//! - **Bounded parallel extraction**: at most `maximum_number_of_tasks` tasks
//!   are queued or running at any instant
//! - **Failure isolation**: a broken source becomes a diagnostic container
//!   and a session counter, never a halted run
//! - **Typed store**: containers grouped by type, indexed, CRC-checked and
//!   readable independently of the writing process
//! - **Preprocessing**: operating system, hostname, time zone, users and
//!   year hints gathered once per volume
//! - **Abort support**: stop scheduling, drain, and mark the session aborted
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use rust_timeline::config::EngineConfig;
//! use rust_timeline::containers::Session;
//! use rust_timeline::multi_processing::MultiProcessEngine;
//! use rust_timeline::sources::{enumerate_sources, SourceDescriptor};
//! use rust_timeline::storage::{StoreReader, StoreWriter};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = EngineConfig::default();
//! let engine = MultiProcessEngine::with_defaults(config.clone())?;
//!
//! let root = Path::new("/mnt/evidence");
//! let preprocess = engine.preprocess_sources(&[SourceDescriptor::os(root)]);
//! let sources = enumerate_sources(root, config.expand_archives, &config.skip_paths);
//!
//! let mut session = Session::new();
//! let store = Path::new("/cases/evidence.rtl");
//! let mut writer = StoreWriter::create(&session, store, engine.registry(), config.flush_policy())?;
//! let status = engine.process_sources(
//!     &mut session,
//!     &sources,
//!     &preprocess,
//!     &mut writer,
//!     None,
//!     config.maximum_number_of_tasks,
//! )?;
//! println!("{} containers written", status.containers_written);
//!
//! let reader = StoreReader::open(store, engine.registry())?;
//! for event in reader.get_containers("mac:wifilog:line")? {
//!     println!("{:?}", event?.get("action"));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`containers`]: Attribute containers, schemas, the container registry and the session
//! - [`storage`]: Store file writer and reader
//! - [`sources`]: Source descriptors, resolution and enumeration
//! - [`parsers`]: Extraction routines and parser selection
//! - [`preprocess`]: Per-volume preprocessing plugins
//! - [`multi_processing`]: Task scheduling, workers, collector and engine
//! - [`config`]: Engine configuration
//! - [`utils`]: Hashing and store summaries
//! - [`constants`]: Application-wide constants

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Attribute containers, schemas and the container registry
pub mod containers;

/// Attribute container store
pub mod storage;

/// Source descriptors
pub mod sources;

/// Extraction routines
pub mod parsers;

/// Per-volume preprocessing
pub mod preprocess;

/// Parallel extraction engine
pub mod multi_processing;

/// Utility functions for hashing and summaries
pub mod utils;

/// Configuration management
pub mod config;

/// Application constants and configuration values
pub mod constants;

/// Test utilities and helpers
#[cfg(test)]
pub mod test_utils;
