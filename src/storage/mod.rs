//! Attribute container store.
//!
//! A store file holds the containers of one session, grouped by container
//! type, plus the finalized session record. It is written by exactly one
//! [`StoreWriter`] and read by any number of [`StoreReader`]s once closed.
//!
//! ## Durability
//!
//! The writer's [`FlushPolicy`] decides when appended records reach the disk:
//!
//! - [`FlushPolicy::EveryContainer`] flushes and syncs each record before
//!   `add_container` returns. A crash loses at most the record being written.
//! - [`FlushPolicy::Batched`] syncs every `n` records. A crash loses up to
//!   `n - 1` acknowledged records.
//!
//! In both cases a store whose writer never reached `close` has no index and
//! is reported as corrupt by the reader.
//!
//! ## Usage Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use rust_timeline::containers::{ContainerRegistry, Session};
//! use rust_timeline::storage::{FlushPolicy, StorageWriter, StoreReader, StoreWriter};
//!
//! # fn example() -> anyhow::Result<()> {
//! let registry = Arc::new(ContainerRegistry::with_default_containers());
//! let session = Session::new();
//! let path = Path::new("/tmp/case.rtl");
//!
//! let mut writer = StoreWriter::create(&session, path, Arc::clone(&registry), FlushPolicy::EveryContainer)?;
//! writer.close(&session)?;
//!
//! let reader = StoreReader::open(path, registry)?;
//! for event in reader.get_containers("event")? {
//!     println!("{:?}", event?.timestamp());
//! }
//! # Ok(())
//! # }
//! ```

use crate::containers::{AttributeContainer, Session};

/// Store errors
pub mod error;

/// Store file layout
pub mod format;

/// In-memory storage writer
pub mod memory;

/// Store file reader
pub mod reader;

/// Store file writer
pub mod writer;

pub use error::StoreError;
pub use memory::MemoryStorageWriter;
pub use reader::{ContainerIter, StoreReader};
pub use writer::StoreWriter;

/// When appended records are synced to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
    EveryContainer,
    Batched(usize),
}

impl Default for FlushPolicy {
    fn default() -> Self {
        FlushPolicy::EveryContainer
    }
}

/// Destination of the collector's writes.
pub trait StorageWriter {
    /// Validate and append a container
    fn add_container(&mut self, container: &AttributeContainer) -> Result<(), StoreError>;

    /// Persist the finalized session and refuse further writes
    fn close(&mut self, session: &Session) -> Result<(), StoreError>;

    fn number_of_containers(&self) -> u64;
}
