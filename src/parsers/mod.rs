//! Extraction routines.
//!
//! Each routine maps one artifact layout to attribute containers. Routines
//! are implementations of the [`Parser`] trait, kept in a [`ParserRegistry`]
//! keyed by name and selected per run with a parser filter expression.
//!
//! ## Parsers
//!
//! - **filestat**: file system timestamps of any file
//! - **macwifi**: Mac OS X `wifi.log` lines

use thiserror::Error;
use uuid::Uuid;

use crate::containers::{AttributeContainer, ContainerError, ContainerRegistry, ContainerSchema, PreprocessObject};
use crate::multi_processing::abort::AbortSignal;
use crate::sources::{SourceError, SourceFile};

/// File system metadata parser
pub mod filestat;

/// Mac OS X wifi.log parser
pub mod mac_wifi;

/// Parser registry and filter expressions
pub mod manager;

pub use manager::{ParserFilterError, ParserRegistry};

/// Routine-local extraction failure.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("I/O error while reading {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed data in {location}: {reason}")]
    Malformed { location: String, reason: String },

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("extraction aborted")]
    Aborted,
}

/// What an extraction routine may consult while running a task.
pub struct ParserContext<'a> {
    pub registry: &'a ContainerRegistry,
    pub preprocess: &'a PreprocessObject,
    pub session_identifier: Uuid,
    pub task_identifier: Uuid,
    abort: &'a AbortSignal,
}

impl<'a> ParserContext<'a> {
    pub fn new(
        registry: &'a ContainerRegistry,
        preprocess: &'a PreprocessObject,
        session_identifier: Uuid,
        task_identifier: Uuid,
        abort: &'a AbortSignal,
    ) -> Self {
        Self {
            registry,
            preprocess,
            session_identifier,
            task_identifier,
            abort,
        }
    }

    /// Long running routines poll this between records
    pub fn is_aborted(&self) -> bool {
        self.abort.is_aborted()
    }
}

/// Capability interface of an extraction routine.
pub trait Parser: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Schemas of every container type this routine may emit
    fn container_schemas(&self) -> Vec<ContainerSchema>;

    /// Signature check deciding whether the routine applies to a source
    fn supports(&self, file: &SourceFile) -> bool;

    /// Extract containers, in the order the artifact yields them
    fn extract(&self, context: &ParserContext<'_>, file: &SourceFile) -> Result<Vec<AttributeContainer>, ParserError>;
}
