//! Source descriptors: what an extraction task reads from.
//!
//! A [`SourceDescriptor`] names one artifact, optionally nested inside
//! another (a file inside a ZIP archive on the local file system). The engine
//! treats descriptors as opaque, immutable values; only the
//! [`resolver`] opens them.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Source enumeration for the command line front-end
pub mod enumerate;

/// Opening a descriptor as a readable file
pub mod resolver;

pub use enumerate::enumerate_sources;
pub use resolver::{resolve, FileEntryType, FileStat, SourceFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceType {
    /// Path on the local file system
    Os,
    /// Member of the ZIP archive described by the parent
    Zip,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Os => write!(f, "OS"),
            SourceType::Zip => write!(f, "ZIP"),
        }
    }
}

/// Identifies one artifact, including its nesting chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub type_indicator: SourceType,
    pub location: String,
    pub parent: Option<Box<SourceDescriptor>>,
}

impl SourceDescriptor {
    /// A file or directory on the local file system
    pub fn os(path: impl AsRef<Path>) -> Self {
        Self {
            type_indicator: SourceType::Os,
            location: path.as_ref().to_string_lossy().to_string(),
            parent: None,
        }
    }

    /// A member of a ZIP archive
    pub fn zip_member(archive: SourceDescriptor, member: &str) -> Self {
        Self {
            type_indicator: SourceType::Zip,
            location: member.to_string(),
            parent: Some(Box::new(archive)),
        }
    }

    /// Outermost descriptor of the nesting chain
    pub fn root(&self) -> &SourceDescriptor {
        let mut current = self;
        while let Some(parent) = current.parent.as_deref() {
            current = parent;
        }
        current
    }

    /// Local path of the outermost descriptor, the volume it lives on
    pub fn volume_root(&self) -> Option<PathBuf> {
        let root = self.root();
        match root.type_indicator {
            SourceType::Os => Some(PathBuf::from(&root.location)),
            SourceType::Zip => None,
        }
    }

    /// Human readable location, e.g. `/evidence/logs.zip!/var/log/wifi.log`
    pub fn display_name(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{}!/{}", parent.display_name(), self.location.trim_start_matches('/')),
            None => self.location.clone(),
        }
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_indicator, self.display_name())
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error while opening {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read archive {location}: {source}")]
    Archive {
        location: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("{0} is not a regular file")]
    NotAFile(String),

    #[error("{type_indicator} source {location} must be nested inside an OS file")]
    UnsupportedNesting {
        type_indicator: SourceType,
        location: String,
    },
}
