use chrono::{DateTime, Utc};
use log::debug;

use crate::containers::schema::AttributeKind;
use crate::containers::{AttributeContainer, AttributeValue, ContainerSchema};
use crate::parsers::{Parser, ParserContext, ParserError};
use crate::sources::{FileEntryType, SourceFile};
use crate::utils::hash::{calculate_sha256, sha256_reader};

pub const FILE_STAT_EVENT: &str = "fs:stat";

const FILE_ENTRY_TYPES: &[&str] = &["file", "directory", "link", "other"];

/// Emits one event per file system timestamp of a source.
pub struct FileStatParser {
    hash_max_size_mb: Option<u64>,
}

impl FileStatParser {
    pub fn new(hash_max_size_mb: Option<u64>) -> Self {
        Self { hash_max_size_mb }
    }

    fn hash(&self, file: &SourceFile) -> Result<Option<String>, ParserError> {
        let max_size_mb = match self.hash_max_size_mb {
            Some(max_size_mb) => max_size_mb,
            None => return Ok(None),
        };
        let io_error = |e| ParserError::Io {
            location: file.display_name(),
            source: e,
        };

        match file.local_path() {
            Some(path) => calculate_sha256(path, max_size_mb).map_err(io_error),
            None if file.stat().size > max_size_mb * 1024 * 1024 => Ok(None),
            None => sha256_reader(file.open()?).map(Some).map_err(io_error),
        }
    }
}

fn entry_type_name(entry_type: FileEntryType) -> &'static str {
    match entry_type {
        FileEntryType::File => "file",
        FileEntryType::Directory => "directory",
        FileEntryType::Link => "link",
        FileEntryType::Other => "other",
    }
}

impl Parser for FileStatParser {
    fn name(&self) -> &'static str {
        "filestat"
    }

    fn description(&self) -> &'static str {
        "File system timestamps and size of any file"
    }

    fn container_schemas(&self) -> Vec<ContainerSchema> {
        vec![ContainerSchema::event(FILE_STAT_EVENT)
            .attribute("file_size", AttributeKind::Integer)
            .attribute("file_entry_type", AttributeKind::enumeration(FILE_ENTRY_TYPES))
            .optional("sha256", AttributeKind::String)]
    }

    fn supports(&self, _file: &SourceFile) -> bool {
        true
    }

    fn extract(&self, context: &ParserContext<'_>, file: &SourceFile) -> Result<Vec<AttributeContainer>, ParserError> {
        let stat = file.stat();
        let timestamps: [(Option<DateTime<Utc>>, &str); 4] = [
            (stat.accessed, "Last Access Time"),
            (stat.modified, "Content Modification Time"),
            (stat.changed, "Metadata Modification Time"),
            (stat.created, "Creation Time"),
        ];

        let sha256 = self.hash(file)?;
        let source = file.descriptor().to_string();

        let mut containers = Vec::new();
        for (timestamp, description) in timestamps {
            let timestamp = match timestamp {
                Some(timestamp) => timestamp,
                None => continue,
            };
            let container = AttributeContainer::new(context.registry, FILE_STAT_EVENT)?
                .with("timestamp", AttributeValue::timestamp(timestamp))
                .with("timestamp_desc", AttributeValue::string(description))
                .with("parser", AttributeValue::string(self.name()))
                .with("source", AttributeValue::string(source.as_str()))
                .with("file_size", AttributeValue::Integer(stat.size as i64))
                .with(
                    "file_entry_type",
                    AttributeValue::Enum(entry_type_name(stat.entry_type).to_string()),
                )
                .with_optional("sha256", sha256.clone().map(AttributeValue::String));
            containers.push(container);
        }

        debug!("filestat produced {} events for {}", containers.len(), file.display_name());
        Ok(containers)
    }
}
