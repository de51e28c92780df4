//! Built-in container types shared by the engine and every extraction routine.

use chrono::Utc;

use crate::containers::container::{AttributeContainer, AttributeValue};
use crate::containers::error::ContainerError;
use crate::containers::manager::ContainerRegistry;
use crate::containers::schema::{AttributeKind, ContainerSchema};

pub const EVENT: &str = "event";
pub const PREPROCESS: &str = "preprocess";
pub const REPORT: &str = "report";
pub const EXTRACTION_ERROR: &str = "extraction_error";

pub const OPERATING_SYSTEMS: &[&str] = &["Windows", "MacOS", "Linux", "Unknown"];

pub(crate) fn default_schemas() -> Vec<ContainerSchema> {
    vec![
        ContainerSchema::event(EVENT)
            .optional("data_type", AttributeKind::String)
            .optional("message", AttributeKind::String),
        ContainerSchema::new(PREPROCESS)
            .optional("hostname", AttributeKind::String)
            .optional("operating_system", AttributeKind::enumeration(OPERATING_SYSTEMS))
            .optional("time_zone", AttributeKind::String)
            .optional("year", AttributeKind::Integer)
            .optional("users", AttributeKind::String)
            .optional("volumes", AttributeKind::String)
            .attribute("warnings", AttributeKind::Integer),
        ContainerSchema::new(REPORT)
            .attribute("plugin_name", AttributeKind::String)
            .attribute("text", AttributeKind::String)
            .attribute("time_compiled", AttributeKind::Timestamp),
        ContainerSchema::new(EXTRACTION_ERROR)
            .attribute("task_identifier", AttributeKind::String)
            .attribute("source", AttributeKind::String)
            .attribute("message", AttributeKind::String)
            .attribute("time", AttributeKind::Timestamp)
            .optional("parser", AttributeKind::String),
    ]
}

/// Build a `report` container compiled now
pub fn new_report(
    registry: &ContainerRegistry,
    plugin_name: &str,
    text: &str,
) -> Result<AttributeContainer, ContainerError> {
    Ok(AttributeContainer::new(registry, REPORT)?
        .with("plugin_name", AttributeValue::string(plugin_name))
        .with("text", AttributeValue::string(text))
        .with("time_compiled", AttributeValue::timestamp(Utc::now())))
}

/// Build the diagnostic container recorded for a failed task
pub fn new_extraction_error(
    registry: &ContainerRegistry,
    task_identifier: &str,
    source: &str,
    parser: Option<&str>,
    message: &str,
) -> Result<AttributeContainer, ContainerError> {
    Ok(AttributeContainer::new(registry, EXTRACTION_ERROR)?
        .with("task_identifier", AttributeValue::string(task_identifier))
        .with("source", AttributeValue::string(source))
        .with("message", AttributeValue::string(message))
        .with("time", AttributeValue::timestamp(Utc::now()))
        .with_optional("parser", parser.map(AttributeValue::string)))
}
