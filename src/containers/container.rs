use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::containers::error::ContainerError;
use crate::containers::manager::ContainerRegistry;

/// Value of a single container attribute.
///
/// Timestamps are stored as microseconds since the Unix epoch, UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Timestamp(i64),
    Integer(i64),
    Boolean(bool),
    String(String),
    Enum(String),
    Bytes(Vec<u8>),
}

impl AttributeValue {
    pub fn timestamp(datetime: DateTime<Utc>) -> Self {
        AttributeValue::Timestamp(datetime.timestamp_micros())
    }

    pub fn string(value: impl Into<String>) -> Self {
        AttributeValue::String(value.into())
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            AttributeValue::Timestamp(_) => "timestamp",
            AttributeValue::Integer(_) => "integer",
            AttributeValue::Boolean(_) => "boolean",
            AttributeValue::String(_) => "string",
            AttributeValue::Enum(_) => "enum",
            AttributeValue::Bytes(_) => "bytes",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) | AttributeValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Timestamp(v) | AttributeValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            AttributeValue::Timestamp(micros) => Utc.timestamp_micros(*micros).single(),
            _ => None,
        }
    }
}

/// A typed record identified by its container type tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeContainer {
    container_type: String,
    attributes: BTreeMap<String, AttributeValue>,
}

impl AttributeContainer {
    /// Construct an empty container of a registered type.
    ///
    /// Fails with [`ContainerError::NotRegistered`] when the type is unknown to
    /// the registry, before anything can be written.
    pub fn new(registry: &ContainerRegistry, container_type: &str) -> Result<Self, ContainerError> {
        registry.lookup(container_type)?;
        Ok(Self {
            container_type: container_type.to_string(),
            attributes: BTreeMap::new(),
        })
    }

    pub fn container_type(&self) -> &str {
        &self.container_type
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attributes
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn set(&mut self, name: &str, value: AttributeValue) -> &mut Self {
        self.attributes.insert(name.to_string(), value);
        self
    }

    /// Builder form of [`set`](Self::set)
    pub fn with(mut self, name: &str, value: AttributeValue) -> Self {
        self.set(name, value);
        self
    }

    /// Set an attribute only when a value is present
    pub fn with_optional(self, name: &str, value: Option<AttributeValue>) -> Self {
        match value {
            Some(value) => self.with(name, value),
            None => self,
        }
    }

    /// Event timestamp in microseconds, if the container has one
    pub fn timestamp(&self) -> Option<i64> {
        self.get("timestamp").and_then(AttributeValue::as_i64)
    }

    /// Serialize the container into its record representation
    pub fn encode(&self) -> Result<Vec<u8>, ContainerError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize a record, requiring its type to be registered
    pub fn decode(registry: &ContainerRegistry, data: &[u8]) -> Result<Self, ContainerError> {
        let container: AttributeContainer = serde_json::from_slice(data)?;
        registry.lookup(&container.container_type)?;
        Ok(container)
    }
}
