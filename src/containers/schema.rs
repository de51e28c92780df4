use crate::containers::container::{AttributeContainer, AttributeValue};
use crate::containers::error::ContainerError;

/// Semantic type of a container attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeKind {
    Timestamp,
    Integer,
    Boolean,
    String,
    /// String restricted to a fixed set of values
    Enum(Vec<String>),
    Bytes,
}

impl AttributeKind {
    /// Build an enum kind from a list of allowed values
    pub fn enumeration(values: &[&str]) -> Self {
        AttributeKind::Enum(values.iter().map(|v| v.to_string()).collect())
    }

    pub fn name(&self) -> &'static str {
        match self {
            AttributeKind::Timestamp => "timestamp",
            AttributeKind::Integer => "integer",
            AttributeKind::Boolean => "boolean",
            AttributeKind::String => "string",
            AttributeKind::Enum(_) => "enum",
            AttributeKind::Bytes => "bytes",
        }
    }

    fn accepts(&self, value: &AttributeValue) -> bool {
        matches!(
            (self, value),
            (AttributeKind::Timestamp, AttributeValue::Timestamp(_))
                | (AttributeKind::Integer, AttributeValue::Integer(_))
                | (AttributeKind::Boolean, AttributeValue::Boolean(_))
                | (AttributeKind::String, AttributeValue::String(_))
                | (AttributeKind::Enum(_), AttributeValue::Enum(_))
                | (AttributeKind::Bytes, AttributeValue::Bytes(_))
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDefinition {
    pub name: String,
    pub kind: AttributeKind,
    pub required: bool,
}

/// Fixed attribute schema of one container type.
///
/// Schemas are installed in the [`ContainerRegistry`](crate::containers::ContainerRegistry)
/// and every container is validated against its schema before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSchema {
    container_type: String,
    attributes: Vec<AttributeDefinition>,
    timeline_event: bool,
}

impl ContainerSchema {
    /// Create an empty schema for a non-event container type
    pub fn new(container_type: &str) -> Self {
        Self {
            container_type: container_type.to_string(),
            attributes: Vec::new(),
            timeline_event: false,
        }
    }

    /// Create a schema for a timeline event type.
    ///
    /// Every event carries `timestamp`, `timestamp_desc`, `parser` and `source`;
    /// extractor specific attributes are added on top.
    pub fn event(container_type: &str) -> Self {
        let mut schema = Self::new(container_type)
            .attribute("timestamp", AttributeKind::Timestamp)
            .attribute("timestamp_desc", AttributeKind::String)
            .attribute("parser", AttributeKind::String)
            .attribute("source", AttributeKind::String);
        schema.timeline_event = true;
        schema
    }

    /// Add a required attribute
    pub fn attribute(mut self, name: &str, kind: AttributeKind) -> Self {
        self.push(name, kind, true);
        self
    }

    /// Add an optional attribute
    pub fn optional(mut self, name: &str, kind: AttributeKind) -> Self {
        self.push(name, kind, false);
        self
    }

    fn push(&mut self, name: &str, kind: AttributeKind, required: bool) {
        // Later definitions replace earlier ones with the same name
        self.attributes.retain(|a| a.name != name);
        self.attributes.push(AttributeDefinition {
            name: name.to_string(),
            kind,
            required,
        });
    }

    pub fn container_type(&self) -> &str {
        &self.container_type
    }

    pub fn attributes(&self) -> &[AttributeDefinition] {
        &self.attributes
    }

    pub fn definition(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Whether containers of this type are timeline events
    pub fn is_timeline_event(&self) -> bool {
        self.timeline_event
    }

    /// Check a container against this schema
    pub fn validate(&self, container: &AttributeContainer) -> Result<(), ContainerError> {
        if container.container_type() != self.container_type {
            return Err(ContainerError::NotRegistered(
                container.container_type().to_string(),
            ));
        }

        for (name, value) in container.attributes() {
            let definition = self.definition(name).ok_or_else(|| ContainerError::UnknownAttribute {
                container_type: self.container_type.clone(),
                attribute: name.clone(),
            })?;

            if !definition.kind.accepts(value) {
                return Err(ContainerError::AttributeTypeMismatch {
                    container_type: self.container_type.clone(),
                    attribute: name.clone(),
                    expected: definition.kind.name(),
                    found: value.kind_name(),
                });
            }

            if let (AttributeKind::Enum(allowed), AttributeValue::Enum(v)) = (&definition.kind, value) {
                if !allowed.iter().any(|a| a == v) {
                    return Err(ContainerError::InvalidEnumValue {
                        container_type: self.container_type.clone(),
                        attribute: name.clone(),
                        value: v.clone(),
                    });
                }
            }
        }

        if let Some(missing) = self
            .attributes
            .iter()
            .find(|a| a.required && container.get(&a.name).is_none())
        {
            return Err(ContainerError::MissingAttribute {
                container_type: self.container_type.clone(),
                attribute: missing.name.clone(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::ContainerRegistry;

    fn registry_with(schema: ContainerSchema) -> ContainerRegistry {
        let registry = ContainerRegistry::new();
        registry.register(schema).unwrap();
        registry
    }

    #[test]
    fn test_event_schema_has_common_attributes() {
        let schema = ContainerSchema::event("test:event");
        assert!(schema.is_timeline_event());
        for name in ["timestamp", "timestamp_desc", "parser", "source"] {
            assert!(schema.definition(name).unwrap().required, "{} should be required", name);
        }
    }

    #[test]
    fn test_redefining_attribute_replaces_it() {
        let schema = ContainerSchema::new("test")
            .attribute("value", AttributeKind::String)
            .optional("value", AttributeKind::Integer);
        assert_eq!(schema.attributes().len(), 1);
        assert_eq!(schema.definition("value").unwrap().kind, AttributeKind::Integer);
    }

    #[test]
    fn test_validate_rejects_unknown_and_mismatched_attributes() {
        let schema = ContainerSchema::new("test").attribute("count", AttributeKind::Integer);
        let registry = registry_with(schema.clone());

        let unknown = AttributeContainer::new(&registry, "test")
            .unwrap()
            .with("count", AttributeValue::Integer(1))
            .with("bogus", AttributeValue::Boolean(true));
        assert!(matches!(
            schema.validate(&unknown),
            Err(ContainerError::UnknownAttribute { .. })
        ));

        let mismatched = AttributeContainer::new(&registry, "test")
            .unwrap()
            .with("count", AttributeValue::String("one".to_string()));
        assert!(matches!(
            schema.validate(&mismatched),
            Err(ContainerError::AttributeTypeMismatch { expected: "integer", found: "string", .. })
        ));
    }

    #[test]
    fn test_validate_missing_required_and_enum_values() {
        let schema = ContainerSchema::new("test")
            .attribute("state", AttributeKind::enumeration(&["on", "off"]))
            .optional("note", AttributeKind::String);
        let registry = registry_with(schema.clone());

        let missing = AttributeContainer::new(&registry, "test").unwrap();
        assert!(matches!(
            schema.validate(&missing),
            Err(ContainerError::MissingAttribute { .. })
        ));

        let invalid = AttributeContainer::new(&registry, "test")
            .unwrap()
            .with("state", AttributeValue::Enum("maybe".to_string()));
        assert!(matches!(
            schema.validate(&invalid),
            Err(ContainerError::InvalidEnumValue { .. })
        ));

        let valid = AttributeContainer::new(&registry, "test")
            .unwrap()
            .with("state", AttributeValue::Enum("on".to_string()));
        assert!(schema.validate(&valid).is_ok());
    }
}
