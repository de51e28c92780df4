use thiserror::Error;

/// Errors raised by the container registry and by container validation.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("container type '{0}' is already registered")]
    DuplicateRegistration(String),

    #[error("container type '{0}' is not registered")]
    NotRegistered(String),

    #[error("container type '{container_type}' has no attribute named '{attribute}'")]
    UnknownAttribute {
        container_type: String,
        attribute: String,
    },

    #[error(
        "attribute '{attribute}' of container type '{container_type}' expects {expected}, got {found}"
    )]
    AttributeTypeMismatch {
        container_type: String,
        attribute: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("container type '{container_type}' is missing required attribute '{attribute}'")]
    MissingAttribute {
        container_type: String,
        attribute: String,
    },

    #[error("attribute '{attribute}' of container type '{container_type}' does not allow value '{value}'")]
    InvalidEnumValue {
        container_type: String,
        attribute: String,
        value: String,
    },

    #[error("{container_type} record of {size} bytes exceeds the {limit} byte record limit")]
    RecordTooLarge {
        container_type: String,
        size: usize,
        limit: usize,
    },

    #[error("failed to (de)serialize container record: {0}")]
    Serialization(#[from] serde_json::Error),
}
