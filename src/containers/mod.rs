//! Attribute containers and the registry that types them.
//!
//! Every record the engine persists is an [`AttributeContainer`]: a container
//! type tag plus a map of typed attribute values. The tag must be registered
//! in the [`ContainerRegistry`] before a container of that type can be built,
//! written or read back.
//!
//! ## Usage Example
//!
//! ```no_run
//! use rust_timeline::containers::{
//!     AttributeContainer, AttributeKind, AttributeValue, ContainerRegistry, ContainerSchema,
//! };
//!
//! # fn example() -> anyhow::Result<()> {
//! let registry = ContainerRegistry::with_default_containers();
//! registry.register(
//!     ContainerSchema::event("syslog:line").attribute("body", AttributeKind::String),
//! )?;
//!
//! let event = AttributeContainer::new(&registry, "syslog:line")?
//!     .with("body", AttributeValue::string("sshd started"));
//! println!("{}", event.container_type());
//! # Ok(())
//! # }
//! ```

/// Attribute values and the container record
pub mod container;

/// Built-in container types
pub mod defaults;

/// Registry and validation errors
pub mod error;

/// Container type registry
pub mod manager;

/// Preprocess knowledge container
pub mod preprocess;

/// Container schemas
pub mod schema;

/// Extraction session record
pub mod session;

pub use container::{AttributeContainer, AttributeValue};
pub use error::ContainerError;
pub use manager::ContainerRegistry;
pub use preprocess::{OperatingSystem, PreprocessObject};
pub use schema::{AttributeDefinition, AttributeKind, ContainerSchema};
pub use session::{Session, SessionCounters, SessionStatus};
