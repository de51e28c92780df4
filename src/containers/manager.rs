//! Process-wide catalog of container types.
//!
//! The registry is an explicit service object. Its lifecycle is:
//!
//! 1. build it at start-up ([`ContainerRegistry::with_default_containers`]),
//! 2. let every extraction routine register the types it emits,
//! 3. share it as `Arc<ContainerRegistry>` with the engine, workers, writer and readers,
//! 4. deregister only in tests or teardown.
//!
//! Lookups take a read lock, so registering a type while extraction runs is
//! safe, just not expected.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;

use crate::containers::defaults;
use crate::containers::error::ContainerError;
use crate::containers::schema::ContainerSchema;

#[derive(Debug, Default)]
pub struct ContainerRegistry {
    schemas: RwLock<HashMap<String, Arc<ContainerSchema>>>,
}

impl ContainerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in container types
    pub fn with_default_containers() -> Self {
        let registry = Self::new();
        for schema in defaults::default_schemas() {
            // The built-in schemas have distinct types, a fresh registry cannot reject them
            let _ = registry.register(schema);
        }
        registry
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<ContainerSchema>>> {
        self.schemas.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<ContainerSchema>>> {
        self.schemas.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Install a schema, failing if its type is already present
    pub fn register(&self, schema: ContainerSchema) -> Result<(), ContainerError> {
        let mut schemas = self.write();
        let container_type = schema.container_type().to_string();
        if schemas.contains_key(&container_type) {
            return Err(ContainerError::DuplicateRegistration(container_type));
        }
        debug!("Registered container type {}", container_type);
        schemas.insert(container_type, Arc::new(schema));
        Ok(())
    }

    /// Remove a schema, failing if its type is absent
    pub fn deregister(&self, container_type: &str) -> Result<Arc<ContainerSchema>, ContainerError> {
        self.write()
            .remove(container_type)
            .ok_or_else(|| ContainerError::NotRegistered(container_type.to_string()))
    }

    pub fn lookup(&self, container_type: &str) -> Result<Arc<ContainerSchema>, ContainerError> {
        self.read()
            .get(container_type)
            .cloned()
            .ok_or_else(|| ContainerError::NotRegistered(container_type.to_string()))
    }

    pub fn is_registered(&self, container_type: &str) -> bool {
        self.read().contains_key(container_type)
    }

    /// Registered container types in sorted order
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.read().keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::schema::AttributeKind;
    use crate::test_utils::test_schema;

    #[test]
    fn test_container_registration() {
        let registry = ContainerRegistry::with_default_containers();
        let number_of_types = registry.len();

        registry.register(test_schema()).unwrap();
        assert_eq!(registry.len(), number_of_types + 1);

        let result = registry.register(test_schema());
        assert!(matches!(result, Err(ContainerError::DuplicateRegistration(t)) if t == "test:container"));

        registry.deregister("test:container").unwrap();
        assert_eq!(registry.len(), number_of_types);
        assert!(matches!(
            registry.lookup("test:container"),
            Err(ContainerError::NotRegistered(_))
        ));
    }

    #[test]
    fn test_deregister_unknown_type() {
        let registry = ContainerRegistry::new();
        assert!(matches!(
            registry.deregister("missing"),
            Err(ContainerError::NotRegistered(t)) if t == "missing"
        ));
    }

    #[test]
    fn test_default_containers() {
        let registry = ContainerRegistry::with_default_containers();
        assert_eq!(
            registry.registered_types(),
            vec!["event", "extraction_error", "preprocess", "report"]
        );
        assert!(registry.lookup("event").unwrap().is_timeline_event());
        assert!(!registry.lookup("report").unwrap().is_timeline_event());
    }

    #[test]
    fn test_concurrent_lookup_during_registration() {
        let registry = Arc::new(ContainerRegistry::with_default_containers());

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let name = format!("dynamic:{}", i);
                    registry
                        .register(ContainerSchema::new(&name).attribute("v", AttributeKind::Integer))
                        .unwrap();
                    for _ in 0..100 {
                        assert!(registry.lookup("event").is_ok());
                    }
                    assert!(registry.is_registered(&name));
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 8);
    }
}
