use std::sync::Arc;

use crate::containers::{AttributeContainer, ContainerRegistry, Session};
use crate::storage::error::StoreError;
use crate::storage::StorageWriter;

/// Storage writer that keeps containers in memory.
///
/// Applies the same validation and closing rules as the file writer, which
/// makes it suitable for dry runs and for inspecting engine output in tests.
#[derive(Debug)]
pub struct MemoryStorageWriter {
    registry: Arc<ContainerRegistry>,
    containers: Vec<AttributeContainer>,
    session: Option<Session>,
}

impl MemoryStorageWriter {
    pub fn new(registry: Arc<ContainerRegistry>) -> Self {
        Self {
            registry,
            containers: Vec::new(),
            session: None,
        }
    }

    pub fn containers(&self) -> &[AttributeContainer] {
        &self.containers
    }

    /// Containers of one type in write order
    pub fn containers_of_type<'a>(&'a self, container_type: &'a str) -> impl Iterator<Item = &'a AttributeContainer> + 'a {
        self.containers
            .iter()
            .filter(move |c| c.container_type() == container_type)
    }

    /// Session record stored by `close`
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_some()
    }
}

impl StorageWriter for MemoryStorageWriter {
    fn add_container(&mut self, container: &AttributeContainer) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::WriterClosed("<memory>".into()));
        }
        self.registry
            .lookup(container.container_type())?
            .validate(container)?;
        self.containers.push(container.clone());
        Ok(())
    }

    fn close(&mut self, session: &Session) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::WriterClosed("<memory>".into()));
        }
        self.session = Some(session.clone());
        Ok(())
    }

    fn number_of_containers(&self) -> u64 {
        self.containers.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{new_event, test_registry};

    #[test]
    fn test_memory_writer_closing() {
        let registry = test_registry();
        let mut writer = MemoryStorageWriter::new(Arc::clone(&registry));
        writer.add_container(&new_event(&registry, 7)).unwrap();

        let session = Session::new();
        writer.close(&session).unwrap();

        assert_eq!(writer.containers_of_type("test:event").count(), 1);
        assert_eq!(writer.session().unwrap().identifier, session.identifier);
        assert!(matches!(
            writer.add_container(&new_event(&registry, 8)),
            Err(StoreError::WriterClosed(_))
        ));
    }
}
