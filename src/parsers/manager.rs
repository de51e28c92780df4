use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use log::debug;
use thiserror::Error;

use crate::constants::PARSER_PRESETS;
use crate::containers::{ContainerError, ContainerRegistry};
use crate::parsers::filestat::FileStatParser;
use crate::parsers::mac_wifi::MacWifiLogParser;
use crate::parsers::Parser;

#[derive(Debug, Error)]
pub enum ParserFilterError {
    #[error("unknown parser or preset '{0}' in parser filter expression")]
    UnknownParser(String),

    #[error("parser filter expression '{0}' selects no parsers")]
    EmptySelection(String),

    #[error("parser '{0}' is already registered")]
    DuplicateParser(String),
}

/// Extraction routines keyed by name.
#[derive(Default, Clone)]
pub struct ParserRegistry {
    parsers: BTreeMap<&'static str, Arc<dyn Parser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in parsers.
    ///
    /// `hash_max_size_mb` enables SHA-256 hashing in `filestat` for files up to
    /// that size.
    pub fn with_default_parsers(hash_max_size_mb: Option<u64>) -> Self {
        let mut registry = Self::new();
        let defaults: Vec<Arc<dyn Parser>> = vec![
            Arc::new(FileStatParser::new(hash_max_size_mb)),
            Arc::new(MacWifiLogParser::new()),
        ];
        for parser in defaults {
            // Built-in names are distinct
            let _ = registry.register(parser);
        }
        registry
    }

    pub fn register(&mut self, parser: Arc<dyn Parser>) -> Result<(), ParserFilterError> {
        let name = parser.name();
        if self.parsers.contains_key(name) {
            return Err(ParserFilterError::DuplicateParser(name.to_string()));
        }
        self.parsers.insert(name, parser);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Parser>> {
        self.parsers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.parsers.keys().copied().collect()
    }

    /// (name, description) pairs for listing
    pub fn descriptions(&self) -> Vec<(&'static str, &'static str)> {
        self.parsers.values().map(|p| (p.name(), p.description())).collect()
    }

    /// Register the container types every parser declares.
    ///
    /// A type already registered with an identical schema is accepted, so
    /// parsers may share a type.
    pub fn register_container_schemas(&self, registry: &ContainerRegistry) -> Result<(), ContainerError> {
        for parser in self.parsers.values() {
            for schema in parser.container_schemas() {
                match registry.lookup(schema.container_type()) {
                    Ok(existing) if *existing == schema => continue,
                    Ok(_) => {
                        return Err(ContainerError::DuplicateRegistration(
                            schema.container_type().to_string(),
                        ))
                    }
                    Err(_) => registry.register(schema)?,
                }
            }
        }
        Ok(())
    }

    /// Resolve a parser filter expression.
    ///
    /// The expression is a comma separated list of parser names or presets;
    /// a leading `!` excludes. Without inclusions every parser is included.
    /// An absent or blank expression selects all parsers.
    pub fn select(&self, expression: Option<&str>) -> Result<Vec<Arc<dyn Parser>>, ParserFilterError> {
        let expression = match expression.map(str::trim).filter(|e| !e.is_empty()) {
            Some(expression) => expression,
            None => return Ok(self.parsers.values().cloned().collect()),
        };

        let mut includes = BTreeSet::new();
        let mut excludes = BTreeSet::new();

        for term in expression.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (exclude, name) = match term.strip_prefix('!') {
                Some(name) => (true, name.trim()),
                None => (false, term),
            };
            let names = self.expand(name)?;
            if exclude {
                excludes.extend(names);
            } else {
                includes.extend(names);
            }
        }

        if includes.is_empty() {
            includes = self.parsers.keys().copied().collect();
        }

        let selected: Vec<Arc<dyn Parser>> = includes
            .difference(&excludes)
            .filter_map(|name| self.parsers.get(name).cloned())
            .collect();

        if selected.is_empty() {
            return Err(ParserFilterError::EmptySelection(expression.to_string()));
        }
        debug!(
            "Parser filter '{}' selected: {}",
            expression,
            selected.iter().map(|p| p.name()).collect::<Vec<_>>().join(", ")
        );
        Ok(selected)
    }

    fn expand(&self, name: &str) -> Result<Vec<&'static str>, ParserFilterError> {
        let lower = name.to_lowercase();
        if let Some((key, _)) = self.parsers.get_key_value(lower.as_str()) {
            return Ok(vec![*key]);
        }
        if let Some((_, members)) = PARSER_PRESETS.iter().find(|(preset, _)| *preset == lower) {
            return Ok(members
                .iter()
                .filter_map(|m| self.parsers.get_key_value(m).map(|(key, _)| *key))
                .collect());
        }
        Err(ParserFilterError::UnknownParser(name.to_string()))
    }
}
