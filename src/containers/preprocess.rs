use std::fmt;

use serde::{Deserialize, Serialize};

use crate::containers::container::{AttributeContainer, AttributeValue};
use crate::containers::defaults::PREPROCESS;
use crate::containers::error::ContainerError;
use crate::containers::manager::ContainerRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperatingSystem {
    Windows,
    MacOS,
    Linux,
    Unknown,
}

impl fmt::Display for OperatingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperatingSystem::Windows => "Windows",
            OperatingSystem::MacOS => "MacOS",
            OperatingSystem::Linux => "Linux",
            OperatingSystem::Unknown => "Unknown",
        };
        write!(f, "{}", name)
    }
}

/// Knowledge about the analysed hosts gathered before extraction.
///
/// Tasks read it to resolve ambiguous data, for example the year of log
/// lines that carry only month and day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessObject {
    pub hostname: Option<String>,
    pub operating_system: Option<OperatingSystem>,
    pub time_zone: Option<String>,
    pub year: Option<i32>,
    pub users: Vec<String>,
    pub volumes: Vec<String>,
    pub warnings: Vec<String>,
}

impl PreprocessObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill unset values from another object; values already set win
    pub fn merge(&mut self, other: PreprocessObject) {
        if self.hostname.is_none() {
            self.hostname = other.hostname;
        }
        if self.operating_system.is_none() {
            self.operating_system = other.operating_system;
        }
        if self.time_zone.is_none() {
            self.time_zone = other.time_zone;
        }
        if self.year.is_none() {
            self.year = other.year;
        }
        for user in other.users {
            if !self.users.contains(&user) {
                self.users.push(user);
            }
        }
        self.volumes.extend(other.volumes);
        self.warnings.extend(other.warnings);
    }

    pub fn to_container(&self, registry: &ContainerRegistry) -> Result<AttributeContainer, ContainerError> {
        let join = |values: &[String]| {
            if values.is_empty() {
                None
            } else {
                Some(AttributeValue::String(values.join(",")))
            }
        };

        Ok(AttributeContainer::new(registry, PREPROCESS)?
            .with_optional("hostname", self.hostname.clone().map(AttributeValue::String))
            .with_optional(
                "operating_system",
                self.operating_system.map(|os| AttributeValue::Enum(os.to_string())),
            )
            .with_optional("time_zone", self.time_zone.clone().map(AttributeValue::String))
            .with_optional("year", self.year.map(|y| AttributeValue::Integer(y.into())))
            .with_optional("users", join(&self.users))
            .with_optional("volumes", join(&self.volumes))
            .with("warnings", AttributeValue::Integer(self.warnings.len() as i64)))
    }
}
