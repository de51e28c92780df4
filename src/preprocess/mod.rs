//! Preprocessing: knowledge about the analysed hosts gathered before any
//! extraction task runs.
//!
//! Each distinct volume (the outermost local directory of a source) is
//! inspected once by every [`PreprocessPlugin`]. Plugin failures degrade to
//! warnings so extraction proceeds with whatever was learned.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rayon::prelude::*;
use thiserror::Error;

use crate::containers::PreprocessObject;
use crate::sources::SourceDescriptor;

/// Built-in plugins
pub mod plugins;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("I/O error while reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

impl PreprocessError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        PreprocessError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Lightweight metadata extraction run once per volume.
pub trait PreprocessPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Inspect the volume mounted at `root`; values already known are kept
    fn run(&self, root: &Path, knowledge: &mut PreprocessObject) -> Result<(), PreprocessError>;
}

pub fn default_plugins() -> Vec<Box<dyn PreprocessPlugin>> {
    vec![
        Box::new(plugins::OperatingSystemPlugin),
        Box::new(plugins::HostnamePlugin),
        Box::new(plugins::TimeZonePlugin),
        Box::new(plugins::UsersPlugin),
        Box::new(plugins::YearPlugin),
    ]
}

/// Run every plugin against one volume
pub fn preprocess_volume(root: &Path, plugins: &[Box<dyn PreprocessPlugin>]) -> PreprocessObject {
    let mut knowledge = PreprocessObject::new();
    knowledge.volumes.push(root.to_string_lossy().to_string());

    for plugin in plugins {
        if let Err(e) = plugin.run(root, &mut knowledge) {
            warn!("Preprocess plugin {} failed on {}: {}", plugin.name(), root.display(), e);
            knowledge.warnings.push(format!("{}: {}", plugin.name(), e));
        }
    }
    knowledge
}

/// Preprocess the distinct volumes of a set of sources.
///
/// Volumes are inspected in parallel and merged in path order, so the first
/// volume to know a value wins. Sources whose root is not a local directory
/// contribute nothing.
pub fn preprocess_sources(
    sources: &[SourceDescriptor],
    plugins: &[Box<dyn PreprocessPlugin>],
) -> PreprocessObject {
    let roots: Vec<PathBuf> = sources
        .iter()
        .filter_map(SourceDescriptor::volume_root)
        .filter(|root| {
            let is_dir = root.is_dir();
            if !is_dir {
                debug!("Not preprocessing {}, not a directory", root.display());
            }
            is_dir
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    info!("Preprocessing {} volumes", roots.len());

    let results: Vec<PreprocessObject> = roots
        .par_iter()
        .map(|root| preprocess_volume(root, plugins))
        .collect();

    let mut knowledge = PreprocessObject::new();
    for result in results {
        knowledge.merge(result);
    }

    if !knowledge.warnings.is_empty() {
        warn!("Preprocessing finished with {} warnings", knowledge.warnings.len());
    }
    knowledge
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::OperatingSystem;
    use std::fs;
    use tempfile::TempDir;

    struct FailingPlugin;

    impl PreprocessPlugin for FailingPlugin {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn run(&self, root: &Path, _knowledge: &mut PreprocessObject) -> Result<(), PreprocessError> {
            Err(PreprocessError::Malformed {
                path: root.to_path_buf(),
                reason: "broken".to_string(),
            })
        }
    }

    fn linux_volume(hostname: &str) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("etc")).unwrap();
        fs::write(temp_dir.path().join("etc/hostname"), hostname).unwrap();
        temp_dir
    }

    #[test]
    fn test_preprocess_distinct_volumes() {
        let first = linux_volume("alpha");
        let second = linux_volume("beta");
        let sources = vec![
            SourceDescriptor::os(first.path()),
            SourceDescriptor::os(second.path()),
            SourceDescriptor::os(first.path()),
        ];

        let knowledge = preprocess_sources(&sources, &default_plugins());
        assert_eq!(knowledge.volumes.len(), 2);
        assert_eq!(knowledge.operating_system, Some(OperatingSystem::Linux));

        let expected = if first.path() < second.path() { "alpha" } else { "beta" };
        assert_eq!(knowledge.hostname.as_deref(), Some(expected));
        assert!(knowledge.warnings.is_empty());
    }

    #[test]
    fn test_plugin_failures_become_warnings() {
        let volume = linux_volume("alpha");
        let plugins: Vec<Box<dyn PreprocessPlugin>> = vec![Box::new(FailingPlugin), Box::new(plugins::HostnamePlugin)];

        let knowledge = preprocess_sources(&[SourceDescriptor::os(volume.path())], &plugins);
        assert_eq!(knowledge.warnings.len(), 1);
        assert!(knowledge.warnings[0].starts_with("failing:"));
        assert_eq!(knowledge.hostname.as_deref(), Some("alpha"));
    }

    #[test]
    fn test_file_sources_are_not_preprocessed() {
        let file = crate::test_utils::create_temp_file(b"data").unwrap();
        let knowledge = preprocess_sources(&[SourceDescriptor::os(file.path())], &default_plugins());
        assert_eq!(knowledge, PreprocessObject::new());
    }
}
