use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Utc};

use crate::containers::{OperatingSystem, PreprocessObject};
use crate::preprocess::{PreprocessError, PreprocessPlugin};

/// System configuration directories of Linux and macOS volumes
const ETC_DIRECTORIES: &[&str] = &["etc", "private/etc"];

/// Directories whose modification time hints at the year of the logs
const YEAR_HINT_DIRECTORIES: &[&str] = &["var/log", "private/var/log", "etc"];

/// Entries of user profile directories that are not accounts
const NON_USER_PROFILES: &[&str] = &["Shared", "Public", "Default", "Default User", "All Users", "Guest"];

/// Read a small text file, treating a missing file as absent
fn read_optional(path: &Path) -> Result<Option<String>, PreprocessError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PreprocessError::io(path, e)),
    }
}

fn etc_paths<'a>(root: &'a Path, name: &str) -> impl Iterator<Item = PathBuf> + 'a {
    let name = name.to_string();
    ETC_DIRECTORIES.iter().map(move |etc| root.join(etc).join(&name))
}

pub struct OperatingSystemPlugin;

impl PreprocessPlugin for OperatingSystemPlugin {
    fn name(&self) -> &'static str {
        "operating_system"
    }

    fn run(&self, root: &Path, knowledge: &mut PreprocessObject) -> Result<(), PreprocessError> {
        let operating_system = if ["Windows/System32", "WINDOWS/system32"]
            .iter()
            .any(|p| root.join(p).is_dir())
        {
            OperatingSystem::Windows
        } else if root.join("System/Library/CoreServices/SystemVersion.plist").is_file() {
            OperatingSystem::MacOS
        } else if root.join("etc").is_dir() {
            OperatingSystem::Linux
        } else {
            return Ok(());
        };

        knowledge.operating_system.get_or_insert(operating_system);
        Ok(())
    }
}

pub struct HostnamePlugin;

impl PreprocessPlugin for HostnamePlugin {
    fn name(&self) -> &'static str {
        "hostname"
    }

    fn run(&self, root: &Path, knowledge: &mut PreprocessObject) -> Result<(), PreprocessError> {
        for path in etc_paths(root, "hostname") {
            if let Some(content) = read_optional(&path)? {
                let hostname = content.lines().next().unwrap_or_default().trim();
                if hostname.is_empty() {
                    return Err(PreprocessError::Malformed {
                        path,
                        reason: "empty hostname".to_string(),
                    });
                }
                knowledge.hostname.get_or_insert_with(|| hostname.to_string());
                break;
            }
        }
        Ok(())
    }
}

pub struct TimeZonePlugin;

impl PreprocessPlugin for TimeZonePlugin {
    fn name(&self) -> &'static str {
        "time_zone"
    }

    fn run(&self, root: &Path, knowledge: &mut PreprocessObject) -> Result<(), PreprocessError> {
        for path in etc_paths(root, "timezone") {
            if let Some(content) = read_optional(&path)? {
                let zone = content.trim();
                if !zone.is_empty() {
                    knowledge.time_zone.get_or_insert_with(|| zone.to_string());
                    return Ok(());
                }
            }
        }

        // /etc/localtime -> /usr/share/zoneinfo/Europe/Amsterdam
        for path in etc_paths(root, "localtime") {
            if let Ok(target) = fs::read_link(&path) {
                let target = target.to_string_lossy().to_string();
                if let Some((_, zone)) = target.split_once("zoneinfo/") {
                    knowledge.time_zone.get_or_insert_with(|| zone.to_string());
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

pub struct UsersPlugin;

impl PreprocessPlugin for UsersPlugin {
    fn name(&self) -> &'static str {
        "users"
    }

    fn run(&self, root: &Path, knowledge: &mut PreprocessObject) -> Result<(), PreprocessError> {
        for profiles in ["home", "Users"] {
            let directory = root.join(profiles);
            let entries = match fs::read_dir(&directory) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(PreprocessError::io(&directory, e)),
            };

            let mut users = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|e| PreprocessError::io(&directory, e))?;
                let name = entry.file_name().to_string_lossy().to_string();
                if entry.path().is_dir() && !name.starts_with('.') && !NON_USER_PROFILES.contains(&name.as_str()) {
                    users.push(name);
                }
            }
            users.sort();
            for user in users {
                if !knowledge.users.contains(&user) {
                    knowledge.users.push(user);
                }
            }
        }
        Ok(())
    }
}

pub struct YearPlugin;

impl PreprocessPlugin for YearPlugin {
    fn name(&self) -> &'static str {
        "year"
    }

    fn run(&self, root: &Path, knowledge: &mut PreprocessObject) -> Result<(), PreprocessError> {
        for directory in YEAR_HINT_DIRECTORIES {
            let path = root.join(directory);
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(_) => continue,
            };
            let modified = metadata.modified().map_err(|e| PreprocessError::io(&path, e))?;
            knowledge.year.get_or_insert(DateTime::<Utc>::from(modified).year());
            break;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn run(plugin: &dyn PreprocessPlugin, root: &Path) -> PreprocessObject {
        let mut knowledge = PreprocessObject::new();
        plugin.run(root, &mut knowledge).unwrap();
        knowledge
    }

    #[test]
    fn test_operating_system_detection() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(run(&OperatingSystemPlugin, temp_dir.path()).operating_system, None);

        fs::create_dir_all(temp_dir.path().join("etc")).unwrap();
        assert_eq!(
            run(&OperatingSystemPlugin, temp_dir.path()).operating_system,
            Some(OperatingSystem::Linux)
        );

        fs::create_dir_all(temp_dir.path().join("System/Library/CoreServices")).unwrap();
        fs::write(temp_dir.path().join("System/Library/CoreServices/SystemVersion.plist"), b"<plist/>").unwrap();
        assert_eq!(
            run(&OperatingSystemPlugin, temp_dir.path()).operating_system,
            Some(OperatingSystem::MacOS)
        );
    }

    #[test]
    fn test_hostname_and_time_zone() {
        let temp_dir = TempDir::new().unwrap();
        let etc = temp_dir.path().join("etc");
        fs::create_dir_all(&etc).unwrap();
        fs::write(etc.join("hostname"), "forensic-host\n").unwrap();
        fs::write(etc.join("timezone"), "Europe/Amsterdam\n").unwrap();

        assert_eq!(run(&HostnamePlugin, temp_dir.path()).hostname.as_deref(), Some("forensic-host"));
        assert_eq!(
            run(&TimeZonePlugin, temp_dir.path()).time_zone.as_deref(),
            Some("Europe/Amsterdam")
        );
    }

    #[test]
    fn test_empty_hostname_is_malformed() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("etc")).unwrap();
        fs::write(temp_dir.path().join("etc/hostname"), "\n").unwrap();

        let mut knowledge = PreprocessObject::new();
        let result = HostnamePlugin.run(temp_dir.path(), &mut knowledge);
        assert!(matches!(result, Err(PreprocessError::Malformed { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_time_zone_from_localtime_link() {
        let temp_dir = TempDir::new().unwrap();
        let etc = temp_dir.path().join("etc");
        fs::create_dir_all(&etc).unwrap();
        std::os::unix::fs::symlink("/usr/share/zoneinfo/America/New_York", etc.join("localtime")).unwrap();

        assert_eq!(
            run(&TimeZonePlugin, temp_dir.path()).time_zone.as_deref(),
            Some("America/New_York")
        );
    }

    #[test]
    fn test_users() {
        let temp_dir = TempDir::new().unwrap();
        for profile in ["home/bob", "home/alice", "Users/Shared", "Users/carol"] {
            fs::create_dir_all(temp_dir.path().join(profile)).unwrap();
        }
        fs::write(temp_dir.path().join("home/notes.txt"), b"").unwrap();

        assert_eq!(run(&UsersPlugin, temp_dir.path()).users, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_year_hint() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(run(&YearPlugin, temp_dir.path()).year, None);

        fs::create_dir_all(temp_dir.path().join("var/log")).unwrap();
        assert_eq!(run(&YearPlugin, temp_dir.path()).year, Some(Utc::now().year()));
    }
}
