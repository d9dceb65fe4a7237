//! Where template bytes come from.
//!
//! The store only needs to list names and read one name at a time; the
//! directory source walks a content root, the memory source backs tests and
//! embedded use.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// A provider of named byte blobs.
pub trait TemplateSource: Send + Sync {
    /// All names currently available, sidecars included.
    fn list(&self) -> io::Result<Vec<String>>;

    /// Read one blob by name.
    fn read(&self, name: &str) -> io::Result<Vec<u8>>;

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}

/// Templates stored as files under a content root.
///
/// Names are paths relative to the root using `/` separators, so
/// `responses/users/42.json` is named `users/42.json`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Collect file names below `dir`. Unreadable entries and subtrees are
    /// logged and skipped so the rest of the catalog still loads.
    fn walk(&self, entries: fs::ReadDir, prefix: &str, names: &mut Vec<String>) {
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(dir = %prefix, error = %e, "Skipping unreadable template entry");
                    continue;
                }
            };
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                tracing::warn!(path = ?entry.path(), "Skipping template with non UTF-8 name");
                continue;
            };
            if file_name.starts_with('.') {
                continue;
            }

            let name = if prefix.is_empty() {
                file_name.to_string()
            } else {
                format!("{prefix}/{file_name}")
            };

            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) => {
                    tracing::warn!(template = %name, error = %e, "Skipping template with unknown file type");
                    continue;
                }
            };
            if file_type.is_dir() {
                match fs::read_dir(entry.path()) {
                    Ok(children) => self.walk(children, &name, names),
                    Err(e) => {
                        tracing::warn!(dir = %name, error = %e, "Skipping unreadable template directory")
                    }
                }
            } else {
                names.push(name);
            }
        }
    }
}

impl TemplateSource for DirectorySource {
    fn list(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        self.walk(fs::read_dir(&self.root)?, "", &mut names);
        names.sort();
        Ok(names)
    }

    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("template name {name:?} is not a plain relative path"),
            ));
        }
        fs::read(self.root.join(relative))
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// Templates held in memory.
#[derive(Debug, Default)]
pub struct MemorySource {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(name, content);
        self
    }

    pub fn insert(&self, name: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), content.into());
    }

    pub fn remove(&self, name: &str) {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }
}

impl TemplateSource for MemorySource {
    fn list(&self) -> io::Result<Vec<String>> {
        Ok(self
            .files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect())
    }

    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, name.to_string()))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
