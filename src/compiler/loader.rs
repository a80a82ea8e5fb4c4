//! Markup sources
//!
//! The compiler reads markup through a loader so hosts can serve files from
//! disk, memory, or anything else addressable by virtual path. The identity
//! a loader reports is what the cache keys on.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use parking_lot::Mutex;

/// Loader failure
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("markup file '{path}' was not found")]
    NotFound { path: String },
    #[error("cannot read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Identity of a markup file at the moment it was read
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    pub virtual_path: String,
    /// Last modification time; `None` when the source has no timestamps
    pub modified: Option<SystemTime>,
}

/// A loaded markup file
#[derive(Debug, Clone)]
pub struct LoadedMarkup {
    pub identity: FileIdentity,
    pub source: String,
}

/// Source of markup files, addressed by virtual path
pub trait MarkupLoader: Send + Sync {
    fn load(&self, virtual_path: &str) -> Result<LoadedMarkup, LoadError>;
}

/// Loader over a directory on disk
#[derive(Debug)]
pub struct FsMarkupLoader {
    root: PathBuf,
}

impl FsMarkupLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, virtual_path: &str) -> PathBuf {
        self.root.join(Path::new(virtual_path))
    }
}

impl MarkupLoader for FsMarkupLoader {
    fn load(&self, virtual_path: &str) -> Result<LoadedMarkup, LoadError> {
        let full = self.full_path(virtual_path);
        let io_error = |source: std::io::Error| match source.kind() {
            std::io::ErrorKind::NotFound => LoadError::NotFound {
                path: virtual_path.to_string(),
            },
            _ => LoadError::Io {
                path: virtual_path.to_string(),
                source,
            },
        };
        let source = std::fs::read_to_string(&full).map_err(io_error)?;
        let modified = std::fs::metadata(&full)
            .and_then(|m| m.modified())
            .ok();
        Ok(LoadedMarkup {
            identity: FileIdentity {
                virtual_path: virtual_path.to_string(),
                modified,
            },
            source,
        })
    }
}

/// In-memory loader, used by embedding hosts and tests
#[derive(Debug, Default)]
pub struct InMemoryLoader {
    files: Mutex<HashMap<String, (String, SystemTime)>>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file; replacing bumps the reported identity
    pub fn insert(&self, virtual_path: impl Into<String>, source: impl Into<String>) {
        self.files
            .lock()
            .insert(virtual_path.into(), (source.into(), SystemTime::now()));
    }

    /// Replace a file while reporting a specific timestamp
    pub fn insert_with_time(
        &self,
        virtual_path: impl Into<String>,
        source: impl Into<String>,
        modified: SystemTime,
    ) {
        self.files
            .lock()
            .insert(virtual_path.into(), (source.into(), modified));
    }
}

impl MarkupLoader for InMemoryLoader {
    fn load(&self, virtual_path: &str) -> Result<LoadedMarkup, LoadError> {
        let files = self.files.lock();
        let (source, modified) = files.get(virtual_path).ok_or_else(|| LoadError::NotFound {
            path: virtual_path.to_string(),
        })?;
        Ok(LoadedMarkup {
            identity: FileIdentity {
                virtual_path: virtual_path.to_string(),
                modified: Some(*modified),
            },
            source: source.clone(),
        })
    }
}
