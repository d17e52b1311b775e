//! JSON file persistence shared by the rule and history stores
//!
//! Files are replaced atomically: the new content is written to a temporary
//! file in the same directory and renamed over the target. There is no
//! cross-process locking; the last writer wins.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Persistence failure
#[derive(Error, Debug)]
pub enum StoreError {
    /// File does not exist yet
    #[error("{path} does not exist")]
    NotFound {
        /// Path that was read
        path: PathBuf,
    },

    /// Reading or writing the file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File content is not the expected JSON
    #[error("cannot decode {path}: {source}")]
    Decode {
        /// Path that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Value could not be serialized
    #[error("cannot encode {path}: {source}")]
    Encode {
        /// Path that was to be written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Check if the error is the expected "nothing stored yet" case
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == ErrorKind::NotFound {
            Self::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Read and decode a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let data = std::fs::read(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_slice(&data).map_err(|source| StoreError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Encode a value as pretty JSON and atomically replace `path` with it
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let data = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    file.write_all(&data).map_err(|e| StoreError::io(path, e))?;
    file.as_file().sync_all().map_err(|e| StoreError::io(path, e))?;
    file.persist(path).map_err(|e| StoreError::io(path, e.error))?;

    Ok(())
}
