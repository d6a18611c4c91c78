//! Error types shared by the JSON file storage implementation.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`FileStoreError`] failures.
pub type FileResult<T> = Result<T, FileStoreError>;

/// Failures that can occur while reading or writing the player file.
#[derive(Debug, Error)]
pub enum FileStoreError {
    /// The file exists but could not be read.
    #[error("failed to read player file `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The parent directory could not be created.
    #[error("failed to create directory `{}`", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Writing the temporary file failed.
    #[error("failed to write player file `{}`", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Moving the temporary file over the store failed.
    #[error("failed to replace player file `{}`", path.display())]
    Rename {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// File content is not a valid player document.
    #[error("failed to decode player file `{}`", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Serializing the document failed.
    #[error("failed to encode player document")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
    /// The document declares a format version this build does not understand.
    #[error("unsupported player file version {version} in `{}`", path.display())]
    UnsupportedVersion { path: PathBuf, version: u32 },
}

impl From<FileStoreError> for StorageError {
    fn from(err: FileStoreError) -> Self {
        match err {
            FileStoreError::Decode { .. } | FileStoreError::UnsupportedVersion { .. } => {
                StorageError::corrupt(err.to_string(), err)
            }
            _ => StorageError::unavailable(err.to_string(), err),
        }
    }
}
