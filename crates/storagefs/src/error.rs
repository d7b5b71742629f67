//! Error types for Storagefs
//!
//! This module provides error types for the virtual filesystem with the following design goals:
//! - One variant per failure kind the host needs to tell apart (not found, type mismatch, conflict)
//! - Messages that identify the path and the underlying cause
//! - Remote transport errors kept opaque, except for known "not found" codes

use crate::remote::{RemoteError, RemoteErrorCode};
use thiserror::Error;

/// Result type alias using Storagefs's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// A single child that could not be removed during a recursive delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFailure {
    /// Path of the child, relative to its root.
    pub path: String,
    /// Human-readable cause.
    pub reason: String,
}

/// Storagefs error types.
#[derive(Error, Debug)]
pub enum Error {
    /// The lookup walk found no file or directory at the path.
    #[error("file or directory not found: {0}")]
    EntryNotFound(String),

    /// A directory was required but the path is a file.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// A file was required but the path is a directory.
    #[error("is a directory: {0}")]
    FileIsADirectory(String),

    /// A directory (real or pending) already exists at the path.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A file already exists and overwrite was not permitted.
    #[error("file exists: {0}")]
    FileExists(String),

    /// Write attempted with neither create nor overwrite permitted.
    #[error("no permissions: {0}")]
    NoPermissions(String),

    /// The operation is not offered by remote object storage.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// The operation is never valid for this target (e.g. deleting a container).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A directory name was rejected before any remote call.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// The URI's root segment does not match an accessible container or share.
    #[error("storage root not found: {0}")]
    RootNotFound(String),

    /// The host cancelled a long-running operation.
    #[error("operation cancelled")]
    Cancelled,

    /// A recursive delete completed with some children left behind.
    #[error("failed to delete {} of {} items under {path}", failed.len(), failed.len() + deleted)]
    PartialDelete {
        path: String,
        failed: Vec<DeleteFailure>,
        deleted: usize,
    },

    /// Opaque failure from the remote storage collaborator.
    #[error("remote storage error at {path}: {source}")]
    Remote {
        path: String,
        #[source]
        source: RemoteError,
    },
}

impl Error {
    /// Convert a remote failure at `path` into the local taxonomy.
    ///
    /// "Container/share not found" becomes [`Error::RootNotFound`], "blob/resource
    /// not found" becomes [`Error::EntryNotFound`]; everything else stays opaque.
    pub fn from_remote(path: impl Into<String>, source: RemoteError) -> Self {
        let path = path.into();
        match source.code {
            RemoteErrorCode::ContainerNotFound | RemoteErrorCode::ShareNotFound => {
                Self::RootNotFound(path)
            }
            RemoteErrorCode::BlobNotFound
            | RemoteErrorCode::ResourceNotFound
            | RemoteErrorCode::ParentNotFound => Self::EntryNotFound(path),
            RemoteErrorCode::ResourceAlreadyExists => Self::AlreadyExists(path),
            RemoteErrorCode::Other(_) => Self::Remote { path, source },
        }
    }

    /// True for failures the host should treat as "file not found".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EntryNotFound(_) | Self::RootNotFound(_))
    }
}
