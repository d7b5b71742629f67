//! Remote storage collaborator interfaces.
//!
//! This module defines the raw operations the filesystem consumes from the
//! storage SDK, without any filesystem semantics:
//!
//! | Trait | Covers |
//! |-------|--------|
//! | [`BlobService`] | prefix listings, get/put/delete of blobs in a container |
//! | [`ShareService`] | directory listings, file get/put/delete, directory create/delete in a share |
//! | [`StorageAccount`] | creating fresh service clients for one account |
//! | [`RootRegistry`] | finding the account that owns a container or share |
//!
//! Listing calls are segmented: each returns a [`Page`] with an optional
//! [`ContinuationToken`]. Callers must keep requesting pages until the token is
//! `None`; [`client::RootClient`] does that draining.
//!
//! Authentication, retries and timeouts belong to the implementations.
//! [`memory`] provides an in-process implementation of every trait.

pub mod client;
pub mod memory;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::path::RootIdentity;

/// Result type for collaborator calls.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Known remote error codes. Everything else is [`RemoteErrorCode::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteErrorCode {
    ContainerNotFound,
    ShareNotFound,
    BlobNotFound,
    ResourceNotFound,
    ParentNotFound,
    ResourceAlreadyExists,
    /// Service-specific code, propagated as-is.
    Other(String),
}

impl fmt::Display for RemoteErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContainerNotFound => write!(f, "ContainerNotFound"),
            Self::ShareNotFound => write!(f, "ShareNotFound"),
            Self::BlobNotFound => write!(f, "BlobNotFound"),
            Self::ResourceNotFound => write!(f, "ResourceNotFound"),
            Self::ParentNotFound => write!(f, "ParentNotFound"),
            Self::ResourceAlreadyExists => write!(f, "ResourceAlreadyExists"),
            Self::Other(code) => write!(f, "{code}"),
        }
    }
}

/// Failure reported by a remote storage call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct RemoteError {
    pub code: RemoteErrorCode,
    pub message: String,
}

impl RemoteError {
    pub fn new(code: RemoteErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Opaque cursor for the next page of a segmented listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken(pub String);

/// One segment of a listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `None` once the listing is exhausted.
    pub continuation: Option<ContinuationToken>,
}

/// A blob prefix ("virtual directory") returned by a delimited listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobPrefix {
    /// Full prefix including the trailing delimiter, e.g. `a/b/`.
    pub name: String,
}

/// A blob returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobItem {
    /// Full blob name, e.g. `a/b/file.txt`.
    pub name: String,
    pub size: Option<u64>,
    pub content_type: Option<String>,
}

/// An entry of a share directory listing. Names are single segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareItem {
    File { name: String, size: Option<u64> },
    Directory { name: String },
}

/// Blob container operations.
#[async_trait]
pub trait BlobService: Send + Sync {
    /// List the immediate sub-prefixes of `prefix` (`""` for the container root,
    /// otherwise ending in `/`).
    async fn list_directories_by_prefix(
        &self,
        container: &str,
        prefix: &str,
        token: Option<&ContinuationToken>,
    ) -> RemoteResult<Page<BlobPrefix>>;

    /// List blobs under `prefix`. With a delimiter only blobs directly under
    /// the prefix are returned.
    async fn list_blobs_by_prefix(
        &self,
        container: &str,
        prefix: &str,
        delimiter: Option<&str>,
        token: Option<&ContinuationToken>,
    ) -> RemoteResult<Page<BlobItem>>;

    async fn get_blob_content(&self, container: &str, name: &str) -> RemoteResult<Vec<u8>>;

    async fn put_blob_content(
        &self,
        container: &str,
        name: &str,
        content: &[u8],
        content_type: Option<&str>,
    ) -> RemoteResult<()>;

    async fn delete_blob(&self, container: &str, name: &str) -> RemoteResult<()>;
}

/// File share operations. `dir_path` is `/`-joined without leading or
/// trailing `/`; `""` is the share root.
#[async_trait]
pub trait ShareService: Send + Sync {
    async fn list_files_and_directories(
        &self,
        share: &str,
        dir_path: &str,
        token: Option<&ContinuationToken>,
    ) -> RemoteResult<Page<ShareItem>>;

    async fn get_file_content(&self, share: &str, dir_path: &str, name: &str)
    -> RemoteResult<Vec<u8>>;

    async fn put_file_content(
        &self,
        share: &str,
        dir_path: &str,
        name: &str,
        content: &[u8],
        content_type: Option<&str>,
    ) -> RemoteResult<()>;

    async fn delete_file(&self, share: &str, dir_path: &str, name: &str) -> RemoteResult<()>;

    async fn create_directory(&self, share: &str, dir_path: &str, name: &str) -> RemoteResult<()>;

    /// Delete an empty directory. `path` is the directory's full path.
    async fn delete_directory(&self, share: &str, path: &str) -> RemoteResult<()>;
}

/// A storage account able to hand out service clients.
///
/// Clients are created on demand for each operation; implementations decide
/// whether that means a new connection or a shared one.
pub trait StorageAccount: Send + Sync {
    /// Account name, for logging.
    fn name(&self) -> &str;

    fn blob_service(&self) -> Arc<dyn BlobService>;

    fn share_service(&self) -> Arc<dyn ShareService>;
}

/// The host's account tree: finds the account that owns a root.
#[async_trait]
pub trait RootRegistry: Send + Sync {
    /// Look up the node for `root`. `Ok(None)` when no accessible container or
    /// share matches.
    async fn find_root(&self, root: &RootIdentity) -> RemoteResult<Option<Arc<dyn StorageAccount>>>;
}
