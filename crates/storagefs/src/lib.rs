//! Storagefs - Virtual filesystem over Azure Storage blob containers and file shares
//!
//! Maps hierarchical URIs such as
//! `azurestorage://account/Blob Containers/container/dir/file` onto flat,
//! paged remote storage listings. Blob containers have no directory objects,
//! so empty directories created through the provider are tracked client-side
//! until a file lands beneath them.
//!
//! The remote services themselves are collaborators behind the traits in
//! [`remote`]; [`remote::memory`] provides an in-memory implementation.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use storagefs::remote::memory::{MemoryAccount, MemoryRegistry};
//! use storagefs::{FileSystemProvider, StorageFs, WriteOptions};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let account = Arc::new(MemoryAccount::new("acct"));
//!     account.blobs().create_container("docs");
//!     let registry = Arc::new(MemoryRegistry::new());
//!     registry.add_account(account);
//!
//!     let fs = StorageFs::blob_containers(registry);
//!     let uri = "azurestorage://acct/Blob Containers/docs/notes/todo.txt";
//!     fs.write_file(uri, b"buy milk", WriteOptions::upsert()).await?;
//!     assert_eq!(fs.read_file(uri).await?, b"buy milk");
//!     let notes = fs.stat("azurestorage://acct/Blob Containers/docs/notes").await?;
//!     assert!(notes.file_type.is_dir());
//!     Ok(())
//! }
//! ```

mod cancel;
mod config;
mod content_type;
mod entry;
mod error;
mod events;
mod logging_impl;
mod lookup;
mod names;
pub mod path;
mod provider;
pub mod remote;
mod root;
mod virtual_dirs;

pub use cancel::CancellationToken;
pub use config::{DEFAULT_EVENT_CAPACITY, FsConfig};
pub use entry::Entry;
pub use error::{DeleteFailure, Error, Result};
pub use events::{FileChangeEvent, FileChangeKind};
pub use logging_impl::{LogConfig, format_uri_for_log, sanitize_for_log};
pub use lookup::EntryResolver;
pub use names::{validate_blob_directory, validate_share_directory};
pub use path::{ParsedPath, RootIdentity, RootMarker};
pub use provider::{
    DeleteOptions, DirEntry, FileStat, FileSystemProvider, FileType, RenameOptions, StorageFs,
    StorageFsBuilder, WatchOptions, WriteOptions,
};
pub use root::{RootResolver, StorageRoot};
pub use virtual_dirs::VirtualDirectoryTracker;

/// Re-export for implementing the collaborator traits.
pub use async_trait::async_trait;
