//! Virtual filesystem over blob containers or file shares.
//!
//! [`StorageFs`] implements [`FileSystemProvider`] on top of the remote
//! collaborator traits in [`crate::remote`].
//!
//! # Overview
//!
//! Each call parses its URI, resolves the root (cached), walks the relative
//! path against the remote listings, then performs the operation:
//!
//! | Operation | Checks |
//! |-----------|--------|
//! | `stat` | path resolves; size and times are always zero |
//! | `read_directory` | target is a directory, virtual directory or the root |
//! | `create_directory` | valid name, target absent, parent is a directory |
//! | `read_file` | target is a file |
//! | `write_file` | create/overwrite flags against existence |
//! | `delete` | recursive only; never the root |
//! | `rename`, `watch` | always `NotSupported` |
//!
//! Blob containers have no directory objects, so `create_directory` on a blob
//! root records a pending virtual directory that lives until a file is written
//! beneath it (see [`crate::virtual_dirs`]). File shares create real
//! directories.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use storagefs::remote::memory::{MemoryAccount, MemoryRegistry};
//! use storagefs::{FileSystemProvider, StorageFs, WriteOptions};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> anyhow::Result<()> {
//! let account = Arc::new(MemoryAccount::new("acct"));
//! account.blobs().create_container("photos");
//! let registry = Arc::new(MemoryRegistry::new());
//! registry.add_account(account);
//!
//! let fs = StorageFs::blob_containers(registry);
//! fs.create_directory("azurestorage://acct/Blob Containers/photos/2024").await?;
//! fs.write_file(
//!     "azurestorage://acct/Blob Containers/photos/2024/a.txt",
//!     b"hi",
//!     WriteOptions::upsert(),
//! )
//! .await?;
//! let entries = fs.read_directory("azurestorage://acct/Blob Containers/photos").await?;
//! assert_eq!(entries[0].name, "2024");
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;

use super::traits::{
    DeleteOptions, DirEntry, FileStat, FileSystemProvider, FileType, RenameOptions, WatchOptions,
    WriteOptions,
};
use crate::cancel::CancellationToken;
use crate::config::FsConfig;
use crate::content_type;
use crate::entry::Entry;
use crate::error::{DeleteFailure, Error, Result};
use crate::events::{ChangeEmitter, FileChangeEvent, FileChangeKind};
use crate::lookup::EntryResolver;
use crate::names;
use crate::path::{self, ParsedPath, RootMarker};
use crate::remote::RootRegistry;
use crate::remote::client::{RootClient, join};
use crate::root::{RootResolver, StorageRoot};
use crate::virtual_dirs::VirtualDirectoryTracker;

/// Virtual filesystem provider for one root kind.
///
/// Owns the root cache and the pending virtual directory set; both start
/// empty and are cleared by [`dispose`](Self::dispose) or on drop.
pub struct StorageFs {
    marker: RootMarker,
    config: FsConfig,
    roots: RootResolver,
    virtual_dirs: Arc<VirtualDirectoryTracker>,
    entries: EntryResolver,
    events: ChangeEmitter,
}

/// Builder for [`StorageFs`].
pub struct StorageFsBuilder {
    marker: RootMarker,
    registry: Arc<dyn RootRegistry>,
    config: FsConfig,
}

impl StorageFsBuilder {
    /// Set the provider configuration.
    pub fn config(mut self, config: FsConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the provider.
    pub fn build(self) -> StorageFs {
        let virtual_dirs = Arc::new(VirtualDirectoryTracker::new());
        StorageFs {
            marker: self.marker,
            roots: RootResolver::new(self.registry),
            entries: EntryResolver::new(Arc::clone(&virtual_dirs)),
            virtual_dirs,
            events: ChangeEmitter::new(self.config.event_capacity),
            config: self.config,
        }
    }
}

impl StorageFs {
    /// Start building a provider for `marker` roots found through `registry`.
    pub fn builder(marker: RootMarker, registry: Arc<dyn RootRegistry>) -> StorageFsBuilder {
        StorageFsBuilder {
            marker,
            registry,
            config: FsConfig::default(),
        }
    }

    /// Provider for `Blob Containers` URIs with default configuration.
    pub fn blob_containers(registry: Arc<dyn RootRegistry>) -> Self {
        Self::builder(RootMarker::BlobContainers, registry).build()
    }

    /// Provider for `File Shares` URIs with default configuration.
    pub fn file_shares(registry: Arc<dyn RootRegistry>) -> Self {
        Self::builder(RootMarker::FileShares, registry).build()
    }

    pub fn marker(&self) -> RootMarker {
        self.marker
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// Receive batches of change events for mutations made through this provider.
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<FileChangeEvent>> {
        self.events.subscribe()
    }

    /// Clear the root cache and every pending virtual directory.
    pub fn dispose(&self) {
        self.roots.clear();
        self.virtual_dirs.clear();

        #[cfg(feature = "logging")]
        tracing::debug!(marker = self.marker.segment(), "provider disposed");
    }

    /// Number of roots currently cached.
    pub fn cached_roots(&self) -> usize {
        self.roots.cached()
    }

    /// Pending virtual directories (relative paths) in the root `uri` belongs to.
    pub fn pending_directories(&self, uri: &str) -> Vec<String> {
        let path = path::parse(uri, self.marker);
        self.virtual_dirs.pending(&path.root)
    }

    /// [`read_directory`](FileSystemProvider::read_directory) with a
    /// cancellation signal checked before every listing page.
    pub async fn read_directory_with_cancel(
        &self,
        uri: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<DirEntry>> {
        let path = self.begin("read_directory", uri);
        let result = self.list(&path, cancel).await;
        self.finish("read_directory", uri, &path, result)
    }

    /// [`delete`](FileSystemProvider::delete) with a cancellation signal
    /// checked between remote calls.
    pub async fn delete_with_cancel(
        &self,
        uri: &str,
        options: DeleteOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let path = self.begin("delete", uri);
        let result = self.remove(&path, options, cancel).await;
        if matches!(result, Ok(()) | Err(Error::PartialDelete { .. })) {
            self.virtual_dirs
                .retire_subtree(&path.root, &path.relative_path());
            self.events.emit(FileChangeKind::Deleted, uri);
        }
        self.finish("delete", uri, &path, result)
    }

    #[cfg_attr(not(feature = "logging"), allow(unused_variables))]
    fn begin(&self, op: &'static str, uri: &str) -> ParsedPath {
        #[cfg(feature = "logging")]
        tracing::debug!(
            op,
            uri = %crate::logging_impl::format_uri_for_log(uri, &self.config.log),
            "storagefs call"
        );

        path::parse(uri, self.marker)
    }

    /// Log a failed call. Not-found on a probe path is expected and logged quietly.
    #[cfg_attr(not(feature = "logging"), allow(unused_variables))]
    fn finish<T>(
        &self,
        op: &'static str,
        uri: &str,
        path: &ParsedPath,
        result: Result<T>,
    ) -> Result<T> {
        #[cfg(feature = "logging")]
        if let Err(e) = &result {
            let uri = crate::logging_impl::format_uri_for_log(uri, &self.config.log);
            let message = e.to_string();
            let error = self.config.log.redact_value(&message);
            if e.is_not_found() && path.is_probe(&self.config) {
                tracing::debug!(op, %uri, %error, "probe not found");
            } else {
                tracing::warn!(op, %uri, %error, "storagefs call failed");
            }
        }
        result
    }

    async fn root(&self, path: &ParsedPath) -> Result<Arc<StorageRoot>> {
        self.roots.resolve(&path.root).await
    }

    async fn status(&self, path: &ParsedPath) -> Result<FileStat> {
        let root = self.root(path).await?;
        let entry = self
            .entries
            .lookup(&root, path, &CancellationToken::new())
            .await?;
        Ok(FileStat::new(entry.file_type()))
    }

    async fn list(&self, path: &ParsedPath, cancel: &CancellationToken) -> Result<Vec<DirEntry>> {
        let root = self.root(path).await?;
        let entry = self.entries.lookup_as_directory(&root, path, cancel).await?;
        let dir = entry.path();
        let client = root.client();
        let children = client.children(dir, cancel).await?;

        // A blob and a prefix sharing a name list once, as the directory.
        let mut seen: HashSet<String> = children.directories.iter().cloned().collect();
        let mut listing: Vec<DirEntry> = children
            .files
            .into_iter()
            .filter(|f| !seen.contains(&f.name))
            .map(|f| DirEntry::new(f.name, FileType::File))
            .collect();
        listing.extend(
            children
                .directories
                .into_iter()
                .map(|d| DirEntry::new(d, FileType::Directory)),
        );
        if client.is_blob() {
            for name in self.virtual_dirs.children(root.identity(), dir) {
                if seen.insert(name.clone()) {
                    listing.push(DirEntry::new(name, FileType::Directory));
                }
            }
        }
        Ok(listing)
    }

    async fn make_directory(&self, path: &ParsedPath) -> Result<()> {
        let root = self.root(path).await?;
        let client = root.client();
        let rel = path.relative_path();
        if path.is_root() {
            return Err(Error::AlreadyExists(client.display(&rel)));
        }
        if client.is_blob() {
            names::validate_blob_directory(&path.base_name)?;
        } else {
            names::validate_share_directory(&path.base_name)?;
        }

        let cancel = CancellationToken::new();
        match self.entries.lookup(&root, path, &cancel).await {
            Ok(_) => return Err(Error::AlreadyExists(client.display(&rel))),
            Err(Error::EntryNotFound(_)) => {}
            Err(e) => return Err(e),
        }
        self.entries
            .lookup_as_directory(&root, &path.parent(), &cancel)
            .await?;

        if client.is_blob() {
            self.virtual_dirs.mark_pending(root.identity(), &rel)
        } else {
            client
                .create_directory(&path.parent_dir(), &path.base_name)
                .await
        }
    }

    async fn read(&self, path: &ParsedPath) -> Result<Vec<u8>> {
        let root = self.root(path).await?;
        self.entries
            .lookup_as_file(&root, path, &CancellationToken::new())
            .await?;
        root.client().read(&path.parent_dir(), &path.base_name).await
    }

    /// Returns whether the file already existed.
    async fn write(
        &self,
        path: &ParsedPath,
        content: &[u8],
        options: WriteOptions,
    ) -> Result<bool> {
        let rel = path.relative_path();
        if !options.create && !options.overwrite {
            return Err(Error::NoPermissions(join(&path.root.name, &rel)));
        }
        let root = self.root(path).await?;
        let client = root.client();

        let exists = match self
            .entries
            .lookup(&root, path, &CancellationToken::new())
            .await
        {
            Ok(Entry::File { .. }) => true,
            Ok(_) => return Err(Error::FileIsADirectory(client.display(&rel))),
            Err(Error::EntryNotFound(_)) => false,
            Err(e) => return Err(e),
        };
        if !exists && !options.create {
            return Err(Error::EntryNotFound(client.display(&rel)));
        }
        if exists && !options.overwrite {
            return Err(Error::FileExists(client.display(&rel)));
        }

        let parent_dir = path.parent_dir();
        client
            .write(
                &parent_dir,
                &path.base_name,
                content,
                content_type::from_name(&path.base_name),
            )
            .await?;

        if client.is_blob() {
            self.virtual_dirs.retire(root.identity(), &parent_dir);
        }
        Ok(exists)
    }

    async fn remove(
        &self,
        path: &ParsedPath,
        options: DeleteOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !options.recursive {
            return Err(Error::NotSupported(format!(
                "non-recursive delete: {}",
                path.relative_path()
            )));
        }
        let root = self.root(path).await?;
        let client = root.client();
        if path.is_root() {
            return Err(Error::InvalidOperation(format!(
                "cannot delete {}",
                root.identity().root_path()
            )));
        }

        match self.entries.lookup(&root, path, cancel).await? {
            Entry::File { .. } => {
                client
                    .delete_file(&path.parent_dir(), &path.base_name)
                    .await
            }
            Entry::Directory { path: dir } | Entry::VirtualDirectory { path: dir } => {
                delete_tree(&client, &dir, cancel).await
            }
            Entry::Root => Err(Error::InvalidOperation(format!(
                "cannot delete {}",
                root.identity().root_path()
            ))),
        }
    }
}

/// Delete everything under `dir` using an explicit worklist.
///
/// Per-child failures are collected and the walk continues; they are
/// reported together as [`Error::PartialDelete`]. Cancellation stops the walk
/// immediately. Blob folder markers go with their directory's files; share
/// directories are removed after their contents, deepest first.
async fn delete_tree(client: &RootClient, dir: &str, cancel: &CancellationToken) -> Result<()> {
    let mut worklist = vec![dir.to_string()];
    let mut visited = Vec::new();
    let mut failed = Vec::new();
    let mut deleted = 0usize;

    while let Some(current) = worklist.pop() {
        let children = match client.children(&current, cancel).await {
            Ok(children) => children,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                failed.push(failure(&current, &e));
                continue;
            }
        };

        for file in children.files {
            cancel.check()?;
            match client.delete_file(&current, &file.name).await {
                Ok(()) => deleted += 1,
                Err(e) => failed.push(failure(&join(&current, &file.name), &e)),
            }
        }
        if children.marker {
            cancel.check()?;
            match client.delete_marker(&current).await {
                Ok(()) => deleted += 1,
                Err(e) => failed.push(failure(&format!("{current}/"), &e)),
            }
        }
        worklist.extend(children.directories.iter().map(|d| join(&current, d)));
        visited.push(current);
    }

    if !client.is_blob() {
        for directory in visited.iter().rev() {
            cancel.check()?;
            match client.delete_directory(directory).await {
                Ok(()) => deleted += 1,
                Err(e) => failed.push(failure(directory, &e)),
            }
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(Error::PartialDelete {
            path: client.display(dir),
            failed,
            deleted,
        })
    }
}

fn failure(path: &str, error: &Error) -> DeleteFailure {
    #[cfg(feature = "logging")]
    tracing::warn!(
        path = %crate::logging_impl::sanitize_for_log(path),
        error = %error,
        "delete of child failed"
    );

    DeleteFailure {
        path: path.to_string(),
        reason: error.to_string(),
    }
}

#[async_trait]
impl FileSystemProvider for StorageFs {
    async fn stat(&self, uri: &str) -> Result<FileStat> {
        let path = self.begin("stat", uri);
        let result = self.status(&path).await;
        self.finish("stat", uri, &path, result)
    }

    async fn read_directory(&self, uri: &str) -> Result<Vec<DirEntry>> {
        self.read_directory_with_cancel(uri, &CancellationToken::new())
            .await
    }

    async fn create_directory(&self, uri: &str) -> Result<()> {
        let path = self.begin("create_directory", uri);
        let result = self.make_directory(&path).await;
        if result.is_ok() {
            self.events.emit(FileChangeKind::Created, uri);
        }
        self.finish("create_directory", uri, &path, result)
    }

    async fn read_file(&self, uri: &str) -> Result<Vec<u8>> {
        let path = self.begin("read_file", uri);
        let result = self.read(&path).await;
        self.finish("read_file", uri, &path, result)
    }

    async fn write_file(&self, uri: &str, content: &[u8], options: WriteOptions) -> Result<()> {
        let path = self.begin("write_file", uri);
        let result = self.write(&path, content, options).await.map(|existed| {
            let kind = if existed {
                FileChangeKind::Changed
            } else {
                FileChangeKind::Created
            };
            self.events.emit(kind, uri);
        });
        self.finish("write_file", uri, &path, result)
    }

    async fn delete(&self, uri: &str, options: DeleteOptions) -> Result<()> {
        self.delete_with_cancel(uri, options, &CancellationToken::new())
            .await
    }

    async fn rename(&self, old_uri: &str, new_uri: &str, _options: RenameOptions) -> Result<()> {
        let path = self.begin("rename", old_uri);
        let result = Err(Error::NotSupported(format!(
            "rename of {} to {}",
            path.relative_path(),
            path::parse(new_uri, self.marker).relative_path()
        )));
        self.finish("rename", old_uri, &path, result)
    }

    async fn watch(&self, uri: &str, _options: WatchOptions) -> Result<()> {
        let path = self.begin("watch", uri);
        let result = Err(Error::NotSupported(format!(
            "watch of {}",
            path.relative_path()
        )));
        self.finish("watch", uri, &path, result)
    }
}

impl Drop for StorageFs {
    fn drop(&mut self) {
        self.dispose();
    }
}
