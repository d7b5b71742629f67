//! Host-facing virtual filesystem contract.

use async_trait::async_trait;

use crate::error::Result;

/// Virtual filesystem operations addressed by URI.
///
/// Implementations map a hierarchical URI space onto some backing store.
/// Every call is independent; implementations may cache, but a call never
/// depends on the outcome of an earlier one.
#[async_trait]
pub trait FileSystemProvider: Send + Sync {
    /// Classify the entry at `uri`.
    async fn stat(&self, uri: &str) -> Result<FileStat>;

    /// List the immediate children of a directory.
    async fn read_directory(&self, uri: &str) -> Result<Vec<DirEntry>>;

    /// Create an empty directory.
    async fn create_directory(&self, uri: &str) -> Result<()>;

    /// Read a file's contents.
    async fn read_file(&self, uri: &str) -> Result<Vec<u8>>;

    /// Write contents to a file, subject to `options`.
    async fn write_file(&self, uri: &str, content: &[u8], options: WriteOptions) -> Result<()>;

    /// Delete a file or directory.
    async fn delete(&self, uri: &str, options: DeleteOptions) -> Result<()>;

    /// Rename/move a file or directory.
    async fn rename(&self, old_uri: &str, new_uri: &str, options: RenameOptions) -> Result<()>;

    /// Subscribe to changes under `uri`.
    async fn watch(&self, uri: &str, options: WatchOptions) -> Result<()>;
}

/// Entry metadata.
///
/// Timestamps and size are reported as zero: remote properties are not
/// fetched for stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub file_type: FileType,
    pub size: u64,
    pub ctime: u64,
    pub mtime: u64,
}

impl FileStat {
    pub fn new(file_type: FileType) -> Self {
        Self {
            file_type,
            size: 0,
            ctime: 0,
            mtime: 0,
        }
    }
}

/// File type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// Regular file
    File,
    /// Directory
    Directory,
}

impl FileType {
    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name (not full path)
    pub name: String,
    pub file_type: FileType,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, file_type: FileType) -> Self {
        Self {
            name: name.into(),
            file_type,
        }
    }
}

/// Flags for [`FileSystemProvider::write_file`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// A missing target may be created.
    pub create: bool,
    /// An existing target may be replaced.
    pub overwrite: bool,
}

impl WriteOptions {
    /// Create or replace.
    pub fn upsert() -> Self {
        Self {
            create: true,
            overwrite: true,
        }
    }
}

/// Flags for [`FileSystemProvider::delete`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    pub recursive: bool,
}

impl DeleteOptions {
    pub fn recursive() -> Self {
        Self { recursive: true }
    }
}

/// Flags for [`FileSystemProvider::rename`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenameOptions {
    pub overwrite: bool,
}

/// Flags for [`FileSystemProvider::watch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchOptions {
    pub recursive: bool,
    pub excludes: Vec<String>,
}
