//! Segment-by-segment path resolution against flat remote listings.

use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::path::ParsedPath;
use crate::remote::client::{ChildProbe, join};
use crate::root::StorageRoot;
use crate::virtual_dirs::VirtualDirectoryTracker;

/// Resolves relative paths inside a root to [`Entry`] values.
///
/// Each segment costs one or two drained listings of its parent. Pending
/// virtual directories are consulted only for blob containers, and only after
/// the remote listing came back empty for that name.
pub struct EntryResolver {
    virtual_dirs: Arc<VirtualDirectoryTracker>,
}

impl EntryResolver {
    pub fn new(virtual_dirs: Arc<VirtualDirectoryTracker>) -> Self {
        Self { virtual_dirs }
    }

    /// Walk `path` from the root.
    ///
    /// Fails with [`Error::EntryNotFound`] when a segment matches nothing and
    /// with [`Error::NotADirectory`] when the walk would have to descend into a
    /// file.
    pub async fn lookup(
        &self,
        root: &StorageRoot,
        path: &ParsedPath,
        cancel: &CancellationToken,
    ) -> Result<Entry> {
        let client = root.client();
        let mut entry = Entry::Root;
        let mut prefix = String::new();

        for segment in path.segments() {
            if matches!(entry, Entry::File { .. }) {
                return Err(Error::NotADirectory(client.display(&prefix)));
            }
            let current = join(&prefix, segment);

            let probe = client.probe_child(&prefix, segment, cancel).await?;
            entry = match probe {
                // A prefix and a blob with the same name: the directory wins.
                ChildProbe {
                    directory: true, ..
                } => Entry::Directory {
                    path: current.clone(),
                },
                ChildProbe {
                    directory: false,
                    file: Some(file),
                } => Entry::File {
                    path: current.clone(),
                    size: file.size,
                    content_type: file.content_type,
                },
                ChildProbe {
                    directory: false,
                    file: None,
                } if client.is_blob() && self.virtual_dirs.covers(root.identity(), &current) => {
                    Entry::VirtualDirectory {
                        path: current.clone(),
                    }
                }
                ChildProbe {
                    directory: false,
                    file: None,
                } => return Err(Error::EntryNotFound(client.display(&current))),
            };
            prefix = current;
        }

        Ok(entry)
    }

    /// [`lookup`](Self::lookup), failing with [`Error::NotADirectory`] on a file.
    pub async fn lookup_as_directory(
        &self,
        root: &StorageRoot,
        path: &ParsedPath,
        cancel: &CancellationToken,
    ) -> Result<Entry> {
        let entry = self.lookup(root, path, cancel).await?;
        if !entry.is_directory() {
            return Err(Error::NotADirectory(display(root, &entry)));
        }
        Ok(entry)
    }

    /// [`lookup`](Self::lookup), failing with [`Error::FileIsADirectory`] on
    /// anything but a file.
    pub async fn lookup_as_file(
        &self,
        root: &StorageRoot,
        path: &ParsedPath,
        cancel: &CancellationToken,
    ) -> Result<Entry> {
        let entry = self.lookup(root, path, cancel).await?;
        if entry.is_directory() {
            return Err(Error::FileIsADirectory(display(root, &entry)));
        }
        Ok(entry)
    }
}

fn display(root: &StorageRoot, entry: &Entry) -> String {
    join(root.name(), entry.path())
}
