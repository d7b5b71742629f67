//! Per-root client over the raw collaborator traits.
//!
//! [`RootClient`] gives blob containers and file shares one shape in terms of
//! directories and single-segment names, drains every segmented listing before
//! answering, and converts remote failures into [`Error`]s.

use futures_util::future::try_join;
use std::future::Future;
use std::sync::Arc;

use super::{BlobService, ContinuationToken, Page, RemoteResult, ShareItem, ShareService};
use crate::cancel::CancellationToken;
use crate::error::{Error, Result};

const DELIMITER: &str = "/";

/// A remote file (blob or share file) directly inside a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Single-segment name.
    pub name: String,
    pub size: Option<u64>,
    pub content_type: Option<String>,
}

/// What exists remotely under one name inside a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildProbe {
    /// A directory (share directory or blob prefix) with this name exists.
    pub directory: bool,
    /// A file with this name exists. Not queried for blob containers once a
    /// directory was found.
    pub file: Option<RemoteFile>,
}

/// Immediate children of a remote directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Children {
    pub files: Vec<RemoteFile>,
    pub directories: Vec<String>,
    /// A zero-length `dir/` folder-marker blob exists. Never listed as a
    /// file, but still has to go when the directory is deleted.
    pub marker: bool,
}

/// Blobs directly below a prefix, folder marker split out.
struct BlobListing {
    files: Vec<RemoteFile>,
    marker: bool,
}

/// Client bound to one container or share.
///
/// Directory arguments are relative paths inside the root, `/`-joined, with
/// `""` meaning the root itself.
#[derive(Clone)]
pub enum RootClient {
    Blob {
        service: Arc<dyn BlobService>,
        container: String,
    },
    Share {
        service: Arc<dyn ShareService>,
        share: String,
    },
}

impl RootClient {
    /// Name of the container or share.
    pub fn root_name(&self) -> &str {
        match self {
            RootClient::Blob { container, .. } => container,
            RootClient::Share { share, .. } => share,
        }
    }

    /// Whether this root has only virtual (prefix) directories.
    pub fn is_blob(&self) -> bool {
        matches!(self, RootClient::Blob { .. })
    }

    /// Look for a directory or file called `name` in `dir`.
    pub async fn probe_child(
        &self,
        dir: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<ChildProbe> {
        match self {
            RootClient::Blob { service, container } => {
                let prefix = blob_prefix(dir);
                let directory = drain_prefixes(service.as_ref(), container, &prefix, cancel)
                    .await?
                    .iter()
                    .any(|d| d == name);
                if directory {
                    return Ok(ChildProbe {
                        directory,
                        file: None,
                    });
                }
                let file = drain_blobs(service.as_ref(), container, &prefix, cancel)
                    .await?
                    .files
                    .into_iter()
                    .find(|f| f.name == name);
                Ok(ChildProbe { directory, file })
            }
            RootClient::Share { service, share } => {
                let items = drain_share(service.as_ref(), share, dir, cancel).await?;
                let mut probe = ChildProbe::default();
                for item in items {
                    match item {
                        ShareItem::Directory { name: n } if n == name => probe.directory = true,
                        ShareItem::File { name: n, size } if n == name => {
                            probe.file = Some(RemoteFile {
                                name: n,
                                size,
                                content_type: None,
                            })
                        }
                        _ => {}
                    }
                }
                Ok(probe)
            }
        }
    }

    /// List the immediate files and directories of `dir`.
    pub async fn children(&self, dir: &str, cancel: &CancellationToken) -> Result<Children> {
        match self {
            RootClient::Blob { service, container } => {
                let prefix = blob_prefix(dir);
                let (blobs, directories) = try_join(
                    drain_blobs(service.as_ref(), container, &prefix, cancel),
                    drain_prefixes(service.as_ref(), container, &prefix, cancel),
                )
                .await?;
                Ok(Children {
                    files: blobs.files,
                    directories,
                    marker: blobs.marker,
                })
            }
            RootClient::Share { service, share } => {
                let mut children = Children::default();
                for item in drain_share(service.as_ref(), share, dir, cancel).await? {
                    match item {
                        ShareItem::File { name, size } => children.files.push(RemoteFile {
                            name,
                            size,
                            content_type: None,
                        }),
                        ShareItem::Directory { name } => children.directories.push(name),
                    }
                }
                Ok(children)
            }
        }
    }

    pub async fn read(&self, dir: &str, name: &str) -> Result<Vec<u8>> {
        let path = join(dir, name);
        let result = match self {
            RootClient::Blob { service, container } => {
                service.get_blob_content(container, &path).await
            }
            RootClient::Share { service, share } => {
                service.get_file_content(share, dir, name).await
            }
        };
        result.map_err(|e| Error::from_remote(self.display(&path), e))
    }

    pub async fn write(
        &self,
        dir: &str,
        name: &str,
        content: &[u8],
        content_type: Option<&str>,
    ) -> Result<()> {
        let path = join(dir, name);
        let result = match self {
            RootClient::Blob { service, container } => {
                service
                    .put_blob_content(container, &path, content, content_type)
                    .await
            }
            RootClient::Share { service, share } => {
                service
                    .put_file_content(share, dir, name, content, content_type)
                    .await
            }
        };
        result.map_err(|e| Error::from_remote(self.display(&path), e))
    }

    pub async fn delete_file(&self, dir: &str, name: &str) -> Result<()> {
        let path = join(dir, name);
        let result = match self {
            RootClient::Blob { service, container } => service.delete_blob(container, &path).await,
            RootClient::Share { service, share } => service.delete_file(share, dir, name).await,
        };
        result.map_err(|e| Error::from_remote(self.display(&path), e))
    }

    /// Create a real directory. Blob containers have none to create.
    pub async fn create_directory(&self, dir: &str, name: &str) -> Result<()> {
        let path = join(dir, name);
        match self {
            RootClient::Blob { .. } => Err(Error::InvalidOperation(format!(
                "blob containers have no directory objects: {}",
                self.display(&path)
            ))),
            RootClient::Share { service, share } => service
                .create_directory(share, dir, name)
                .await
                .map_err(|e| Error::from_remote(self.display(&path), e)),
        }
    }

    /// Delete the `dir/` folder-marker blob. Share directories have none.
    pub async fn delete_marker(&self, dir: &str) -> Result<()> {
        match self {
            RootClient::Blob { service, container } => service
                .delete_blob(container, &blob_prefix(dir))
                .await
                .map_err(|e| Error::from_remote(self.display(dir), e)),
            RootClient::Share { .. } => Ok(()),
        }
    }

    /// Remove an emptied directory. A no-op for blob prefixes, which vanish
    /// with their last blob.
    pub async fn delete_directory(&self, path: &str) -> Result<()> {
        match self {
            RootClient::Blob { .. } => Ok(()),
            RootClient::Share { service, share } => service
                .delete_directory(share, path)
                .await
                .map_err(|e| Error::from_remote(self.display(path), e)),
        }
    }

    /// `root/relative` for messages.
    pub fn display(&self, path: &str) -> String {
        join(self.root_name(), path)
    }
}

/// Join two relative paths, skipping empty parts.
pub fn join(dir: &str, name: &str) -> String {
    match (dir.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => dir.to_string(),
        _ => format!("{dir}/{name}"),
    }
}

fn blob_prefix(dir: &str) -> String {
    if dir.is_empty() {
        String::new()
    } else {
        format!("{dir}{DELIMITER}")
    }
}

/// Last segment of a listed name below `prefix`, without trailing delimiter.
fn segment_below<'a>(name: &'a str, prefix: &str) -> &'a str {
    name.strip_prefix(prefix)
        .unwrap_or(name)
        .trim_end_matches(DELIMITER)
}

async fn drain_prefixes(
    service: &dyn BlobService,
    container: &str,
    prefix: &str,
    cancel: &CancellationToken,
) -> Result<Vec<String>> {
    let prefixes = drain(&join(container, prefix), cancel, |token| async move {
        service
            .list_directories_by_prefix(container, prefix, token.as_ref())
            .await
    })
    .await?;
    Ok(prefixes
        .into_iter()
        .map(|p| segment_below(&p.name, prefix).to_string())
        .filter(|name| !name.is_empty())
        .collect())
}

async fn drain_blobs(
    service: &dyn BlobService,
    container: &str,
    prefix: &str,
    cancel: &CancellationToken,
) -> Result<BlobListing> {
    let blobs = drain(&join(container, prefix), cancel, |token| async move {
        service
            .list_blobs_by_prefix(container, prefix, Some(DELIMITER), token.as_ref())
            .await
    })
    .await?;
    let mut listing = BlobListing {
        files: Vec::with_capacity(blobs.len()),
        marker: false,
    };
    for b in blobs {
        let name = segment_below(&b.name, prefix);
        // Zero-length "folder marker" blobs named `dir/` have no segment.
        if name.is_empty() || b.name.ends_with(DELIMITER) {
            listing.marker |= !prefix.is_empty() && b.name == prefix;
            continue;
        }
        listing.files.push(RemoteFile {
            name: name.to_string(),
            size: b.size,
            content_type: b.content_type,
        });
    }
    Ok(listing)
}

async fn drain_share(
    service: &dyn ShareService,
    share: &str,
    dir: &str,
    cancel: &CancellationToken,
) -> Result<Vec<ShareItem>> {
    drain(&join(share, dir), cancel, |token| async move {
        service
            .list_files_and_directories(share, dir, token.as_ref())
            .await
    })
    .await
}

/// Request pages until the continuation token runs out.
///
/// Concluding "absent" from a partial listing would be wrong, so there is no
/// early exit other than an error or cancellation.
async fn drain<T, F, Fut>(path: &str, cancel: &CancellationToken, mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<ContinuationToken>) -> Fut,
    Fut: Future<Output = RemoteResult<Page<T>>>,
{
    let mut items = Vec::new();
    let mut token = None;
    loop {
        cancel.check()?;
        let page = fetch(token.take())
            .await
            .map_err(|e| Error::from_remote(path, e))?;

        #[cfg(feature = "logging")]
        tracing::trace!(
            path = %crate::logging_impl::sanitize_for_log(path),
            items = page.items.len(),
            more = page.continuation.is_some(),
            "listing page"
        );

        items.extend(page.items);
        match page.continuation {
            Some(next) => token = Some(next),
            None => return Ok(items),
        }
    }
}
