//! In-memory storage account.
//!
//! Implements every collaborator trait over `HashMap`/`BTreeMap` state:
//! blob containers as flat name → bytes maps, file shares as real directory
//! trees. Listings are segmented with a configurable page size so callers'
//! pagination handling is exercised. Call counters and out-of-band mutation
//! helpers let tests observe and change remote state behind the provider's back.

// RwLock.read()/write().unwrap() only panics on lock poisoning (prior panic
// while holding lock). This is intentional - corrupted state should not propagate.
#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::{
    BlobItem, BlobPrefix, BlobService, ContinuationToken, Page, RemoteError, RemoteErrorCode,
    RemoteResult, RootRegistry, ShareItem, ShareService, StorageAccount,
};
use crate::path::{RootIdentity, RootMarker};

/// Default number of items per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 5000;

/// Snapshot of how many remote calls were made, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub get: usize,
    pub put: usize,
    pub delete: usize,
}

#[derive(Debug, Default)]
struct Counters {
    list: AtomicUsize,
    get: AtomicUsize,
    put: AtomicUsize,
    delete: AtomicUsize,
}

impl Counters {
    fn snapshot(&self) -> CallCounts {
        CallCounts {
            list: self.list.load(Ordering::SeqCst),
            get: self.get.load(Ordering::SeqCst),
            put: self.put.load(Ordering::SeqCst),
            delete: self.delete.load(Ordering::SeqCst),
        }
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
struct StoredBlob {
    content: Vec<u8>,
    content_type: Option<String>,
}

/// Slice `items` into the page addressed by `token`.
fn paginate<T>(
    items: Vec<T>,
    token: Option<&ContinuationToken>,
    page_size: usize,
) -> RemoteResult<Page<T>> {
    let start = match token {
        Some(ContinuationToken(raw)) => raw.parse::<usize>().map_err(|_| {
            RemoteError::new(
                RemoteErrorCode::Other("InvalidContinuationToken".into()),
                format!("bad continuation token: {raw}"),
            )
        })?,
        None => 0,
    };
    let page_size = page_size.max(1);
    let end = (start + page_size).min(items.len());
    let continuation = (end < items.len()).then(|| ContinuationToken(end.to_string()));
    let items = items
        .into_iter()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect();
    Ok(Page {
        items,
        continuation,
    })
}

fn not_found(code: RemoteErrorCode, what: &str) -> RemoteError {
    RemoteError::new(code, format!("{what} does not exist"))
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

/// In-memory blob service.
pub struct MemoryBlobService {
    containers: RwLock<HashMap<String, BTreeMap<String, StoredBlob>>>,
    failing_deletes: RwLock<HashSet<String>>,
    page_size: usize,
    counters: Counters,
}

impl Default for MemoryBlobService {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl MemoryBlobService {
    pub fn new(page_size: usize) -> Self {
        Self {
            containers: RwLock::new(HashMap::new()),
            failing_deletes: RwLock::new(HashSet::new()),
            page_size,
            counters: Counters::default(),
        }
    }

    pub fn create_container(&self, name: &str) {
        self.containers
            .write()
            .unwrap()
            .entry(name.to_string())
            .or_default();
    }

    pub fn has_container(&self, name: &str) -> bool {
        self.containers.read().unwrap().contains_key(name)
    }

    /// Store a blob without going through the service API (no call counted).
    pub fn insert_blob(&self, container: &str, name: &str, content: &[u8]) {
        self.containers
            .write()
            .unwrap()
            .entry(container.to_string())
            .or_default()
            .insert(
                name.to_string(),
                StoredBlob {
                    content: content.to_vec(),
                    content_type: None,
                },
            );
    }

    /// Remove a blob out-of-band. Returns whether it existed.
    pub fn remove_blob(&self, container: &str, name: &str) -> bool {
        self.containers
            .write()
            .unwrap()
            .get_mut(container)
            .is_some_and(|blobs| blobs.remove(name).is_some())
    }

    /// All blob names in a container, sorted.
    pub fn blob_names(&self, container: &str) -> Vec<String> {
        self.containers
            .read()
            .unwrap()
            .get(container)
            .map(|blobs| blobs.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn blob_content_type(&self, container: &str, name: &str) -> Option<String> {
        self.containers
            .read()
            .unwrap()
            .get(container)
            .and_then(|blobs| blobs.get(name))
            .and_then(|b| b.content_type.clone())
    }

    /// Make every `delete_blob` of `name` fail with a service error.
    pub fn fail_delete_of(&self, name: &str) {
        self.failing_deletes
            .write()
            .unwrap()
            .insert(name.to_string());
    }

    pub fn calls(&self) -> CallCounts {
        self.counters.snapshot()
    }

    fn with_container<T>(
        &self,
        container: &str,
        f: impl FnOnce(&BTreeMap<String, StoredBlob>) -> T,
    ) -> RemoteResult<T> {
        let containers = self.containers.read().unwrap();
        containers
            .get(container)
            .map(f)
            .ok_or_else(|| not_found(RemoteErrorCode::ContainerNotFound, container))
    }
}

#[async_trait]
impl BlobService for MemoryBlobService {
    async fn list_directories_by_prefix(
        &self,
        container: &str,
        prefix: &str,
        token: Option<&ContinuationToken>,
    ) -> RemoteResult<Page<BlobPrefix>> {
        Counters::bump(&self.counters.list);
        let prefixes: BTreeSet<String> = self.with_container(container, |blobs| {
            blobs
                .keys()
                .filter_map(|name| name.strip_prefix(prefix))
                .filter_map(|rest| rest.split_once('/'))
                .map(|(segment, _)| format!("{prefix}{segment}/"))
                .collect()
        })?;
        let prefixes = prefixes.into_iter().map(|name| BlobPrefix { name }).collect();
        paginate(prefixes, token, self.page_size)
    }

    async fn list_blobs_by_prefix(
        &self,
        container: &str,
        prefix: &str,
        delimiter: Option<&str>,
        token: Option<&ContinuationToken>,
    ) -> RemoteResult<Page<BlobItem>> {
        Counters::bump(&self.counters.list);
        let items: Vec<BlobItem> = self.with_container(container, |blobs| {
            blobs
                .iter()
                .filter(|(name, _)| match name.strip_prefix(prefix) {
                    Some(rest) => delimiter.is_none_or(|d| !rest.contains(d)),
                    None => false,
                })
                .map(|(name, blob)| BlobItem {
                    name: name.clone(),
                    size: Some(blob.content.len() as u64),
                    content_type: blob.content_type.clone(),
                })
                .collect()
        })?;
        paginate(items, token, self.page_size)
    }

    async fn get_blob_content(&self, container: &str, name: &str) -> RemoteResult<Vec<u8>> {
        Counters::bump(&self.counters.get);
        self.with_container(container, |blobs| blobs.get(name).map(|b| b.content.clone()))?
            .ok_or_else(|| not_found(RemoteErrorCode::BlobNotFound, name))
    }

    async fn put_blob_content(
        &self,
        container: &str,
        name: &str,
        content: &[u8],
        content_type: Option<&str>,
    ) -> RemoteResult<()> {
        Counters::bump(&self.counters.put);
        let mut containers = self.containers.write().unwrap();
        let blobs = containers
            .get_mut(container)
            .ok_or_else(|| not_found(RemoteErrorCode::ContainerNotFound, container))?;
        blobs.insert(
            name.to_string(),
            StoredBlob {
                content: content.to_vec(),
                content_type: content_type.map(str::to_string),
            },
        );
        Ok(())
    }

    async fn delete_blob(&self, container: &str, name: &str) -> RemoteResult<()> {
        Counters::bump(&self.counters.delete);
        if self.failing_deletes.read().unwrap().contains(name) {
            return Err(RemoteError::new(
                RemoteErrorCode::Other("LeaseIdMissing".into()),
                format!("there is currently a lease on the blob {name}"),
            ));
        }
        let mut containers = self.containers.write().unwrap();
        let blobs = containers
            .get_mut(container)
            .ok_or_else(|| not_found(RemoteErrorCode::ContainerNotFound, container))?;
        blobs
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found(RemoteErrorCode::BlobNotFound, name))
    }
}

#[derive(Debug, Default)]
struct ShareTree {
    /// Full directory paths; the share root `""` is implicit.
    directories: BTreeSet<String>,
    /// Full file path -> content.
    files: BTreeMap<String, Vec<u8>>,
}

impl ShareTree {
    fn has_directory(&self, path: &str) -> bool {
        path.is_empty() || self.directories.contains(path)
    }
}

/// In-memory file share service.
pub struct MemoryShareService {
    shares: RwLock<HashMap<String, ShareTree>>,
    page_size: usize,
    counters: Counters,
}

impl Default for MemoryShareService {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl MemoryShareService {
    pub fn new(page_size: usize) -> Self {
        Self {
            shares: RwLock::new(HashMap::new()),
            page_size,
            counters: Counters::default(),
        }
    }

    pub fn create_share(&self, name: &str) {
        self.shares
            .write()
            .unwrap()
            .entry(name.to_string())
            .or_default();
    }

    pub fn has_share(&self, name: &str) -> bool {
        self.shares.read().unwrap().contains_key(name)
    }

    /// Create a directory and all of its ancestors out-of-band.
    pub fn insert_directory(&self, share: &str, path: &str) {
        let mut shares = self.shares.write().unwrap();
        let tree = shares.entry(share.to_string()).or_default();
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = join(&current, segment);
            tree.directories.insert(current.clone());
        }
    }

    /// Store a file (creating its directories) out-of-band.
    pub fn insert_file(&self, share: &str, path: &str, content: &[u8]) {
        self.insert_directory(share, parent_of(path));
        self.shares
            .write()
            .unwrap()
            .entry(share.to_string())
            .or_default()
            .files
            .insert(path.to_string(), content.to_vec());
    }

    /// Every directory and file path in a share, sorted, directories suffixed with `/`.
    pub fn paths(&self, share: &str) -> Vec<String> {
        let shares = self.shares.read().unwrap();
        let Some(tree) = shares.get(share) else {
            return Vec::new();
        };
        let mut paths: Vec<String> = tree
            .directories
            .iter()
            .map(|d| format!("{d}/"))
            .chain(tree.files.keys().cloned())
            .collect();
        paths.sort();
        paths
    }

    pub fn calls(&self) -> CallCounts {
        self.counters.snapshot()
    }

    fn with_share_mut<T>(
        &self,
        share: &str,
        f: impl FnOnce(&mut ShareTree) -> RemoteResult<T>,
    ) -> RemoteResult<T> {
        let mut shares = self.shares.write().unwrap();
        let tree = shares
            .get_mut(share)
            .ok_or_else(|| not_found(RemoteErrorCode::ShareNotFound, share))?;
        f(tree)
    }
}

#[async_trait]
impl ShareService for MemoryShareService {
    async fn list_files_and_directories(
        &self,
        share: &str,
        dir_path: &str,
        token: Option<&ContinuationToken>,
    ) -> RemoteResult<Page<ShareItem>> {
        Counters::bump(&self.counters.list);
        let items = self.with_share_mut(share, |tree| {
            if !tree.has_directory(dir_path) {
                return Err(not_found(RemoteErrorCode::ResourceNotFound, dir_path));
            }
            let directories = tree
                .directories
                .iter()
                .filter(|d| parent_of(d) == dir_path)
                .map(|d| ShareItem::Directory {
                    name: d.rsplit('/').next().unwrap_or_default().to_string(),
                });
            let files = tree
                .files
                .iter()
                .filter(|(f, _)| parent_of(f) == dir_path)
                .map(|(f, content)| ShareItem::File {
                    name: f.rsplit('/').next().unwrap_or_default().to_string(),
                    size: Some(content.len() as u64),
                });
            Ok(directories.chain(files).collect::<Vec<_>>())
        })?;
        paginate(items, token, self.page_size)
    }

    async fn get_file_content(
        &self,
        share: &str,
        dir_path: &str,
        name: &str,
    ) -> RemoteResult<Vec<u8>> {
        Counters::bump(&self.counters.get);
        let path = join(dir_path, name);
        self.with_share_mut(share, |tree| {
            tree.files
                .get(&path)
                .cloned()
                .ok_or_else(|| not_found(RemoteErrorCode::ResourceNotFound, &path))
        })
    }

    async fn put_file_content(
        &self,
        share: &str,
        dir_path: &str,
        name: &str,
        content: &[u8],
        _content_type: Option<&str>,
    ) -> RemoteResult<()> {
        Counters::bump(&self.counters.put);
        self.with_share_mut(share, |tree| {
            if !tree.has_directory(dir_path) {
                return Err(not_found(RemoteErrorCode::ParentNotFound, dir_path));
            }
            tree.files.insert(join(dir_path, name), content.to_vec());
            Ok(())
        })
    }

    async fn delete_file(&self, share: &str, dir_path: &str, name: &str) -> RemoteResult<()> {
        Counters::bump(&self.counters.delete);
        let path = join(dir_path, name);
        self.with_share_mut(share, |tree| {
            tree.files
                .remove(&path)
                .map(|_| ())
                .ok_or_else(|| not_found(RemoteErrorCode::ResourceNotFound, &path))
        })
    }

    async fn create_directory(&self, share: &str, dir_path: &str, name: &str) -> RemoteResult<()> {
        Counters::bump(&self.counters.put);
        let path = join(dir_path, name);
        self.with_share_mut(share, |tree| {
            if !tree.has_directory(dir_path) {
                return Err(not_found(RemoteErrorCode::ParentNotFound, dir_path));
            }
            if tree.directories.contains(&path) || tree.files.contains_key(&path) {
                return Err(RemoteError::new(
                    RemoteErrorCode::ResourceAlreadyExists,
                    format!("{path} already exists"),
                ));
            }
            tree.directories.insert(path);
            Ok(())
        })
    }

    async fn delete_directory(&self, share: &str, path: &str) -> RemoteResult<()> {
        Counters::bump(&self.counters.delete);
        self.with_share_mut(share, |tree| {
            if !tree.directories.contains(path) {
                return Err(not_found(RemoteErrorCode::ResourceNotFound, path));
            }
            let occupied = tree.directories.iter().any(|d| parent_of(d) == path)
                || tree.files.keys().any(|f| parent_of(f) == path);
            if occupied {
                return Err(RemoteError::new(
                    RemoteErrorCode::Other("DirectoryNotEmpty".into()),
                    format!("{path} is not empty"),
                ));
            }
            tree.directories.remove(path);
            Ok(())
        })
    }
}

/// In-memory storage account owning one blob service and one share service.
pub struct MemoryAccount {
    name: String,
    blobs: Arc<MemoryBlobService>,
    shares: Arc<MemoryShareService>,
}

impl MemoryAccount {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blobs: Arc::new(MemoryBlobService::default()),
            shares: Arc::new(MemoryShareService::default()),
        }
    }

    /// Use `page_size` items per listing page for both services.
    ///
    /// Call before adding any state; the services are replaced.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.blobs = Arc::new(MemoryBlobService::new(page_size));
        self.shares = Arc::new(MemoryShareService::new(page_size));
        self
    }

    pub fn blobs(&self) -> &MemoryBlobService {
        &self.blobs
    }

    pub fn shares(&self) -> &MemoryShareService {
        &self.shares
    }
}

impl StorageAccount for MemoryAccount {
    fn name(&self) -> &str {
        &self.name
    }

    fn blob_service(&self) -> Arc<dyn BlobService> {
        self.blobs.clone()
    }

    fn share_service(&self) -> Arc<dyn ShareService> {
        self.shares.clone()
    }
}

/// In-memory account tree.
///
/// Resolves a root when an account with the identity's account name exists
/// and holds a container or share with the root's name.
#[derive(Default)]
pub struct MemoryRegistry {
    accounts: RwLock<HashMap<String, Arc<MemoryAccount>>>,
    lookups: AtomicUsize,
    delay: Option<Duration>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every lookup, so concurrent lookups overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn add_account(&self, account: Arc<MemoryAccount>) {
        self.accounts
            .write()
            .unwrap()
            .insert(account.name.clone(), account);
    }

    /// Number of `find_root` calls served.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RootRegistry for MemoryRegistry {
    async fn find_root(
        &self,
        root: &RootIdentity,
    ) -> RemoteResult<Option<Arc<dyn StorageAccount>>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let account = self.accounts.read().unwrap().get(&root.account).cloned();
        let Some(account) = account else {
            return Ok(None);
        };
        let exists = match root.marker {
            RootMarker::BlobContainers => account.blobs.has_container(&root.name),
            RootMarker::FileShares => account.shares.has_share(&root.name),
        };
        Ok(exists.then(|| account as Arc<dyn StorageAccount>))
    }
}
