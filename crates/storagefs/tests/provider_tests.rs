//! End-to-end behavior of the storage filesystem provider
//!
//! Runs against the in-memory backend with a small page size so that every
//! listing spans several pages.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use storagefs::remote::memory::{MemoryAccount, MemoryRegistry};
use storagefs::{
    CancellationToken, DeleteOptions, Entry, EntryResolver, Error, FileSystemProvider, FileType,
    FsConfig, RootMarker, StorageFs, StorageRoot, VirtualDirectoryTracker, WriteOptions,
};
use tokio_test::{assert_err, assert_ok};

const CONTAINER: &str = "azurestorage://acct/Blob Containers/data";
const SHARE: &str = "azurestorage://acct/File Shares/files";

struct Harness {
    account: Arc<MemoryAccount>,
    registry: Arc<MemoryRegistry>,
}

impl Harness {
    fn new() -> Self {
        let account = Arc::new(MemoryAccount::new("acct").with_page_size(2));
        account.blobs().create_container("data");
        account.shares().create_share("files");
        let registry = Arc::new(MemoryRegistry::new());
        registry.add_account(account.clone());
        Self { account, registry }
    }

    fn blobs(&self) -> StorageFs {
        StorageFs::blob_containers(self.registry.clone())
    }

    fn shares(&self) -> StorageFs {
        StorageFs::file_shares(self.registry.clone())
    }
}

fn blob(rel: &str) -> String {
    format!("{CONTAINER}/{rel}")
}

fn share(rel: &str) -> String {
    format!("{SHARE}/{rel}")
}

fn listing(entries: Vec<storagefs::DirEntry>) -> Vec<(String, FileType)> {
    let mut names: Vec<_> = entries.into_iter().map(|e| (e.name, e.file_type)).collect();
    names.sort_by(|a, b| a.0.cmp(&b.0));
    names
}

// ============================================================================
// Lookup
// ============================================================================

#[tokio::test]
async fn lookup_twice_gives_equal_entries() {
    let h = Harness::new();
    for name in ["a/b/c.txt", "a/b/d.txt", "a/e.txt", "f.txt"] {
        h.account.blobs().insert_blob("data", name, b"x");
    }

    let resolver = EntryResolver::new(Arc::new(VirtualDirectoryTracker::new()));
    let cancel = CancellationToken::new();
    for rel in ["", "a", "a/b", "a/b/c.txt", "f.txt"] {
        let path = storagefs::path::parse(&blob(rel), RootMarker::BlobContainers);
        let root = StorageRoot::new(path.root.clone(), h.account.clone());
        let first = resolver.lookup(&root, &path, &cancel).await.unwrap();
        let second = resolver.lookup(&root, &path, &cancel).await.unwrap();
        assert_eq!(first, second, "lookup of {rel:?}");
    }
}

#[tokio::test]
async fn directory_wins_when_blob_and_prefix_collide() {
    let h = Harness::new();
    h.account.blobs().insert_blob("data", "a", b"i am a file");
    h.account.blobs().insert_blob("data", "a/inner.txt", b"x");

    let resolver = EntryResolver::new(Arc::new(VirtualDirectoryTracker::new()));
    let path = storagefs::path::parse(&blob("a"), RootMarker::BlobContainers);
    let root = StorageRoot::new(path.root.clone(), h.account.clone());
    let entry = resolver
        .lookup(&root, &path, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(entry, Entry::Directory { path: "a".into() });

    let fs = h.blobs();
    assert!(fs.stat(&blob("a")).await.unwrap().file_type.is_dir());
    // The colliding blob is not listed next to the directory.
    assert_eq!(
        listing(fs.read_directory(CONTAINER).await.unwrap()),
        vec![("a".to_string(), FileType::Directory)]
    );
}

#[tokio::test]
async fn match_beyond_first_page_is_found() {
    let h = Harness::new();
    for i in 0..9 {
        h.account.blobs().insert_blob("data", &format!("file{i}.txt"), b"x");
    }
    let fs = h.blobs();
    assert!(fs.stat(&blob("file8.txt")).await.unwrap().file_type.is_file());
    assert_eq!(fs.read_directory(CONTAINER).await.unwrap().len(), 9);
}

// ============================================================================
// Virtual directories
// ============================================================================

#[tokio::test]
async fn virtual_directory_lifecycle() {
    let h = Harness::new();
    let fs = h.blobs();

    assert_ok!(fs.create_directory(&blob("x")).await);
    assert_eq!(
        listing(fs.read_directory(CONTAINER).await.unwrap()),
        vec![("x".to_string(), FileType::Directory)]
    );
    assert_eq!(fs.pending_directories(CONTAINER), vec!["x".to_string()]);

    assert_ok!(
        fs.write_file(&blob("x/y.txt"), b"hello", WriteOptions::upsert())
            .await
    );
    assert_eq!(
        listing(fs.read_directory(CONTAINER).await.unwrap()),
        vec![("x".to_string(), FileType::Directory)]
    );
    assert!(fs.pending_directories(CONTAINER).is_empty());

    // Removing the only blob out-of-band must not resurrect the marker.
    assert!(h.account.blobs().remove_blob("data", "x/y.txt"));
    let err = fs.stat(&blob("x")).await.unwrap_err();
    assert!(matches!(err, Error::EntryNotFound(_)));
}

#[tokio::test]
async fn nested_virtual_directories_retire_together() {
    let h = Harness::new();
    let fs = h.blobs();
    assert_ok!(fs.create_directory(&blob("a")).await);
    assert_ok!(fs.create_directory(&blob("a/b")).await);
    assert_ok!(fs.create_directory(&blob("a/b/c")).await);

    assert_ok!(
        fs.write_file(&blob("a/b/c/f.md"), b"#", WriteOptions::upsert())
            .await
    );
    assert!(fs.pending_directories(CONTAINER).is_empty());
    assert_eq!(
        h.account.blobs().blob_content_type("data", "a/b/c/f.md"),
        Some("text/markdown".to_string())
    );
}

#[tokio::test]
async fn pending_directories_are_lost_with_the_provider() {
    let h = Harness::new();
    {
        let fs = h.blobs();
        assert_ok!(fs.create_directory(&blob("ephemeral")).await);
        assert!(fs.stat(&blob("ephemeral")).await.is_ok());
    }
    let fs = h.blobs();
    assert_err!(fs.stat(&blob("ephemeral")).await);
}

// ============================================================================
// Write permission matrix
// ============================================================================

#[tokio::test]
async fn write_without_create_or_overwrite_is_denied() {
    let h = Harness::new();
    h.account.blobs().insert_blob("data", "exists.txt", b"old");
    let fs = h.blobs();
    let none = WriteOptions {
        create: false,
        overwrite: false,
    };

    for rel in ["exists.txt", "missing.txt"] {
        let err = fs.write_file(&blob(rel), b"new", none).await.unwrap_err();
        assert!(matches!(err, Error::NoPermissions(_)), "{rel}: {err}");
    }
    assert_eq!(h.account.blobs().calls().put, 0);
}

#[tokio::test]
async fn write_missing_without_create_is_not_found() {
    let h = Harness::new();
    let fs = h.blobs();
    let err = fs
        .write_file(
            &blob("missing.txt"),
            b"new",
            WriteOptions {
                create: false,
                overwrite: true,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EntryNotFound(_)));
    assert!(err.is_not_found());
}

#[tokio::test]
async fn write_existing_without_overwrite_is_file_exists() {
    let h = Harness::new();
    h.account.blobs().insert_blob("data", "exists.txt", b"old");
    let fs = h.blobs();
    let err = fs
        .write_file(
            &blob("exists.txt"),
            b"new",
            WriteOptions {
                create: true,
                overwrite: false,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::FileExists(_)));
    assert_eq!(fs.read_file(&blob("exists.txt")).await.unwrap(), b"old");
}

#[tokio::test]
async fn overwrite_replaces_content() {
    let h = Harness::new();
    h.account.blobs().insert_blob("data", "exists.txt", b"old");
    let fs = h.blobs();
    assert_ok!(
        fs.write_file(
            &blob("exists.txt"),
            b"new",
            WriteOptions {
                create: false,
                overwrite: true,
            },
        )
        .await
    );
    assert_eq!(fs.read_file(&blob("exists.txt")).await.unwrap(), b"new");
}

#[tokio::test]
async fn write_beneath_a_file_is_not_a_directory() {
    let h = Harness::new();
    h.account.blobs().insert_blob("data", "f.txt", b"keep");
    let fs = h.blobs();

    for rel in ["f.txt/x", "f.txt/a/x"] {
        let err = fs
            .write_file(&blob(rel), b"y", WriteOptions::upsert())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotADirectory(_)), "{rel}: {err}");
    }
    assert_eq!(
        h.account.blobs().blob_names("data"),
        vec!["f.txt".to_string()]
    );
    assert!(fs.stat(&blob("f.txt")).await.unwrap().file_type.is_file());
    assert_eq!(fs.read_file(&blob("f.txt")).await.unwrap(), b"keep");
}

#[tokio::test]
async fn write_into_missing_blob_prefix_creates_it() {
    let h = Harness::new();
    let fs = h.blobs();
    assert_ok!(
        fs.write_file(&blob("new/dir/a.txt"), b"x", WriteOptions::upsert())
            .await
    );
    assert!(fs.stat(&blob("new/dir")).await.unwrap().file_type.is_dir());
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn recursive_delete_removes_whole_tree() {
    let h = Harness::new();
    for name in [
        "top/a.txt",
        "top/b.txt",
        "top/one/c.txt",
        "top/one/two/d.txt",
        "top/one/two/e.txt",
        "top/three/f.txt",
        "other/keep.txt",
    ] {
        h.account.blobs().insert_blob("data", name, b"x");
    }
    let fs = h.blobs();
    assert_ok!(fs.create_directory(&blob("top/one/empty")).await);
    assert_ok!(fs.create_directory(&blob("top/one/two/deeper")).await);
    assert_ok!(fs.create_directory(&blob("elsewhere")).await);

    assert_ok!(fs.delete(&blob("top"), DeleteOptions::recursive()).await);

    assert_eq!(
        h.account.blobs().blob_names("data"),
        vec!["other/keep.txt".to_string()]
    );
    assert_eq!(
        fs.pending_directories(CONTAINER),
        vec!["elsewhere".to_string()]
    );
    assert_err!(fs.stat(&blob("top")).await);
}

#[tokio::test]
async fn deleting_a_virtual_directory_retires_it() {
    let h = Harness::new();
    let fs = h.blobs();
    assert_ok!(fs.create_directory(&blob("v")).await);
    assert_ok!(fs.create_directory(&blob("v/w")).await);
    assert_ok!(fs.delete(&blob("v"), DeleteOptions::recursive()).await);
    assert!(fs.pending_directories(CONTAINER).is_empty());
    assert_eq!(h.account.blobs().calls().delete, 0);
}

#[tokio::test]
async fn non_recursive_delete_never_touches_remote_state() {
    let h = Harness::new();
    h.account.blobs().insert_blob("data", "dir/a.txt", b"x");
    let fs = h.blobs();

    for rel in ["dir", "dir/a.txt", "missing"] {
        let err = fs
            .delete(&blob(rel), DeleteOptions { recursive: false })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotSupported(_)), "{rel}: {err}");
    }
    let calls = h.account.blobs().calls();
    assert_eq!(calls.list, 0);
    assert_eq!(calls.delete, 0);
    assert_eq!(h.registry.lookups(), 0);
    assert_eq!(h.account.blobs().blob_names("data").len(), 1);
}

#[tokio::test]
async fn single_file_delete() {
    let h = Harness::new();
    h.account.blobs().insert_blob("data", "dir/a.txt", b"x");
    h.account.blobs().insert_blob("data", "dir/b.txt", b"x");
    let fs = h.blobs();
    assert_ok!(fs.delete(&blob("dir/a.txt"), DeleteOptions::recursive()).await);
    assert_eq!(
        h.account.blobs().blob_names("data"),
        vec!["dir/b.txt".to_string()]
    );
}

#[tokio::test]
async fn recursive_delete_removes_folder_marker_blobs() {
    let h = Harness::new();
    for name in ["dir/", "dir/a.txt", "dir/sub/", "dir/sub/b.txt", "dir/empty/"] {
        let content: &[u8] = if name.ends_with('/') { b"" } else { b"x" };
        h.account.blobs().insert_blob("data", name, content);
    }
    h.account.blobs().insert_blob("data", "keep/", b"");
    let fs = h.blobs();

    assert_ok!(fs.delete(&blob("dir"), DeleteOptions::recursive()).await);

    assert_eq!(
        h.account.blobs().blob_names("data"),
        vec!["keep/".to_string()]
    );
    assert!(matches!(
        fs.stat(&blob("dir")).await,
        Err(Error::EntryNotFound(_))
    ));
    assert!(fs.stat(&blob("keep")).await.unwrap().file_type.is_dir());
}

// ============================================================================
// File shares
// ============================================================================

#[tokio::test]
async fn share_round_trip() {
    let h = Harness::new();
    let fs = h.shares();

    assert_ok!(fs.create_directory(&share("docs")).await);
    assert_ok!(fs.create_directory(&share("docs/2024")).await);
    assert_ok!(
        fs.write_file(&share("docs/2024/report.txt"), b"q1", WriteOptions::upsert())
            .await
    );

    assert_eq!(
        listing(fs.read_directory(&share("docs")).await.unwrap()),
        vec![("2024".to_string(), FileType::Directory)]
    );
    assert_eq!(
        fs.read_file(&share("docs/2024/report.txt")).await.unwrap(),
        b"q1"
    );
    assert!(matches!(
        fs.create_directory(&share("docs")).await,
        Err(Error::AlreadyExists(_))
    ));

    assert_ok!(fs.delete(&share("docs"), DeleteOptions::recursive()).await);
    assert!(h.account.shares().paths("files").is_empty());
}

#[tokio::test]
async fn share_write_into_missing_directory_is_not_found() {
    let h = Harness::new();
    let fs = h.shares();
    let err = fs
        .write_file(&share("nope/a.txt"), b"x", WriteOptions::upsert())
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "{err}");
}

#[tokio::test]
async fn share_directory_names_are_validated() {
    let h = Harness::new();
    let fs = h.shares();
    for bad in ["a*b", "dots.", "a:b"] {
        let err = fs.create_directory(&share(bad)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidName(_)), "{bad:?}: {err}");
    }
}

// ============================================================================
// Roots and configuration
// ============================================================================

#[tokio::test]
async fn uri_without_marker_is_root_not_found() {
    let h = Harness::new();
    let fs = h.blobs();
    let err = fs.stat("azurestorage://acct/Queues/q").await.unwrap_err();
    assert!(matches!(err, Error::RootNotFound(_)));
    assert_eq!(h.registry.lookups(), 0);
}

#[tokio::test]
async fn configured_provider_still_serves_probes() {
    let h = Harness::new();
    let config = FsConfig::from_json(r#"{"probe_paths": ["Cargo.toml"], "event_capacity": 4}"#)
        .unwrap();
    let fs = StorageFs::builder(RootMarker::BlobContainers, h.registry.clone())
        .config(config)
        .build();
    assert_eq!(fs.config().event_capacity, 4);

    let err = fs.stat(&blob("Cargo.toml")).await.unwrap_err();
    assert!(err.is_not_found());
}
