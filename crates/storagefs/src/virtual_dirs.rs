//! Client-side tracking of empty blob directories.
//!
//! Blob containers have no directory objects: a prefix exists only while a
//! blob lives under it. A directory created by `create_directory` is therefore
//! recorded here as *pending* until a file is written beneath it, at which
//! point the real prefix takes over and the marker is retired.
//!
//! Pending markers live only in memory and are lost when the provider is
//! dropped.

// Mutex.lock().unwrap() only panics on lock poisoning (prior panic
// while holding lock). This is intentional - corrupted state should not propagate.
#![allow(clippy::unwrap_used)]

use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::path::RootIdentity;

/// Set of pending directories across all roots of one provider.
///
/// Keys are `root_path/relative_path`. Every public method is a single
/// critical section.
#[derive(Debug, Default)]
pub struct VirtualDirectoryTracker {
    pending: Mutex<BTreeSet<String>>,
}

fn key(root: &RootIdentity, path: &str) -> String {
    format!("{}/{}", root.root_path(), path)
}

fn root_prefix(root: &RootIdentity) -> String {
    format!("{}/", root.root_path())
}

/// Keys strictly beneath `key`.
fn descendants<'a>(set: &'a BTreeSet<String>, key: &str) -> impl Iterator<Item = &'a String> {
    let prefix = format!("{key}/");
    set.range::<String, _>((Bound::Excluded(prefix.clone()), Bound::Unbounded))
        .take_while(move |k| k.starts_with(&prefix))
}

impl VirtualDirectoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `path` as a pending directory.
    ///
    /// Fails with [`Error::AlreadyExists`] if it is already pending. The
    /// check and the insert are one step, so of two concurrent calls for the
    /// same path exactly one succeeds.
    pub fn mark_pending(&self, root: &RootIdentity, path: &str) -> Result<()> {
        let inserted = self.pending.lock().unwrap().insert(key(root, path));
        if !inserted {
            return Err(Error::AlreadyExists(path.to_string()));
        }

        #[cfg(feature = "logging")]
        tracing::info!(
            path = %crate::logging_impl::sanitize_for_log(path),
            "virtual directory created"
        );

        Ok(())
    }

    pub fn is_pending(&self, root: &RootIdentity, path: &str) -> bool {
        self.pending.lock().unwrap().contains(&key(root, path))
    }

    /// Whether some pending directory lies strictly beneath `path`.
    pub fn has_pending_descendant(&self, root: &RootIdentity, path: &str) -> bool {
        let pending = self.pending.lock().unwrap();
        if path.is_empty() {
            let prefix = root_prefix(root);
            return pending
                .range::<String, _>((Bound::Excluded(prefix.clone()), Bound::Unbounded))
                .next()
                .is_some_and(|k| k.starts_with(&prefix));
        }
        descendants(&pending, &key(root, path)).next().is_some()
    }

    /// `path` is pending itself or is an ancestor of a pending directory.
    pub fn covers(&self, root: &RootIdentity, path: &str) -> bool {
        self.is_pending(root, path) || self.has_pending_descendant(root, path)
    }

    /// Names of the pending directories directly inside `dir`, including
    /// the first segment of deeper pending paths.
    pub fn children(&self, root: &RootIdentity, dir: &str) -> Vec<String> {
        let pending = self.pending.lock().unwrap();
        let prefix = if dir.is_empty() {
            root_prefix(root)
        } else {
            format!("{}/", key(root, dir))
        };
        let names: BTreeSet<&str> = pending
            .range::<String, _>((Bound::Excluded(prefix.clone()), Bound::Unbounded))
            .take_while(|k| k.starts_with(&prefix))
            .filter_map(|k| k[prefix.len()..].split('/').next())
            .filter(|name| !name.is_empty())
            .collect();
        names.into_iter().map(str::to_string).collect()
    }

    /// A file landed in `dir`: retire `dir` and each pending ancestor, walking
    /// upward and stopping at the first ancestor that is not pending.
    pub fn retire(&self, root: &RootIdentity, dir: &str) {
        let mut pending = self.pending.lock().unwrap();
        let mut current = dir;
        while !current.is_empty() {
            if !pending.remove(&key(root, current)) {
                break;
            }

            #[cfg(feature = "logging")]
            tracing::info!(
                path = %crate::logging_impl::sanitize_for_log(current),
                "virtual directory materialized"
            );

            current = current.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("");
        }
    }

    /// Remove every pending key equal to or beneath `path` (`""`: the whole root).
    pub fn retire_subtree(&self, root: &RootIdentity, path: &str) {
        let mut pending = self.pending.lock().unwrap();
        if path.is_empty() {
            let prefix = root_prefix(root);
            pending.retain(|k| !k.starts_with(&prefix));
            return;
        }
        let own = key(root, path);
        let doomed: Vec<String> = descendants(&pending, &own).cloned().collect();
        for k in doomed {
            pending.remove(&k);
        }
        pending.remove(&own);
    }

    /// Pending relative paths in `root`, sorted.
    pub fn pending(&self, root: &RootIdentity) -> Vec<String> {
        let prefix = root_prefix(root);
        self.pending
            .lock()
            .unwrap()
            .iter()
            .filter_map(|k| k.strip_prefix(&prefix))
            .map(str::to_string)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.pending.lock().unwrap().clear();
    }
}
