//! Storage root resolution and caching.
//!
//! [`RootResolver`] maps a [`RootIdentity`] to the [`StorageRoot`] backing it.
//! The first resolution of an identity queries the [`RootRegistry`]; the result
//! is cached for the provider's lifetime. Concurrent first resolutions of the
//! same identity share one registry query and observe the same `StorageRoot`.

// Mutex.lock().unwrap() only panics on lock poisoning (prior panic
// while holding lock). This is intentional - corrupted state should not propagate.
#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

use crate::error::{Error, Result};
use crate::path::{RootIdentity, RootMarker};
use crate::remote::client::RootClient;
use crate::remote::{RootRegistry, StorageAccount};

/// One resolved container or share. Immutable once created.
pub struct StorageRoot {
    identity: RootIdentity,
    account: Arc<dyn StorageAccount>,
}

impl StorageRoot {
    pub fn new(identity: RootIdentity, account: Arc<dyn StorageAccount>) -> Self {
        Self { identity, account }
    }

    pub fn identity(&self) -> &RootIdentity {
        &self.identity
    }

    /// Container or share name.
    pub fn name(&self) -> &str {
        &self.identity.name
    }

    /// A fresh client for this root's service.
    pub fn client(&self) -> RootClient {
        match self.identity.marker {
            RootMarker::BlobContainers => RootClient::Blob {
                service: self.account.blob_service(),
                container: self.identity.name.clone(),
            },
            RootMarker::FileShares => RootClient::Share {
                service: self.account.share_service(),
                share: self.identity.name.clone(),
            },
        }
    }
}

impl std::fmt::Debug for StorageRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageRoot")
            .field("identity", &self.identity)
            .field("account", &self.account.name())
            .finish()
    }
}

type RootCell = Arc<OnceCell<Arc<StorageRoot>>>;

/// Cache of resolved roots with single-flight lookups.
pub struct RootResolver {
    registry: Arc<dyn RootRegistry>,
    cache: Mutex<HashMap<RootIdentity, RootCell>>,
}

impl RootResolver {
    pub fn new(registry: Arc<dyn RootRegistry>) -> Self {
        Self {
            registry,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `identity`, querying the registry at most once per identity.
    ///
    /// A failed or empty lookup is not cached; the next call queries again.
    pub async fn resolve(&self, identity: &RootIdentity) -> Result<Arc<StorageRoot>> {
        let result = self.resolve_cell(identity).await;
        if result.is_err() {
            self.evict_failed(identity);
        }
        result
    }

    async fn resolve_cell(&self, identity: &RootIdentity) -> Result<Arc<StorageRoot>> {
        if identity.name.is_empty() {
            return Err(Error::RootNotFound(identity.root_path()));
        }

        let cell = {
            let mut cache = self.cache.lock().unwrap();
            Arc::clone(cache.entry(identity.clone()).or_default())
        };

        let root = cell
            .get_or_try_init(|| async {
                let account = self
                    .registry
                    .find_root(identity)
                    .await
                    .map_err(|e| Error::from_remote(identity.root_path(), e))?
                    .ok_or_else(|| Error::RootNotFound(identity.root_path()))?;

                #[cfg(feature = "logging")]
                tracing::info!(
                    root = %crate::logging_impl::sanitize_for_log(&identity.root_path()),
                    account = account.name(),
                    "storage root cached"
                );

                Ok::<_, Error>(Arc::new(StorageRoot::new(identity.clone(), account)))
            })
            .await?;

        Ok(Arc::clone(root))
    }

    /// Drop the cell of a failed lookup unless it resolved meanwhile or another
    /// caller still holds it.
    fn evict_failed(&self, identity: &RootIdentity) {
        let mut cache = self.cache.lock().unwrap();
        if let Some(cell) = cache.get(identity)
            && !cell.initialized()
            && Arc::strong_count(cell) == 1
        {
            cache.remove(identity);
        }
    }

    /// Number of identities with a resolved root.
    pub fn cached(&self) -> usize {
        self.cache
            .lock()
            .unwrap()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    /// Forget every resolved root.
    pub fn clear(&self) {
        self.cache.lock().unwrap().clear();
    }
}
