//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use wharf_core::{CacheError, WharfResult};
use wharf_storage::{CacheAsideStore, DocumentStore, ExpiringCache, InMemoryCache, LmdbCache};

use crate::config::{ApiConfig, CacheBackendKind, CacheSettings};

/// Cache-aside store as used by the API.
///
/// Both collaborators are trait objects so the binary can pick PostgreSQL
/// plus LMDB while tests run against in-memory fakes.
pub type ApiStore = CacheAsideStore<dyn DocumentStore, dyn ExpiringCache>;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Cache-aside store for every collection.
    pub store: ApiStore,
    /// Configuration the router was built with.
    pub config: Arc<ApiConfig>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(store: ApiStore, config: ApiConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }
}

crate::impl_from_ref!(ApiStore, store);
crate::impl_from_ref!(Arc<ApiConfig>, config);
crate::impl_from_ref!(Instant, start_time);

/// Construct the expiring cache selected by `settings`.
///
/// The LMDB directory is created if missing.
pub fn build_cache(settings: &CacheSettings) -> WharfResult<Arc<dyn ExpiringCache>> {
    match settings.backend {
        CacheBackendKind::Memory => {
            tracing::info!("Using in-memory cache");
            Ok(Arc::new(InMemoryCache::new()))
        }
        CacheBackendKind::Lmdb => {
            std::fs::create_dir_all(&settings.path).map_err(|e| CacheError::Unavailable {
                reason: format!("cannot create {}: {}", settings.path.display(), e),
            })?;
            let cache = LmdbCache::new(&settings.path, settings.max_size_mb).map_err(CacheError::from)?;
            tracing::info!(
                path = %settings.path.display(),
                max_size_mb = settings.max_size_mb,
                "Using LMDB cache"
            );
            Ok(Arc::new(cache))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wharf_core::RecordId;
    use wharf_storage::CacheKey;

    async fn round_trip(cache: &dyn ExpiringCache) -> WharfResult<Option<Vec<u8>>> {
        let ports = wharf_core::Collection::new("ports")?;
        let key = CacheKey::record(&ports, &RecordId::new("p1"));
        cache
            .set_with_ttl(&key, b"{}".to_vec(), Duration::from_secs(60))
            .await?;
        Ok(cache.get(&key).await?)
    }

    #[tokio::test]
    async fn test_build_memory_cache() -> WharfResult<()> {
        let settings = CacheSettings {
            backend: CacheBackendKind::Memory,
            ..CacheSettings::default()
        };
        let cache = build_cache(&settings)?;
        assert_eq!(round_trip(cache.as_ref()).await?, Some(b"{}".to_vec()));
        Ok(())
    }

    #[tokio::test]
    async fn test_build_lmdb_cache_creates_directory() -> WharfResult<()> {
        let dir = tempfile::tempdir().map_err(|e| CacheError::Unavailable {
            reason: e.to_string(),
        })?;
        let settings = CacheSettings {
            backend: CacheBackendKind::Lmdb,
            path: dir.path().join("nested").join("cache"),
            max_size_mb: 16,
            ..CacheSettings::default()
        };
        let cache = build_cache(&settings)?;
        assert!(settings.path.exists());
        assert_eq!(round_trip(cache.as_ref()).await?, Some(b"{}".to_vec()));
        Ok(())
    }
}
