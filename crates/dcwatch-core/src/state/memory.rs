// # Memory Cache
//
// In-memory implementation of AvailabilityCache.
//
// ## Lifetime
//
// - Created empty at process start
// - Lost on restart: the first response for every plan after a restart only
//   seeds the cache, it never produces a notification
// - Never explicitly destroyed

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::AvailabilityEntry;
use crate::traits::cache::{AvailabilityCache, CacheRecord};

/// In-memory availability cache
///
/// Stores one [`CacheRecord`] per plan code in a HashMap protected by a
/// RwLock. Cloning shares the underlying map.
///
/// # Example
///
/// ```rust,no_run
/// use dcwatch_core::state::MemoryCache;
/// use dcwatch_core::traits::AvailabilityCache;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let cache = MemoryCache::new();
///
///     cache.set("20game01", Vec::new()).await?;
///     assert!(cache.get("20game01").await?.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    inner: Arc<RwLock<HashMap<String, CacheRecord>>>,
}

impl MemoryCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of cached plans
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Get the cached entries for a plan, without the timestamp
    pub async fn entries(&self, plan_code: &str) -> Option<Vec<AvailabilityEntry>> {
        self.inner
            .read()
            .await
            .get(plan_code)
            .map(|record| record.entries.clone())
    }
}

#[async_trait]
impl AvailabilityCache for MemoryCache {
    async fn get(&self, plan_code: &str) -> Result<Option<CacheRecord>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(plan_code).cloned())
    }

    async fn set(&self, plan_code: &str, entries: Vec<AvailabilityEntry>) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(plan_code.to_string(), CacheRecord::new(entries));
        Ok(())
    }

    async fn plan_codes(&self) -> Result<Vec<String>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.keys().cloned().collect())
    }
}
