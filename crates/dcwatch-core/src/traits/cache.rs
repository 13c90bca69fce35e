// # Availability Cache Trait
//
// Defines the interface for the last-observed-response store.
//
// ## Purpose
//
// The cache holds, per plan code, the most recent response that was found to
// differ from (or be absent from) the previous one. The poller compares every
// fresh response against it and only notifies on a delta.
//
// ## Implementations
//
// - In-memory: [`crate::state::MemoryCache`]. Nothing else: the cache is
//   deliberately lost on restart.

use async_trait::async_trait;

use crate::model::AvailabilityEntry;

/// Cached response for one plan code
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CacheRecord {
    /// The full response, in API order
    pub entries: Vec<AvailabilityEntry>,
    /// When this response was stored
    pub observed_at: chrono::DateTime<chrono::Utc>,
}

impl CacheRecord {
    /// Create a record stamped with the current time
    pub fn new(entries: Vec<AvailabilityEntry>) -> Self {
        Self {
            entries,
            observed_at: chrono::Utc::now(),
        }
    }
}

/// Trait for availability cache implementations
///
/// # Thread Safety
///
/// All methods may be called concurrently from the per-config poll tasks.
/// Each task only touches its own plan code, so implementations only need
/// per-call atomicity; `get` followed by `set` is *not* expected to be atomic.
#[async_trait]
pub trait AvailabilityCache: Send + Sync {
    /// Get the cached record for a plan code
    ///
    /// # Returns
    ///
    /// - `Ok(Some(CacheRecord))`: the plan has been seen
    /// - `Ok(None)`: the plan has never been seen
    /// - `Err(Error)`: storage error
    async fn get(&self, plan_code: &str) -> Result<Option<CacheRecord>, crate::Error>;

    /// Replace the cached record for a plan code wholesale
    async fn set(&self, plan_code: &str, entries: Vec<AvailabilityEntry>)
    -> Result<(), crate::Error>;

    /// List all cached plan codes
    async fn plan_codes(&self) -> Result<Vec<String>, crate::Error>;
}
