// # dcwatch-core
//
// Core library for the datacenter availability watcher.
//
// ## Architecture Overview
//
// - **AvailabilitySource**: Trait for fetching availability of one watched configuration
// - **Notifier**: Trait for delivering change notifications
// - **AvailabilityCache**: Trait for the last observed response per plan code
// - **Poller**: Timer loop that fetches, compares, caches and notifies
// - **compare_entries**: Typed, order-sensitive comparison of two responses
//
// ## Design Principles
//
// 1. **Injected state**: the cache is passed in, never a global
// 2. **Fire-and-forget ticks**: one task per config, ticks never wait for each other
// 3. **Single attempt**: no retry or backoff anywhere; failures are logged
// 4. **Library-First**: the daemon is a thin layer over this crate

pub mod config;
pub mod error;
pub mod model;
pub mod poller;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{ApiConfig, NotifierConfig, PollConfig, WatcherConfig};
pub use error::{Error, Result};
pub use model::{
    AvailabilityChange, AvailabilityEntry, DatacenterStatus, EntryChange, WatchedConfig,
    compare_entries, default_watched_configs,
};
pub use poller::{PollEvent, PollOutcome, Poller};
pub use state::MemoryCache;
pub use traits::{AvailabilityCache, AvailabilitySource, CacheRecord, Notifier};
