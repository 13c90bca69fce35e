// # Availability Source Trait
//
// Defines the interface for fetching availability data for one watched
// configuration.
//
// ## Implementations
//
// - OVH availability endpoint: `dcwatch-source-ovh` crate
//
// ## Usage
//
// ```rust,ignore
// use dcwatch_core::{AvailabilitySource, WatchedConfig};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* AvailabilitySource implementation */;
//
//     let entries = source.fetch(&WatchedConfig::new("20game01", "20game01")).await?;
//     for entry in entries {
//         println!("{}: {} datacenters", entry.fqn, entry.datacenters.len());
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::model::{AvailabilityEntry, WatchedConfig};

/// Trait for availability source implementations
///
/// A source performs exactly one request per call. It must not retry,
/// back off, or cache: the poller calls it once per config per tick and
/// treats any error as "nothing learned this tick".
///
/// # Errors
///
/// - transport failures (connect, timeout) map to [`crate::Error::Http`]
/// - non-2xx answers map to [`crate::Error::Upstream`]
/// - a body that is not a JSON array of entries with `fqn` and
///   `datacenters` maps to [`crate::Error::MalformedResponse`]
#[async_trait]
pub trait AvailabilitySource: Send + Sync {
    /// Fetch the current availability entries for one configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<AvailabilityEntry>)`: entries in API order (may be empty)
    /// - `Err(Error)`: the request failed or the body was malformed
    async fn fetch(&self, config: &WatchedConfig)
    -> Result<Vec<AvailabilityEntry>, crate::Error>;

    /// Get the source name (for logging)
    fn source_name(&self) -> &'static str;
}
