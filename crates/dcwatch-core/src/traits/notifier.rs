// # Notifier Trait
//
// Defines the interface for delivering change notifications to an external
// endpoint (chat webhook, pager, ...).
//
// ## Implementations
//
// - Discord-compatible webhook: `dcwatch-notify-discord` crate

use async_trait::async_trait;

use crate::model::AvailabilityChange;

/// Trait for notifier implementations
///
/// Delivery is best-effort. The poller has already written the cache by the
/// time `notify` is called, and it only logs a returned error. Implementations
/// therefore must not retry or block for long: one request, bounded by the
/// client timeout.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification for a detected change
    async fn notify(&self, change: &AvailabilityChange) -> Result<(), crate::Error>;

    /// Get the notifier name (for logging)
    fn notifier_name(&self) -> &'static str;
}
