//! Core traits for the availability watcher
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`AvailabilitySource`]: Fetch availability for one watched configuration
//! - [`Notifier`]: Deliver change notifications
//! - [`AvailabilityCache`]: Last observed response per plan code

pub mod cache;
pub mod notifier;
pub mod source;

pub use cache::{AvailabilityCache, CacheRecord};
pub use notifier::Notifier;
pub use source::AvailabilitySource;
