// # Cache Implementations
//
// This module provides implementations of the AvailabilityCache trait.

pub mod memory;

pub use memory::MemoryCache;
