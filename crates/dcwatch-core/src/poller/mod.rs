//! Availability poller
//!
//! The Poller is responsible for:
//! - Firing a tick on a fixed interval
//! - Fetching availability for every watched configuration on each tick
//! - Comparing each response with the cached one
//! - Replacing the cache entry and notifying when they differ
//!
//! ## Architecture
//!
//! ```text
//!   interval ──tick──▶ Poller::tick()
//!                          │ spawn one task per WatchedConfig (not joined)
//!          ┌───────────────┼───────────────┐
//!          ▼               ▼               ▼
//!     poll_config     poll_config     poll_config
//!          │
//!          ├─▶ AvailabilitySource::fetch      (one request, no retry)
//!          ├─▶ AvailabilityCache::get / set   (seed, or replace on delta)
//!          └─▶ Notifier::notify               (best-effort, after set)
//! ```
//!
//! ## Per-config state
//!
//! Each plan code is either unseen (no cache entry) or seen. The first
//! successful response moves it to seen without notifying. Every later
//! response is compared with [`compare_entries`]; any difference, including a
//! different number of entries, produces exactly one notification and
//! replaces the cached response wholesale.
//!
//! ## Overlapping ticks
//!
//! Ticks never wait for the previous tick's tasks. If a request for a plan is
//! still in flight when the next tick fires, two tasks for the same plan can
//! run at once; whichever writes the cache last wins, regardless of which
//! response is newer. Tasks for different plans never touch each other's slot.

use crate::config::WatcherConfig;
use crate::error::Result;
use crate::model::{AvailabilityChange, WatchedConfig, compare_entries};
use crate::traits::{AvailabilityCache, AvailabilitySource, Notifier};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, warn};

/// Events emitted by the Poller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// Poller started
    Started { configs: usize },

    /// A tick fired and its requests were dispatched
    TickStarted { tick: u64, configs: usize },

    /// First response for a plan was stored
    CacheSeeded { plan_code: String, entries: usize },

    /// Response matched the cached one
    Unchanged { plan_code: String },

    /// Response differed from the cached one; cache replaced
    ChangeDetected { plan_code: String, changes: usize },

    /// Notification delivered
    NotificationSent { plan_code: String },

    /// Notification delivery failed (cache was still updated)
    NotifyFailed { plan_code: String, error: String },

    /// Fetch failed; nothing changed for this plan this tick
    FetchFailed { plan_code: String, error: String },

    /// Poller stopped
    Stopped { reason: String },
}

/// Result of polling one configuration
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Plan was unseen; the response now seeds the cache
    Seeded { entries: usize },

    /// Response equals the cached one
    Unchanged,

    /// Response differs; cache replaced and notification attempted
    Changed(AvailabilityChange),
}

/// Availability poller
///
/// Cheap to clone: clones share the source, cache, notifier and event channel,
/// which is how each spawned per-config task gets its own handle.
///
/// ## Lifecycle
///
/// 1. Create with [`Poller::new()`]
/// 2. Start with [`Poller::run()`] or [`Poller::run_with_shutdown()`]
/// 3. Runs until the shutdown signal is received
#[derive(Clone)]
pub struct Poller {
    inner: Arc<PollerInner>,
}

struct PollerInner {
    /// Where availability comes from
    source: Arc<dyn AvailabilitySource>,

    /// Last observed response per plan code
    cache: Arc<dyn AvailabilityCache>,

    /// Optional external notification target
    notifier: Option<Arc<dyn Notifier>>,

    /// Configurations polled on every tick
    watched: Vec<WatchedConfig>,

    /// Interval between ticks
    interval: Duration,

    /// Number of ticks fired so far
    ticks: AtomicU64,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<PollEvent>,
}

impl Poller {
    /// Create a new poller
    ///
    /// # Parameters
    ///
    /// - `source`: availability source implementation
    /// - `cache`: cache implementation, usually a fresh [`crate::MemoryCache`]
    /// - `notifier`: notification target, `None` for log-only
    /// - `config`: watcher configuration (validated here)
    ///
    /// # Returns
    ///
    /// A tuple of (poller, event_receiver) where event_receiver yields poll events
    pub fn new(
        source: Arc<dyn AvailabilitySource>,
        cache: Arc<dyn AvailabilityCache>,
        notifier: Option<Arc<dyn Notifier>>,
        config: WatcherConfig,
    ) -> Result<(Self, mpsc::Receiver<PollEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.poll.event_channel_capacity);

        let poller = Self {
            inner: Arc::new(PollerInner {
                source,
                cache,
                notifier,
                watched: config.watched,
                interval: config.poll.interval(),
                ticks: AtomicU64::new(0),
                event_tx: tx,
            }),
        };

        Ok((poller, rx))
    }

    /// Configurations polled on every tick
    pub fn watched(&self) -> &[WatchedConfig] {
        &self.inner.watched
    }

    /// Number of ticks fired so far
    pub fn tick_count(&self) -> u64 {
        self.inner.ticks.load(Ordering::SeqCst)
    }

    /// Run the poller until Ctrl-C
    pub async fn run(&self) -> Result<()> {
        self.run_with_shutdown(None).await
    }

    /// Run the poller until the given shutdown signal fires
    ///
    /// With `None`, waits for Ctrl-C instead. The first tick fires one full
    /// interval after start. Tasks still in flight at shutdown are not
    /// awaited.
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.emit_event(PollEvent::Started {
            configs: self.inner.watched.len(),
        });
        info!(
            "Polling {} configuration(s) every {:?}",
            self.inner.watched.len(),
            self.inner.interval
        );

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        };
        tokio::pin!(shutdown);

        let mut interval =
            tokio::time::interval_at(Instant::now() + self.inner.interval, self.inner.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks = IntervalStream::new(interval);

        loop {
            tokio::select! {
                Some(_) = ticks.next() => {
                    // Handles dropped on purpose: ticks never wait for each other
                    let _ = self.tick();
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(PollEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        info!("Poller stopped after {} tick(s)", self.tick_count());
        Ok(())
    }

    /// Fire one tick
    ///
    /// Spawns one task per watched configuration and returns immediately.
    /// The returned handles may be awaited (tests do) or dropped (the run
    /// loop does); dropping them does not cancel the tasks.
    pub fn tick(&self) -> Vec<JoinHandle<()>> {
        let tick = self.inner.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        let configs = self.inner.watched.len();

        info!(tick, "Sending requests to availability API...");
        self.emit_event(PollEvent::TickStarted { tick, configs });

        let handles = self
            .inner
            .watched
            .iter()
            .cloned()
            .map(|config| {
                let poller = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = poller.poll_config(&config).await {
                        error!(plan_code = %config.plan_code, "Poll failed: {}", e);
                    }
                })
            })
            .collect();

        info!(tick, "Requests sent to API");
        handles
    }

    /// Poll one configuration: fetch, compare, update cache, notify
    ///
    /// # Returns
    ///
    /// - `Ok(PollOutcome)`: what happened to the cache
    /// - `Err(Error)`: fetch or cache access failed; the cache is untouched
    ///   and no notification was sent
    ///
    /// Notification failures are not errors here: they are logged and
    /// reported as [`PollEvent::NotifyFailed`].
    pub async fn poll_config(&self, config: &WatchedConfig) -> Result<PollOutcome> {
        let entries = match self.inner.source.fetch(config).await {
            Ok(entries) => entries,
            Err(e) => {
                self.emit_event(PollEvent::FetchFailed {
                    plan_code: config.plan_code.clone(),
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        info!(
            "Received response for {} from {}",
            config.plan_code,
            self.inner.source.source_name()
        );

        let Some(cached) = self.inner.cache.get(&config.plan_code).await? else {
            let count = entries.len();
            self.inner.cache.set(&config.plan_code, entries).await?;
            info!("Added {} with {} to cache", config.plan_code, config.server);
            self.emit_event(PollEvent::CacheSeeded {
                plan_code: config.plan_code.clone(),
                entries: count,
            });
            return Ok(PollOutcome::Seeded { entries: count });
        };

        let changes = compare_entries(&cached.entries, &entries);

        if changes.is_empty() {
            for entry in &entries {
                debug!(
                    "No change detected for {} with config {}",
                    config.plan_code, entry.fqn
                );
            }
            self.emit_event(PollEvent::Unchanged {
                plan_code: config.plan_code.clone(),
            });
            return Ok(PollOutcome::Unchanged);
        }

        for change in &changes {
            warn!(
                plan_code = %config.plan_code,
                index = change.index(),
                fqn = change.fqn(),
                previous = ?change.previous(),
                current = ?change.current(),
                "{} datacenters have been updated",
                config.plan_code
            );
        }

        let change = AvailabilityChange {
            plan_code: config.plan_code.clone(),
            server: config.server.clone(),
            previous: cached.entries,
            current: entries.clone(),
            changes,
            detected_at: chrono::Utc::now(),
        };

        // Cache first: a failed notification must not lose the new state
        self.inner.cache.set(&config.plan_code, entries).await?;
        info!("Updated cache for {}", config.plan_code);

        self.emit_event(PollEvent::ChangeDetected {
            plan_code: config.plan_code.clone(),
            changes: change.changes.len(),
        });

        self.deliver(&change).await;

        Ok(PollOutcome::Changed(change))
    }

    /// Hand a change to the notifier, if any
    async fn deliver(&self, change: &AvailabilityChange) {
        let Some(notifier) = &self.inner.notifier else {
            return;
        };

        match notifier.notify(change).await {
            Ok(()) => {
                info!(
                    "Sent {} notification for {}",
                    notifier.notifier_name(),
                    change.plan_code
                );
                self.emit_event(PollEvent::NotificationSent {
                    plan_code: change.plan_code.clone(),
                });
            }
            Err(e) => {
                error!(
                    "Failed to send {} notification for {}: {}",
                    notifier.notifier_name(),
                    change.plan_code,
                    e
                );
                self.emit_event(PollEvent::NotifyFailed {
                    plan_code: change.plan_code.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    /// Emit a poll event
    fn emit_event(&self, event: PollEvent) {
        match self.inner.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    "Event channel full, dropping event. Consider increasing event_channel_capacity."
                );
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("source", &self.inner.source.source_name())
            .field(
                "notifier",
                &self.inner.notifier.as_ref().map(|n| n.notifier_name()),
            )
            .field("watched", &self.inner.watched.len())
            .field("interval", &self.inner.interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AvailabilityEntry;
    use crate::state::MemoryCache;

    struct EmptySource;

    #[async_trait::async_trait]
    impl AvailabilitySource for EmptySource {
        async fn fetch(&self, _config: &WatchedConfig) -> Result<Vec<AvailabilityEntry>> {
            Ok(Vec::new())
        }

        fn source_name(&self) -> &'static str {
            "empty"
        }
    }

    #[test]
    fn test_poll_event_equality() {
        let event = PollEvent::ChangeDetected {
            plan_code: "20game01".to_string(),
            changes: 1,
        };
        assert_eq!(event.clone(), event);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = WatcherConfig::new().with_watched(Vec::new());
        let result = Poller::new(
            Arc::new(EmptySource),
            Arc::new(MemoryCache::new()),
            None,
            config,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_tick_spawns_one_task_per_config() {
        let cache = MemoryCache::new();
        let (poller, _rx) = Poller::new(
            Arc::new(EmptySource),
            Arc::new(cache.clone()),
            None,
            WatcherConfig::new(),
        )
        .unwrap();

        let handles = poller.tick();
        assert_eq!(handles.len(), poller.watched().len());
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(poller.tick_count(), 1);
        assert_eq!(cache.len().await, poller.watched().len());
    }

    #[tokio::test]
    async fn test_empty_response_seeds_cache() {
        let (poller, _rx) = Poller::new(
            Arc::new(EmptySource),
            Arc::new(MemoryCache::new()),
            None,
            WatcherConfig::new(),
        )
        .unwrap();

        let config = WatchedConfig::new("20game01", "20game01");
        let outcome = tokio_test::assert_ok!(poller.poll_config(&config).await);
        assert_eq!(outcome, PollOutcome::Seeded { entries: 0 });

        let outcome = tokio_test::assert_ok!(poller.poll_config(&config).await);
        assert_eq!(outcome, PollOutcome::Unchanged);
    }
}
