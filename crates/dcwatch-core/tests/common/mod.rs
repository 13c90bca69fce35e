//! Test doubles and common utilities for poller contract tests
//!
//! This module provides minimal test doubles that script upstream responses
//! and record notifications without any network access.

#![allow(dead_code)]

use dcwatch_core::error::{Error, Result};
use dcwatch_core::traits::{AvailabilitySource, Notifier};
use dcwatch_core::{
    AvailabilityChange, AvailabilityEntry, DatacenterStatus, PollEvent, WatchedConfig,
    WatcherConfig,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// One scripted answer from the source
#[derive(Debug, Clone)]
pub enum Scripted {
    Entries(Vec<AvailabilityEntry>),
    Fail(String),
}

/// An AvailabilitySource that replays scripted answers per plan code
///
/// When a plan's script runs out, the last answer is repeated.
pub struct ScriptedSource {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    last: Mutex<HashMap<String, Scripted>>,
    delay: Duration,
    started: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    /// Every fetch sleeps for `delay` before answering
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            last: Mutex::new(HashMap::new()),
            delay,
            started: Arc::new(AtomicUsize::new(0)),
            finished: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue an answer for a plan code
    pub fn push(&self, plan_code: &str, answer: Scripted) {
        self.scripts
            .lock()
            .unwrap()
            .entry(plan_code.to_string())
            .or_default()
            .push_back(answer);
    }

    /// Queue a successful answer for a plan code
    pub fn push_entries(&self, plan_code: &str, entries: Vec<AvailabilityEntry>) {
        self.push(plan_code, Scripted::Entries(entries));
    }

    /// Queue a failing answer for a plan code
    pub fn push_failure(&self, plan_code: &str, message: &str) {
        self.push(plan_code, Scripted::Fail(message.to_string()));
    }

    /// Number of fetches that have started
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Number of fetches that have answered
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    fn next_answer(&self, plan_code: &str) -> Scripted {
        let popped = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(plan_code)
            .and_then(|queue| queue.pop_front());

        let mut last = self.last.lock().unwrap();
        match popped {
            Some(answer) => {
                last.insert(plan_code.to_string(), answer.clone());
                answer
            }
            None => last
                .get(plan_code)
                .cloned()
                .unwrap_or_else(|| Scripted::Fail(format!("no script for {}", plan_code))),
        }
    }
}

#[async_trait::async_trait]
impl AvailabilitySource for ScriptedSource {
    async fn fetch(&self, config: &WatchedConfig) -> Result<Vec<AvailabilityEntry>> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let answer = self.next_answer(&config.plan_code);
        self.finished.fetch_add(1, Ordering::SeqCst);

        match answer {
            Scripted::Entries(entries) => Ok(entries),
            Scripted::Fail(message) => Err(Error::http(message)),
        }
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// A Notifier that records every change and can be told to fail
pub struct RecordingNotifier {
    received: Mutex<Vec<AvailabilityChange>>,
    attempts: AtomicUsize,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            received: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    /// A notifier whose every delivery fails
    pub fn failing() -> Self {
        let notifier = Self::new();
        notifier.set_failing(true);
        notifier
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Delivery attempts, successful or not
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Changes delivered successfully
    pub fn received(&self) -> Vec<AvailabilityChange> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, change: &AvailabilityChange) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::upstream("recording", "HTTP 500"));
        }
        self.received.lock().unwrap().push(change.clone());
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "recording"
    }
}

/// Build an entry from (datacenter, availability) pairs
pub fn entry(fqn: &str, datacenters: &[(&str, &str)]) -> AvailabilityEntry {
    AvailabilityEntry::new(
        fqn,
        datacenters
            .iter()
            .map(|(dc, availability)| DatacenterStatus::new(*dc, *availability))
            .collect(),
    )
}

/// A single-entry response with one datacenter
pub fn single(fqn: &str, datacenter: &str, availability: &str) -> Vec<AvailabilityEntry> {
    vec![entry(fqn, &[(datacenter, availability)])]
}

/// Configuration watching the given plan codes (server = plan code)
pub fn config_for(plan_codes: &[&str], interval_ms: u64) -> WatcherConfig {
    let mut config = WatcherConfig::new().with_watched(
        plan_codes
            .iter()
            .map(|code| WatchedConfig::new(*code, *code))
            .collect(),
    );
    config.poll.interval_ms = interval_ms;
    config
}

/// Drain all currently queued events
pub fn drain_events(rx: &mut mpsc::Receiver<PollEvent>) -> Vec<PollEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
