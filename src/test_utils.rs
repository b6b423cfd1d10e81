//! In-memory collaborators for tests and local experiments.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::engine::Clock;
use crate::error::{RelayError, Result};
use crate::ingest::types::{ContentSource, Item};
use crate::notify::RelaySink;
use crate::watermark::{Watermark, WatermarkStore};

pub fn item(sub: &str, created_at: f64) -> Item {
    Item {
        title: format!("{sub} post at {created_at}"),
        created_at,
        path: format!("/r/{sub}/comments/{}/", created_at as i64),
        source_id: sub.to_string(),
    }
}

/// Source that replays scripted responses; the last one repeats forever.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    script: Arc<Mutex<VecDeque<Result<Vec<Item>>>>>,
    last: Arc<Mutex<Option<Vec<Item>>>>,
    calls: Arc<Mutex<Vec<(Vec<String>, usize)>>>,
}

impl ScriptedSource {
    pub fn returning(items: Vec<Item>) -> Self {
        let s = Self::default();
        s.push_ok(items);
        s
    }

    pub fn push_ok(&self, items: Vec<Item>) {
        self.script.lock().unwrap().push_back(Ok(items));
    }

    pub fn push_err(&self, msg: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(RelayError::SourceUnavailable(msg.to_string())));
    }

    /// (source ids, limit) of every call so far.
    pub fn calls(&self) -> Vec<(Vec<String>, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ContentSource for ScriptedSource {
    async fn fetch_recent(&self, source_ids: &[String], limit: usize) -> Result<Vec<Item>> {
        self.calls
            .lock()
            .unwrap()
            .push((source_ids.to_vec(), limit));
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(items)) => {
                *self.last.lock().unwrap() = Some(items.clone());
                Ok(items.into_iter().take(limit).collect())
            }
            Some(Err(e)) => Err(e),
            None => Ok(self
                .last
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_default()
                .into_iter()
                .take(limit)
                .collect()),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Sink that records every attempt; messages containing `fail_on` fail.
#[derive(Clone, Default)]
pub struct RecordingSink {
    delivered: Arc<Mutex<Vec<String>>>,
    attempts: Arc<AtomicUsize>,
    fail_on: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_when_contains(&self, needle: &str) {
        self.fail_on.lock().unwrap().push(needle.to_string());
    }

    pub fn delivered(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RelaySink for RecordingSink {
    async fn deliver(&self, message: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let fail = self
            .fail_on
            .lock()
            .unwrap()
            .iter()
            .any(|n| message.contains(n.as_str()));
        if fail {
            return Err(RelayError::SinkUnavailable("scripted failure".into()));
        }
        self.delivered.lock().unwrap().push(message.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Clock that returns whatever it was last set to.
#[derive(Clone)]
pub struct FixedClock(Arc<Mutex<f64>>);

impl FixedClock {
    pub fn at(ts: f64) -> Self {
        Self(Arc::new(Mutex::new(ts)))
    }

    pub fn set(&self, ts: f64) {
        *self.0.lock().unwrap() = ts;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> f64 {
        *self.0.lock().unwrap()
    }
}

/// Store whose reads or writes can be made to fail.
#[derive(Clone, Default)]
pub struct FlakyWatermarkStore {
    value: Arc<Mutex<Option<Watermark>>>,
    fail_reads: Arc<Mutex<bool>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl FlakyWatermarkStore {
    pub fn with_value(ts: f64) -> Self {
        let s = Self::default();
        *s.value.lock().unwrap() = Some(Watermark::new(ts));
        s
    }

    pub fn fail_reads(&self, on: bool) {
        *self.fail_reads.lock().unwrap() = on;
    }

    pub fn fail_writes(&self, on: bool) {
        *self.fail_writes.lock().unwrap() = on;
    }

    pub fn current(&self) -> Option<Watermark> {
        *self.value.lock().unwrap()
    }
}

impl WatermarkStore for FlakyWatermarkStore {
    fn read(&self) -> Result<Watermark> {
        if *self.fail_reads.lock().unwrap() {
            return Err(RelayError::StoreUnavailable("read refused".into()));
        }
        Ok(self.current().unwrap_or(Watermark::UNSET))
    }

    fn write(&self, watermark: Watermark) -> Result<()> {
        if *self.fail_writes.lock().unwrap() {
            return Err(RelayError::StoreUnavailable("write refused".into()));
        }
        *self.value.lock().unwrap() = Some(watermark);
        Ok(())
    }
}
