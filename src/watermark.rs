//! Watermark persistence.
//!
//! The watermark is the creation time at or below which every item has
//! already been handled. It is stored as a single textual float and replaced
//! with write-to-temp-then-rename so a crash mid-write keeps the old value.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{RelayError, Result};
use crate::ingest::types::Item;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Watermark(f64);

impl Watermark {
    /// Sentinel for a store that has never been written: admits every item.
    pub const UNSET: Watermark = Watermark(f64::NEG_INFINITY);

    pub fn new(ts: f64) -> Self {
        Self(ts)
    }

    pub fn as_f64(&self) -> f64 {
        self.0
    }

    pub fn is_unset(&self) -> bool {
        self.0 == f64::NEG_INFINITY
    }

    /// Items exactly at the watermark count as already seen.
    pub fn admits(&self, item: &Item) -> bool {
        item.created_at > self.0
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub trait WatermarkStore: Send + Sync {
    fn read(&self) -> Result<Watermark>;
    fn write(&self, watermark: Watermark) -> Result<()>;
}

impl<T: WatermarkStore + ?Sized> WatermarkStore for Arc<T> {
    fn read(&self) -> Result<Watermark> {
        (**self).read()
    }

    fn write(&self, watermark: Watermark) -> Result<()> {
        (**self).write(watermark)
    }
}

/// Text-file store, e.g. `conf/last_poll_time`.
#[derive(Debug, Clone)]
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "watermark".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_atomic(&self, watermark: Watermark) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let tmp = self.tmp_path();
        {
            let mut f = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp)?;
            writeln!(f, "{}", format_watermark(watermark))?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        // Directory fsync makes the rename itself durable. Not every platform
        // allows opening a directory for this, so it is best-effort.
        if let Ok(d) = File::open(&dir) {
            let _ = d.sync_all();
        }
        Ok(())
    }
}

impl WatermarkStore for FileWatermarkStore {
    fn read(&self) -> Result<Watermark> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(RelayError::StoreUnavailable(format!(
                    "reading watermark from {}: {e}",
                    self.path.display()
                )))
            }
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            tracing::info!(
                target: "relay",
                path = %self.path.display(),
                "watermark absent; initializing to sentinel"
            );
            self.write(Watermark::UNSET)?;
            return Ok(Watermark::UNSET);
        }

        parse_watermark(trimmed).ok_or_else(|| {
            RelayError::StoreUnavailable(format!(
                "unparsable watermark {trimmed:?} in {}",
                self.path.display()
            ))
        })
    }

    fn write(&self, watermark: Watermark) -> Result<()> {
        self.write_atomic(watermark).map_err(|e| {
            RelayError::StoreUnavailable(format!(
                "writing watermark to {}: {e}",
                self.path.display()
            ))
        })
    }
}

/// In-memory store; `None` behaves like an absent file.
#[derive(Debug, Default)]
pub struct MemoryWatermarkStore {
    inner: Mutex<Option<Watermark>>,
    writes: Mutex<Vec<Watermark>>,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(ts: f64) -> Self {
        Self {
            inner: Mutex::new(Some(Watermark::new(ts))),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn current(&self) -> Option<Watermark> {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every value written, in order (including sentinel initialization).
    pub fn writes(&self) -> Vec<Watermark> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl WatermarkStore for MemoryWatermarkStore {
    fn read(&self) -> Result<Watermark> {
        match self.current() {
            Some(w) => Ok(w),
            None => {
                self.write(Watermark::UNSET)?;
                Ok(Watermark::UNSET)
            }
        }
    }

    fn write(&self, watermark: Watermark) -> Result<()> {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = Some(watermark);
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(watermark);
        Ok(())
    }
}

fn format_watermark(w: Watermark) -> String {
    if w.is_unset() {
        "-inf".to_string()
    } else {
        w.as_f64().to_string()
    }
}

fn parse_watermark(s: &str) -> Option<Watermark> {
    let v: f64 = s.parse().ok()?;
    // -inf is the sentinel; +inf (or an overflowing literal) would block every item.
    if v.is_nan() || v == f64::INFINITY {
        return None;
    }
    Some(Watermark::new(v))
}
