// src/ingest/subscriptions.rs
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RelayError, Result};

/// Ordered list of sources to poll. Re-read every cycle so edits apply live.
pub trait SubscriptionList: Send + Sync {
    fn read(&self) -> Result<Vec<String>>;
}

/// File-backed list. Plain text by default; `.toml` and `.json` by extension.
#[derive(Debug, Clone)]
pub struct FileSubscriptionList {
    path: PathBuf,
}

impl FileSubscriptionList {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SubscriptionList for FileSubscriptionList {
    fn read(&self) -> Result<Vec<String>> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            RelayError::StoreUnavailable(format!(
                "reading subscriptions from {}: {e}",
                self.path.display()
            ))
        })?;
        let ext = self
            .path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_subscriptions(&content, ext.as_str()).map_err(|e| {
            RelayError::StoreUnavailable(format!(
                "parsing subscriptions in {}: {e:#}",
                self.path.display()
            ))
        })
    }
}

/// Fixed list, handy for one-shot runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSubscriptions(pub Vec<String>);

impl SubscriptionList for StaticSubscriptions {
    fn read(&self) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

pub fn parse_subscriptions(s: &str, hint_ext: &str) -> anyhow::Result<Vec<String>> {
    match hint_ext {
        "toml" => parse_toml(s),
        "json" => parse_json(s),
        _ => Ok(parse_lines(s)),
    }
}

fn parse_lines(s: &str) -> Vec<String> {
    clean_list(
        s.lines()
            .map(str::trim)
            .filter(|l| !l.starts_with('#'))
            .map(str::to_string),
    )
}

fn parse_toml(s: &str) -> anyhow::Result<Vec<String>> {
    #[derive(serde::Deserialize)]
    struct TomlSubs {
        #[serde(default)]
        subscriptions: Vec<String>,
    }
    let v: TomlSubs = toml::from_str(s)?;
    Ok(clean_list(v.subscriptions))
}

fn parse_json(s: &str) -> anyhow::Result<Vec<String>> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    let v: Vec<String> = serde_json::from_str(s)?;
    Ok(clean_list(v))
}

// Order is kept as written; duplicates are harmless upstream.
fn clean_list(items: impl IntoIterator<Item = String>) -> Vec<String> {
    items
        .into_iter()
        .map(|it| {
            let t = it.trim();
            t.strip_prefix("r/")
                .or_else(|| t.strip_prefix("/r/"))
                .unwrap_or(t)
                .trim_end_matches('/')
                .to_string()
        })
        .filter(|t| !t.is_empty())
        .collect()
}
