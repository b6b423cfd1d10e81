// src/ingest/types.rs
use crate::error::Result;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct Item {
    pub title: String,
    pub created_at: f64,   // unix seconds, fractional
    pub path: String,      // e.g. "/r/rust/comments/abc/title/"
    pub source_id: String, // e.g. "rust"
}

/// Upstream collaborator that lists recent items for a set of sources.
///
/// Implementations return at most `limit` items, newest first, and map every
/// failure to `RelayError::SourceUnavailable`.
#[async_trait::async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_recent(&self, source_ids: &[String], limit: usize) -> Result<Vec<Item>>;
    fn name(&self) -> &'static str;
}
