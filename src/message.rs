//! Plain-text rendering of a relayed item.

use chrono::{TimeZone, Utc};

use crate::ingest::types::Item;

pub const DEFAULT_LINK_BASE: &str = "www.reddit.com";
const TIME_FORMAT: &str = "%H:%M:%S %m/%d/%Y";

/// Renders:
/// ```text
/// "<title>"
/// Posted in r/<sub> at <HH:MM:SS MM/DD/YYYY> UTC
/// <link_base><path>
/// ```
pub fn format_item(item: &Item, link_base: &str) -> String {
    format!(
        "\"{}\"\nPosted in r/{} at {}\n{}{}",
        item.title,
        item.source_id,
        format_created(item.created_at),
        link_base.trim_end_matches('/'),
        item.path
    )
}

fn format_created(ts: f64) -> String {
    let secs = ts.floor() as i64;
    let nanos = ((ts - ts.floor()) * 1e9) as u32;
    match Utc.timestamp_opt(secs, nanos).single() {
        Some(dt) => format!("{} UTC", dt.format(TIME_FORMAT)),
        None => "unknown time".to_string(),
    }
}
