// src/ingest/mod.rs
pub mod providers;
pub mod scheduler;
pub mod subscriptions;
pub mod types;

use crate::ingest::types::Item;
use crate::watermark::Watermark;

/// Normalize a title: decode HTML entities, collapse whitespace, trim.
pub fn normalize_title(s: &str) -> String {
    // 1) HTML entity decode (listing titles arrive as "Q&amp;A")
    let out = html_escape::decode_html_entities(s).to_string();

    // 2) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Keep only items strictly newer than the watermark, preserving fetch order.
/// Returns (kept, skipped).
pub fn filter_new(items: Vec<Item>, watermark: Watermark) -> (Vec<Item>, usize) {
    let total = items.len();
    let kept: Vec<Item> = items.into_iter().filter(|it| watermark.admits(it)).collect();
    let skipped = total - kept.len();
    (kept, skipped)
}

/// A fetch that filled the whole cap may have left older items unfetched.
pub fn is_truncated(fetched: usize, limit: usize) -> bool {
    limit > 0 && fetched >= limit
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(created_at: f64) -> Item {
        Item {
            title: format!("t{created_at}"),
            created_at,
            path: "/r/x/comments/1/".into(),
            source_id: "x".into(),
        }
    }

    #[test]
    fn normalize_title_decodes_and_collapses() {
        let s = "  Q&amp;A:\n  what&#39;s   new?  ";
        assert_eq!(normalize_title(s), "Q&A: what's new?");
    }

    #[test]
    fn filter_is_strict_at_the_boundary() {
        let items = vec![item(1100.0), item(1050.0), item(900.0), item(1000.0)];
        let (kept, skipped) = filter_new(items, Watermark::new(1000.0));
        let times: Vec<f64> = kept.iter().map(|i| i.created_at).collect();
        assert_eq!(times, vec![1100.0, 1050.0]);
        assert_eq!(skipped, 2);
    }

    #[test]
    fn unset_watermark_admits_everything() {
        let items = vec![item(0.0), item(-5.0), item(1.5)];
        let (kept, skipped) = filter_new(items, Watermark::UNSET);
        assert_eq!(kept.len(), 3);
        assert_eq!(skipped, 0);
    }

    #[test]
    fn truncation_only_when_cap_is_filled() {
        assert!(is_truncated(10, 10));
        assert!(!is_truncated(9, 10));
        assert!(!is_truncated(0, 0));
    }
}
