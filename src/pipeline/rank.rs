//! Digest ranking and truncation.

use crate::models::DigestItem;

/// Order items by descending fingerprint priority.
///
/// Items without a numeric priority count as the default (0.5); equal
/// priorities keep their input order.
pub fn rank(mut items: Vec<DigestItem>) -> Vec<DigestItem> {
    // `sort_by` is stable
    items.sort_by(|a, b| b.priority().total_cmp(&a.priority()));
    items
}

/// Keep at most `max_items` items.
pub fn truncate(mut items: Vec<DigestItem>, max_items: usize) -> Vec<DigestItem> {
    items.truncate(max_items);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, fingerprint: &str) -> DigestItem {
        DigestItem {
            url: format!("https://example.com/{name}"),
            title: name.to_string(),
            fingerprint: fingerprint.to_string(),
        }
    }

    fn titles(items: &[DigestItem]) -> Vec<&str> {
        items.iter().map(|i| i.title.as_str()).collect()
    }

    #[test]
    fn test_rank_descending_priority() {
        let ranked = rank(vec![
            item("low", "daily_0.1_2026-03-14"),
            item("high", "daily_0.9_2026-03-14"),
            item("mid", "daily_0.5_2026-03-14"),
        ]);
        assert_eq!(titles(&ranked), vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_rank_defaults_are_stable() {
        let ranked = rank(vec![
            item("first", "2026-03-01"),
            item("low", "weekly_0.2_2026-03-14"),
            item("second", "2026-02-01T00:00:00Z"),
            item("top", "weekly_1.0_2026-03-14"),
            item("third", "2026-03-14"),
            item("tied", "daily_0.5_2026-03-14"),
        ]);
        assert_eq!(
            titles(&ranked),
            vec!["top", "first", "second", "third", "tied", "low"]
        );
    }

    #[test]
    fn test_truncate() {
        let items = vec![item("a", "1"), item("b", "2"), item("c", "3")];
        assert_eq!(titles(&truncate(items.clone(), 2)), vec!["a", "b"]);
        assert_eq!(truncate(items, 10).len(), 3);
    }
}
