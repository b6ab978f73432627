//! Tests for the size-aware LRU list.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::lru::SizedLru;

    fn key(name: &str) -> Arc<str> {
        Arc::from(name)
    }

    #[test]
    fn test_put_and_accounting() {
        let mut lru = SizedLru::new(None, None);
        assert!(lru.put(key("a"), 10).is_empty());
        assert!(lru.put(key("b"), 20).is_empty());

        assert_eq!(lru.len(), 2);
        assert_eq!(lru.bytes(), 30);
        assert!(lru.contains("a"));
        assert_eq!(lru.peek_tail(), Some("a"));
    }

    #[test]
    fn test_touch_promotes() {
        let mut lru = SizedLru::new(None, None);
        lru.put(key("a"), 1);
        lru.put(key("b"), 1);
        lru.put(key("c"), 1);

        assert!(lru.touch("a"));
        assert_eq!(lru.peek_tail(), Some("b"));
        assert!(!lru.touch("missing"));
    }

    #[test]
    fn test_update_replaces_size() {
        let mut lru = SizedLru::new(None, None);
        lru.put(key("a"), 100);
        lru.put(key("a"), 8);

        assert_eq!(lru.len(), 1);
        assert_eq!(lru.bytes(), 8);
    }

    #[test]
    fn test_eviction_by_entry_count() {
        let mut lru = SizedLru::new(Some(2), None);
        lru.put(key("a"), 1);
        lru.put(key("b"), 1);
        let evicted = lru.put(key("c"), 1);

        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].as_ref(), "a");
        assert_eq!(lru.len(), 2);
    }

    #[test]
    fn test_eviction_by_bytes() {
        let mut lru = SizedLru::new(None, Some(250));
        lru.put(key("a"), 100);
        lru.put(key("b"), 100);
        let evicted = lru.put(key("c"), 100);

        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].as_ref(), "a");
        assert_eq!(lru.bytes(), 200);
    }

    #[test]
    fn test_oversize_item_evicts_itself() {
        let mut lru = SizedLru::new(None, Some(50));
        let evicted = lru.put(key("huge"), 100);

        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].as_ref(), "huge");
        assert_eq!(lru.len(), 0);
        assert_eq!(lru.bytes(), 0);
    }

    #[test]
    fn test_fresh_insert_is_not_victim_unless_alone() {
        let mut lru = SizedLru::new(None, Some(150));
        lru.put(key("a"), 100);
        let evicted = lru.put(key("b"), 100);

        // The older item goes, the fresh insert stays.
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].as_ref(), "a");
        assert!(lru.contains("b"));
    }

    #[test]
    fn test_remove_returns_charged_size() {
        let mut lru = SizedLru::new(None, None);
        lru.put(key("a"), 42);

        assert_eq!(lru.remove("a"), Some(42));
        assert_eq!(lru.remove("a"), None);
        assert_eq!(lru.bytes(), 0);
        assert!(lru.is_empty());
    }

    #[test]
    fn test_slab_reuse_after_remove() {
        let mut lru = SizedLru::new(None, None);
        lru.put(key("a"), 1);
        lru.remove("a");
        lru.put(key("b"), 2);
        lru.put(key("c"), 3);

        assert_eq!(lru.len(), 2);
        assert_eq!(lru.bytes(), 5);
        assert_eq!(lru.peek_tail(), Some("b"));
    }

    #[test]
    fn test_retained_set_is_recency_suffix() {
        // Under byte pressure the survivors are exactly the most
        // recently touched suffix of the access order.
        let mut lru = SizedLru::new(None, Some(1000));
        for i in 0..20 {
            lru.put(key(&format!("k{i}")), 100);
        }

        assert_eq!(lru.len(), 10);
        for i in 0..10 {
            assert!(!lru.contains(&format!("k{i}")), "k{i} should be evicted");
        }
        for i in 10..20 {
            assert!(lru.contains(&format!("k{i}")), "k{i} should be retained");
        }
    }

    #[test]
    fn test_eviction_follows_touch_order() {
        let mut lru = SizedLru::new(None, Some(300));
        lru.put(key("a"), 100);
        lru.put(key("b"), 100);
        lru.put(key("c"), 100);
        lru.touch("a");

        let evicted = lru.put(key("d"), 100);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].as_ref(), "b", "least recently touched should go first");
    }
}
