//! Tests for the expiration min-heap.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::ttl::ExpiryHeap;

    fn key(name: &str) -> Arc<str> {
        Arc::from(name)
    }

    #[test]
    fn test_peek_returns_earliest() {
        let mut heap = ExpiryHeap::new();
        heap.push(key("late"), 300);
        heap.push(key("early"), 100);
        heap.push(key("mid"), 200);

        let earliest = heap.peek().expect("heap should not be empty");
        assert_eq!(earliest.expires_at, 100);
        assert_eq!(earliest.key.as_ref(), "early");
    }

    #[test]
    fn test_pop_expired_in_deadline_order() {
        let mut heap = ExpiryHeap::new();
        heap.push(key("c"), 30);
        heap.push(key("a"), 10);
        heap.push(key("b"), 20);
        heap.push(key("future"), 1000);

        let due = heap.pop_expired(100, usize::MAX);
        let deadlines: Vec<i64> = due.iter().map(|rec| rec.expires_at).collect();
        assert_eq!(deadlines, vec![10, 20, 30]);
        assert_eq!(heap.len(), 1, "future record should remain");
    }

    #[test]
    fn test_pop_expired_respects_limit() {
        let mut heap = ExpiryHeap::new();
        for i in 0..10 {
            heap.push(key(&format!("k{i}")), i);
        }

        let due = heap.pop_expired(100, 3);
        assert_eq!(due.len(), 3);
        assert_eq!(heap.len(), 7);
    }

    #[test]
    fn test_pop_expired_nothing_due() {
        let mut heap = ExpiryHeap::new();
        heap.push(key("k"), 500);
        assert!(heap.pop_expired(499, usize::MAX).is_empty());
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let mut heap = ExpiryHeap::new();
        heap.push(key("k"), 500);
        let due = heap.pop_expired(500, usize::MAX);
        assert_eq!(due.len(), 1);
    }

    #[test]
    fn test_duplicate_records_for_same_key() {
        // Overwrites leave stale records behind; the heap keeps them all
        // and the shard discards mismatches at pop time.
        let mut heap = ExpiryHeap::new();
        heap.push(key("k"), 100);
        heap.push(key("k"), 200);

        let due = heap.pop_expired(300, usize::MAX);
        assert_eq!(due.len(), 2);
        assert!(due.iter().all(|rec| rec.key.as_ref() == "k"));
    }

    #[test]
    fn test_empty_heap() {
        let mut heap = ExpiryHeap::new();
        assert!(heap.is_empty());
        assert!(heap.peek().is_none());
        assert!(heap.pop_expired(i64::MAX, usize::MAX).is_empty());
    }
}
