//! Tests for the shard actor: CAS, expiry, eviction, accounting.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::super::error::CacheError;
    use super::super::shard::{SetRequest, Shard, ShardConfig};
    use super::super::value::Value;

    fn spawn(cfg: ShardConfig) -> Shard {
        Shard::spawn(0, cfg, CancellationToken::new())
    }

    fn text_req(key: &str, text: &str) -> SetRequest {
        SetRequest::new(key, Value::Text(text.to_string()))
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let shard = spawn(ShardConfig::default());

        let outcome = shard.set(text_req("k", "v")).await.unwrap();
        assert!(outcome.created);
        assert!(outcome.expires_at.is_none());

        let entry = shard.get("k").expect("entry should be present");
        assert_eq!(entry.value, Value::Text("v".to_string()));
        assert_eq!(entry.version, outcome.version);
        assert!(entry.created_at <= entry.updated_at);

        let stats = shard.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.bytes, 1);
    }

    #[tokio::test]
    async fn test_get_miss() {
        let shard = spawn(ShardConfig::default());
        assert!(shard.get("absent").is_none());
        assert_eq!(shard.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_update_keeps_created_at_and_rotates_version() {
        let shard = spawn(ShardConfig::default());

        let first = shard.set(text_req("k", "a")).await.unwrap();
        let created_at = shard.get("k").unwrap().created_at;

        let second = shard.set(text_req("k", "b")).await.unwrap();
        assert!(!second.created);
        assert_ne!(first.version, second.version);

        let entry = shard.get("k").unwrap();
        assert_eq!(entry.created_at, created_at);
        assert!(entry.updated_at >= created_at);
        assert_eq!(entry.value, Value::Text("b".to_string()));
    }

    #[tokio::test]
    async fn test_if_none_match_create_only() {
        let shard = spawn(ShardConfig::default());

        let mut req = text_req("k", "a");
        req.if_none_match = true;
        let outcome = shard.set(req).await.unwrap();
        assert!(outcome.created);

        let mut again = text_req("k", "b");
        again.if_none_match = true;
        let err = shard.set(again).await.unwrap_err();
        match err {
            CacheError::Conflict {
                expected, actual, ..
            } => {
                assert_eq!(expected, None);
                assert_eq!(actual, Some(outcome.version));
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
        assert_eq!(shard.stats().conflicts, 1);
    }

    #[tokio::test]
    async fn test_if_match_conditional_update() {
        let shard = spawn(ShardConfig::default());

        let v1 = shard.set(text_req("k", "a")).await.unwrap().version;

        let mut update = text_req("k", "b");
        update.if_match = Some(v1.clone());
        let v2 = shard.set(update).await.unwrap().version;
        assert_ne!(v1, v2);

        // The stale token must not win twice.
        let mut stale = text_req("k", "c");
        stale.if_match = Some(v1.clone());
        let err = shard.set(stale).await.unwrap_err();
        match err {
            CacheError::Conflict {
                key,
                expected,
                actual,
            } => {
                assert_eq!(key, "k");
                assert_eq!(expected, Some(v1));
                assert_eq!(actual, Some(v2));
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_if_match_on_absent_key() {
        let shard = spawn(ShardConfig::default());

        let mut req = text_req("k", "a");
        req.if_match = Some("deadbeef".to_string());
        let err = shard.set(req).await.unwrap_err();
        match err {
            CacheError::Conflict { actual, .. } => assert_eq!(actual, None),
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let shard = spawn(ShardConfig::default());
        shard.set(text_req("k", "v")).await.unwrap();

        assert!(shard.delete(Arc::from("k"), None).await.unwrap());
        assert!(!shard.delete(Arc::from("k"), None).await.unwrap());

        let stats = shard.stats();
        assert_eq!(stats.deletes, 1);
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.bytes, 0);
    }

    #[tokio::test]
    async fn test_delete_with_stale_token_conflicts() {
        let shard = spawn(ShardConfig::default());
        shard.set(text_req("k", "v")).await.unwrap();

        let err = shard
            .delete(Arc::from("k"), Some("stale".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Conflict { .. }));
        assert!(shard.get("k").is_some(), "conflicting delete must not remove");
    }

    #[tokio::test]
    async fn test_increment_fresh_and_existing() {
        let shard = spawn(ShardConfig::default());

        let first = shard.increment(Arc::from("c"), 5.0).await.unwrap();
        assert_eq!(first.value, 5.0);

        let second = shard.increment(Arc::from("c"), -2.0).await.unwrap();
        assert_eq!(second.value, 3.0);
        assert_ne!(first.version, second.version);

        let entry = shard.get("c").unwrap();
        assert_eq!(entry.value.as_number(), Some(3.0));
        assert_eq!(entry.size_bytes, 8);
    }

    #[tokio::test]
    async fn test_increment_on_non_number_rejected() {
        let shard = spawn(ShardConfig::default());
        shard.set(text_req("s", "text")).await.unwrap();

        let err = shard.increment(Arc::from("s"), 1.0).await.unwrap_err();
        assert!(matches!(err, CacheError::BadRequest(_)));
        assert_eq!(
            shard.get("s").unwrap().value,
            Value::Text("text".to_string())
        );
    }

    #[tokio::test]
    async fn test_increment_recharges_bytes_on_type_change() {
        let shard = spawn(ShardConfig::default());
        shard.set(SetRequest::new("k", Value::Number(1.0))).await.unwrap();
        shard.set(text_req("k", "a larger string payload")).await.unwrap();

        shard.increment(Arc::from("k"), 1.0).await.unwrap();
        assert_eq!(shard.stats().bytes, 8);
    }

    #[tokio::test]
    async fn test_payload_too_large() {
        let shard = spawn(ShardConfig {
            max_item_bytes: 10,
            ..ShardConfig::default()
        });

        // Exactly at the limit is accepted.
        shard.set(text_req("ok", "0123456789")).await.unwrap();
        // One byte over is rejected.
        let err = shard.set(text_req("big", "0123456789a")).await.unwrap_err();
        match err {
            CacheError::PayloadTooLarge { size, limit } => {
                assert_eq!(size, 11);
                assert_eq!(limit, 10);
            }
            other => panic!("expected PayloadTooLarge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_lazy_expiry_on_read() {
        let shard = spawn(ShardConfig {
            // Effectively disable the sweeper for this test.
            sweep_interval: Duration::from_secs(3600),
            ..ShardConfig::default()
        });

        let mut req = text_req("t", "x");
        req.ttl_ms = Some(20);
        let outcome = shard.set(req).await.unwrap();
        assert!(outcome.expires_at.is_some());

        tokio::time::sleep(Duration::from_millis(50)).await;

        // The sweeper has not run; the read must still miss.
        assert!(shard.get("t").is_none());

        // The removal is routed through the mailbox; give it a beat.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let stats = shard.stats();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_sweeper_expires_without_reads() {
        let shard = spawn(ShardConfig {
            sweep_interval: Duration::from_millis(50),
            ..ShardConfig::default()
        });

        let mut req = text_req("t", "x");
        req.ttl_ms = Some(20);
        shard.set(req).await.unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;

        let stats = shard.stats();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.expirations, 1);
    }

    #[tokio::test]
    async fn test_overwrite_discards_stale_expiry() {
        let shard = spawn(ShardConfig {
            sweep_interval: Duration::from_millis(50),
            ..ShardConfig::default()
        });

        let mut short = text_req("k", "short");
        short.ttl_ms = Some(20);
        shard.set(short).await.unwrap();

        // Replace with a TTL-less value before the record fires.
        shard.set(text_req("k", "stays")).await.unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;

        let entry = shard.get("k").expect("overwritten entry must survive");
        assert_eq!(entry.value, Value::Text("stays".to_string()));
        assert_eq!(shard.stats().expirations, 0);
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent_for_cas() {
        let shard = spawn(ShardConfig {
            sweep_interval: Duration::from_secs(3600),
            ..ShardConfig::default()
        });

        let mut req = text_req("k", "old");
        req.ttl_ms = Some(20);
        shard.set(req).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Create-only succeeds against an expired entry.
        let mut create = text_req("k", "new");
        create.if_none_match = true;
        let outcome = shard.set(create).await.unwrap();
        assert!(outcome.created);
    }

    #[tokio::test]
    async fn test_eviction_under_byte_budget() {
        let shard = spawn(ShardConfig {
            max_bytes: Some(1024),
            ..ShardConfig::default()
        });

        let payload = "a".repeat(100);
        for i in 0..20 {
            shard.set(text_req(&format!("k{i}"), &payload)).await.unwrap();
        }

        let stats = shard.stats();
        assert!(stats.entries <= 10, "entries {} over budget", stats.entries);
        assert!(stats.evictions >= 10);
        assert!(stats.bytes <= 1024);

        // The least recently set keys are gone, the newest survive.
        assert!(shard.get("k0").is_none());
        assert!(shard.get("k19").is_some());
    }

    #[tokio::test]
    async fn test_byte_accounting_matches_entry_sum() {
        let shard = spawn(ShardConfig::default());

        shard.set(text_req("a", "12345")).await.unwrap();
        shard.set(SetRequest::new("b", Value::Number(7.0))).await.unwrap();
        shard.set(SetRequest::new("c", Value::Bool(true))).await.unwrap();

        let stats = shard.stats();
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.bytes, 5 + 8 + 1);

        shard.delete(Arc::from("a"), None).await.unwrap();
        assert_eq!(shard.stats().bytes, 9);
    }

    #[tokio::test]
    async fn test_draining_refuses_new_mutations() {
        let token = CancellationToken::new();
        let shard = Shard::spawn(0, ShardConfig::default(), token.clone());

        shard.set(text_req("k", "v")).await.unwrap();
        token.cancel();
        shard.close().await;

        let err = shard.set(text_req("k2", "v")).await.unwrap_err();
        assert!(matches!(err, CacheError::Overloaded { .. }));

        // Reads keep working on the retained data.
        assert!(shard.get("k").is_some());
    }
}
