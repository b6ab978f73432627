//! Tests for value inference, sizing and version minting.

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::super::error::CacheError;
    use super::super::value::{mint_version, Value, ValueKind};

    #[test]
    fn test_infer_string() {
        let value = Value::from_wire(json!("hello"), false).unwrap();
        assert_eq!(value.kind(), ValueKind::String);
        assert_eq!(value.size_bytes(), 5);
        assert_eq!(value.to_wire(), json!("hello"));
    }

    #[test]
    fn test_infer_utf8_string_size_is_byte_length() {
        let value = Value::from_wire(json!("héllo"), false).unwrap();
        assert_eq!(value.size_bytes(), 6);
    }

    #[test]
    fn test_infer_number() {
        let value = Value::from_wire(json!(42), false).unwrap();
        assert_eq!(value.kind(), ValueKind::Number);
        assert_eq!(value.size_bytes(), 8);
        assert_eq!(value.as_number(), Some(42.0));
    }

    #[test]
    fn test_infer_boolean() {
        let value = Value::from_wire(json!(true), false).unwrap();
        assert_eq!(value.kind(), ValueKind::Boolean);
        assert_eq!(value.size_bytes(), 1);
    }

    #[test]
    fn test_infer_json_object_and_array() {
        let object = Value::from_wire(json!({"a": 1}), false).unwrap();
        assert_eq!(object.kind(), ValueKind::Json);
        assert_eq!(object.size_bytes(), r#"{"a":1}"#.len());
        assert_eq!(object.to_wire(), json!({"a": 1}));

        let array = Value::from_wire(json!([1, 2, 3]), false).unwrap();
        assert_eq!(array.kind(), ValueKind::Json);
        assert_eq!(array.to_wire(), json!([1, 2, 3]));
    }

    #[test]
    fn test_null_rejected() {
        let err = Value::from_wire(json!(null), false).unwrap_err();
        assert!(matches!(err, CacheError::BadRequest(_)));
    }

    #[test]
    fn test_base64_blob_roundtrip() {
        let value = Value::from_wire(json!("aGVsbG8="), true).unwrap();
        assert_eq!(value.kind(), ValueKind::Bytes);
        assert_eq!(value.size_bytes(), 5, "size is the decoded length");
        assert_eq!(value.to_wire(), json!("aGVsbG8="));
    }

    #[test]
    fn test_base64_requires_string() {
        let err = Value::from_wire(json!(5), true).unwrap_err();
        assert!(matches!(err, CacheError::BadRequest(_)));
    }

    #[test]
    fn test_invalid_base64_rejected() {
        let err = Value::from_wire(json!("not base64 !!!"), true).unwrap_err();
        assert!(matches!(err, CacheError::BadRequest(_)));
    }

    #[test]
    fn test_versions_are_unique() {
        let now = 1_700_000_000_000;
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(mint_version(now)), "version collision");
        }
    }

    #[test]
    fn test_versions_sort_by_mint_time() {
        let earlier = mint_version(1_700_000_000_000);
        let later = mint_version(1_700_000_000_001);
        assert!(earlier < later);
        assert_eq!(earlier.len(), later.len());
    }
}
