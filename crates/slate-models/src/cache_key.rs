//! Content-addressed keys for cached AI responses.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Default lifetime of a cached AI response: 7 days.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Build a stable cache key for a request.
///
/// The request is normalized first: object keys are sorted, `null` members
/// (absent optionals) are stripped, and arrays keep their order since order is
/// meaningful. The canonical JSON is then hashed with SHA-256.
pub fn build_key<T: Serialize + ?Sized>(request: &T) -> String {
    // Serialization of plain data does not fail; fall back to null if it does.
    let value = serde_json::to_value(request).unwrap_or(Value::Null);
    let canonical = normalize(value).to_string();
    format!("{:x}", Sha256::digest(canonical.as_bytes()))
}

fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> =
                map.into_iter().filter(|(_, v)| !v.is_null()).collect();
            // Explicit sort: the key must not depend on serde_json's `preserve_order`.
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));

            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(key, val)| (key, normalize(val)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        other => other,
    }
}

/// A cached AI response row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub endpoint: String,
    pub cache_key: String,
    pub response: Value,
    #[serde(default)]
    pub project_id: Option<String>,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Longest lifetime an entry can get; larger TTLs are clamped to it.
pub const MAX_CACHE_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

fn expiry_after(now: DateTime<Utc>, ttl_secs: u64) -> DateTime<Utc> {
    let secs = ttl_secs.min(MAX_CACHE_TTL_SECS) as i64;
    TimeDelta::try_seconds(secs)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl CacheEntry {
    /// Create an entry expiring `ttl_secs` from now.
    pub fn new(
        endpoint: impl Into<String>,
        cache_key: impl Into<String>,
        response: Value,
        ttl_secs: u64,
        project_id: Option<String>,
        user_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            endpoint: endpoint.into(),
            cache_key: cache_key.into(),
            response,
            project_id,
            user_id: user_id.into(),
            expires_at: expiry_after(now, ttl_secs),
            updated_at: now,
        }
    }

    /// Expired entries are treated as absent.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Request<'a> {
        scope: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        start_date: Option<&'a str>,
    }

    #[test]
    fn test_key_order_does_not_matter() {
        assert_eq!(build_key(&json!({"a": 1, "b": 2})), build_key(&json!({"b": 2, "a": 1})));
    }

    #[test]
    fn test_absent_and_null_hash_identically() {
        assert_eq!(build_key(&json!({"a": 1, "b": null})), build_key(&json!({"a": 1})));

        let skipped = Request { scope: "p1", start_date: None };
        assert_eq!(build_key(&skipped), build_key(&json!({"scope": "p1", "start_date": null})));
    }

    #[test]
    fn test_nested_objects_are_normalized() {
        let a = json!({"outer": {"y": [1, {"k": 2, "j": null}], "x": true}});
        let b = json!({"outer": {"x": true, "y": [1, {"k": 2}]}});
        assert_eq!(build_key(&a), build_key(&b));
    }

    #[test]
    fn test_array_order_matters() {
        assert_ne!(build_key(&json!({"ids": [1, 2]})), build_key(&json!({"ids": [2, 1]})));
    }

    #[test]
    fn test_key_is_sha256_hex() {
        let key = build_key(&json!({"a": 1}));
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_entry_expiry() {
        let entry = CacheEntry::new("schedule-build", "k", json!({}), 60, None, "u1");
        assert!(!entry.is_expired_at(Utc::now()));
        assert!(entry.is_expired_at(entry.expires_at));
        assert!(entry.is_expired_at(Utc::now() + chrono::Duration::seconds(61)));
    }

    #[test]
    fn test_huge_ttl_is_clamped() {
        let now = Utc::now();
        for ttl in [u64::MAX, i64::MAX as u64, 400_000 * 365 * 24 * 60 * 60] {
            let entry = CacheEntry::new("schedule-view", "k", json!({}), ttl, None, "u1");
            assert!(entry.expires_at > now);
            assert!(entry.expires_at <= Utc::now() + TimeDelta::seconds(MAX_CACHE_TTL_SECS as i64));
        }
    }
}
