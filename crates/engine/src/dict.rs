//! Dictionary resolution and memoization.
//!
//! A dictionary is a named, server-resolved option list. The cache is an
//! explicit, injected object with a defined lifecycle: created at
//! application start, append-only, cleared only by [`DictionaryCache::invalidate`].
//! There is no TTL and no in-flight de-duplication; two concurrent callers
//! asking for the same uncached name will both hit the source.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::debug;

use formflow_types::{FieldValue, OptionEntry};

use crate::error::FormError;

/// Default row property used as the option value.
pub const DEFAULT_ROW_KEY: &str = "id";

/// Source of raw dictionary rows, typically backed by the host's request
/// layer. One call may resolve several dictionary codes at once.
#[async_trait]
pub trait DictionarySource: Send + Sync {
    /// Fetch raw rows for each requested code, keyed by code.
    async fn fetch(&self, codes: &[String]) -> anyhow::Result<HashMap<String, Vec<JsonValue>>>;
}

/// Process-wide memoized dictionary cache.
pub struct DictionaryCache {
    source: Arc<dyn DictionarySource>,
    entries: Mutex<HashMap<String, Arc<Vec<OptionEntry>>>>,
}

impl DictionaryCache {
    pub fn new(source: Arc<dyn DictionarySource>) -> Self {
        Self {
            source,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve one dictionary name into its option list, cache-first.
    pub async fn resolve(&self, name: &str, row_key: &str) -> Result<Arc<Vec<OptionEntry>>, FormError> {
        if let Some(cached) = self.cached(name) {
            debug!(dictionary = name, "dictionary cache hit");
            return Ok(cached);
        }
        debug!(dictionary = name, "dictionary cache miss, fetching");
        let mut rows = self
            .source
            .fetch(std::slice::from_ref(&name.to_string()))
            .await
            .map_err(|source| FormError::Dictionary {
                name: name.to_string(),
                source,
            })?;
        let options = Arc::new(map_rows(rows.remove(name).unwrap_or_default(), row_key));
        self.store(name, Arc::clone(&options));
        Ok(options)
    }

    /// Resolve several names in one round trip, skipping cached ones.
    pub async fn resolve_many(&self, names: &[String], row_key: &str) -> Result<HashMap<String, Arc<Vec<OptionEntry>>>, FormError> {
        let mut resolved = HashMap::new();
        let mut missing = Vec::new();
        for name in names {
            match self.cached(name) {
                Some(cached) => {
                    resolved.insert(name.clone(), cached);
                }
                None => missing.push(name.clone()),
            }
        }
        if missing.is_empty() {
            return Ok(resolved);
        }
        debug!(count = missing.len(), "batched dictionary fetch");
        let mut rows = self.source.fetch(&missing).await.map_err(|source| FormError::Dictionary {
            name: missing.join(","),
            source,
        })?;
        for name in missing {
            let options = Arc::new(map_rows(rows.remove(&name).unwrap_or_default(), row_key));
            self.store(&name, Arc::clone(&options));
            resolved.insert(name, options);
        }
        Ok(resolved)
    }

    /// Drops every cached entry. The only invalidation path.
    pub fn invalidate(&self) {
        self.lock_entries().clear();
    }

    fn cached(&self, name: &str) -> Option<Arc<Vec<OptionEntry>>> {
        self.lock_entries().get(name).cloned()
    }

    fn store(&self, name: &str, options: Arc<Vec<OptionEntry>>) {
        self.lock_entries().insert(name.to_string(), options);
    }

    // Entries stay usable even if a holder panicked mid-insert; the map
    // only ever contains complete option lists.
    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Vec<OptionEntry>>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Maps raw dictionary rows into option entries: `label` from the row's
/// `label` property, `value` from `row_key`, the whole row kept as `raw`.
fn map_rows(rows: Vec<JsonValue>, row_key: &str) -> Vec<OptionEntry> {
    rows.into_iter()
        .map(|row| {
            let label = row
                .get("label")
                .and_then(JsonValue::as_str)
                .map(str::to_string)
                .unwrap_or_default();
            let value = row.get(row_key).cloned().map(FieldValue::from_json).unwrap_or(FieldValue::Null);
            OptionEntry {
                label,
                value,
                children: None,
                raw: Some(row),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DictionarySource for CountingSource {
        async fn fetch(&self, codes: &[String]) -> anyhow::Result<HashMap<String, Vec<JsonValue>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut result = HashMap::new();
            for code in codes {
                result.insert(
                    code.clone(),
                    vec![
                        serde_json::json!({"label": "Alpha", "id": "a", "code": 1}),
                        serde_json::json!({"label": "Beta", "id": "b", "code": 2}),
                    ],
                );
            }
            Ok(result)
        }
    }

    #[tokio::test]
    async fn resolve_memoizes_per_name() {
        let source = Arc::new(CountingSource::default());
        let cache = DictionaryCache::new(source.clone());

        let first = cache.resolve("colors", DEFAULT_ROW_KEY).await.unwrap();
        let second = cache.resolve("colors", DEFAULT_ROW_KEY).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(first[0].label, "Alpha");
        assert_eq!(first[0].value, FieldValue::Text("a".into()));
        assert!(first[0].raw.is_some());
    }

    #[tokio::test]
    async fn resolve_many_skips_cached_names() {
        let source = Arc::new(CountingSource::default());
        let cache = DictionaryCache::new(source.clone());

        cache.resolve("colors", DEFAULT_ROW_KEY).await.unwrap();
        let resolved = cache
            .resolve_many(&["colors".to_string(), "sizes".to_string()], DEFAULT_ROW_KEY)
            .await
            .unwrap();
        // One call for "colors", one batched call for the missing "sizes".
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(resolved.len(), 2);
    }

    #[tokio::test]
    async fn row_key_selects_the_value_property() {
        let cache = DictionaryCache::new(Arc::new(CountingSource::default()));
        let options = cache.resolve("colors", "code").await.unwrap();
        assert_eq!(options[0].value, FieldValue::Int(1));
    }

    #[tokio::test]
    async fn invalidate_forces_a_refetch() {
        let source = Arc::new(CountingSource::default());
        let cache = DictionaryCache::new(source.clone());

        cache.resolve("colors", DEFAULT_ROW_KEY).await.unwrap();
        cache.invalidate();
        cache.resolve("colors", DEFAULT_ROW_KEY).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
