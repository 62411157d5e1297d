use async_trait::async_trait;
use common::types::ObjectId;
use dashmap::DashMap;
use serde_json::Value;
use tracing::trace;

use super::{remove_first, MultiMap, ValueCollection};
use crate::errors::StoreError;

/// In-process multimap backed by a sharded concurrent map.
///
/// A key whose last value is removed disappears, so `contains_key` and
/// `value_count` never see empty collections.
///
/// # Examples
/// ```
/// use service::storage::{MemoryMultiMap, MultiMap, ValueCollection};
/// use serde_json::json;
/// let map = MemoryMultiMap::new("bar", ValueCollection::Set);
/// tokio_test::block_on(map.put("4711".into(), json!("my-foo"))).unwrap();
/// let values = tokio_test::block_on(map.get(&"4711".into())).unwrap();
/// assert_eq!(values, vec![json!("my-foo")]);
/// ```
pub struct MemoryMultiMap {
    name: String,
    collection: ValueCollection,
    entries: DashMap<ObjectId, Vec<Value>>,
}

impl MemoryMultiMap {
    pub fn new(name: &str, collection: ValueCollection) -> Self {
        Self { name: name.to_string(), collection, entries: DashMap::new() }
    }

    /// Number of keys currently holding at least one value.
    pub fn key_count(&self) -> usize { self.entries.len() }
}

#[async_trait]
impl MultiMap for MemoryMultiMap {
    fn name(&self) -> &str { &self.name }

    async fn put(&self, key: ObjectId, value: Value) -> Result<bool, StoreError> {
        trace!(multimap = %self.name, %key, "put");
        let mut values = self.entries.entry(key).or_default();
        Ok(self.collection.insert(values.value_mut(), value))
    }

    async fn get(&self, key: &ObjectId) -> Result<Vec<Value>, StoreError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()).unwrap_or_default())
    }

    async fn remove(&self, key: &ObjectId) -> Result<Vec<Value>, StoreError> {
        Ok(self.entries.remove(key).map(|(_, v)| v).unwrap_or_default())
    }

    async fn remove_value(&self, key: &ObjectId, value: &Value) -> Result<bool, StoreError> {
        let removed = match self.entries.get_mut(key) {
            Some(mut values) => remove_first(values.value_mut(), value),
            None => false,
        };
        // the shard guard above is released before touching the key again
        if removed {
            self.entries.remove_if(key, |_, v| v.is_empty());
        }
        Ok(removed)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.entries.clear();
        Ok(())
    }

    async fn value_count(&self, key: &ObjectId) -> Result<usize, StoreError> {
        Ok(self.entries.get(key).map(|v| v.len()).unwrap_or(0))
    }

    async fn contains_key(&self, key: &ObjectId) -> Result<bool, StoreError> {
        Ok(self.entries.contains_key(key))
    }

    async fn contains_value(&self, value: &Value) -> Result<bool, StoreError> {
        Ok(self.entries.iter().any(|e| e.value().contains(value)))
    }
}
