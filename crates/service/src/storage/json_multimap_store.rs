use std::{collections::HashMap, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use common::types::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{fs, sync::RwLock};
use tracing::debug;

use super::{remove_first, MultiMap, ValueCollection};
use crate::errors::StoreError;

/// On-disk row. Keys are stored next to their values rather than as JSON
/// object keys so integer and string keys survive a reload.
#[derive(Serialize, Deserialize)]
struct Entry {
    key: ObjectId,
    values: Vec<Value>,
}

/// JSON file-backed multimap.
///
/// Keeps `key -> values` in memory and rewrites the file after every mutation.
/// Intended for single-process deployments where a data grid is overkill.
#[derive(Clone)]
pub struct JsonMultiMapStore {
    name: String,
    collection: ValueCollection,
    inner: Arc<RwLock<HashMap<ObjectId, Vec<Value>>>>,
    file_path: PathBuf,
}

impl JsonMultiMapStore {
    /// Open the store at `path`. Creates the file with no entries if missing.
    pub async fn new<P: Into<PathBuf>>(
        name: &str,
        path: P,
        collection: ValueCollection,
    ) -> Result<Arc<Self>, StoreError> {
        let file_path = path.into();
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await.map_err(StoreError::io)?;
        }

        let map = match fs::read(&file_path).await {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => {
                let entries: Vec<Entry> = serde_json::from_slice(&bytes).map_err(StoreError::serialization)?;
                entries.into_iter().map(|e| (e.key, e.values)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                fs::write(&file_path, b"[]").await.map_err(StoreError::io)?;
                HashMap::new()
            }
            Err(e) => return Err(StoreError::io(e)),
        };
        debug!(multimap = %name, path = %file_path.display(), keys = map.len(), "json multimap opened");

        Ok(Arc::new(Self {
            name: name.to_string(),
            collection,
            inner: Arc::new(RwLock::new(map)),
            file_path,
        }))
    }

    /// Write to a sibling temp file and rename it over the original, so a
    /// crash mid-write never leaves a truncated file behind.
    async fn save(&self, map: &HashMap<ObjectId, Vec<Value>>) -> Result<(), StoreError> {
        let entries: Vec<Entry> = map
            .iter()
            .map(|(k, v)| Entry { key: k.clone(), values: v.clone() })
            .collect();
        let data = serde_json::to_vec(&entries).map_err(StoreError::serialization)?;
        let mut tmp = self.file_path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, data).await.map_err(StoreError::io)?;
        if let Err(e) = fs::rename(&tmp, &self.file_path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StoreError::io(e));
        }
        Ok(())
    }

    /// Apply a mutation to a copy, persist it, and only then publish it. The
    /// write lock is held throughout so concurrent writers cannot interleave
    /// file contents; a failed save leaves the map as it was.
    async fn update_map<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut HashMap<ObjectId, Vec<Value>>) -> (T, bool),
    {
        let mut map = self.inner.write().await;
        let mut next = map.clone();
        let (out, changed) = f(&mut next);
        if changed {
            self.save(&next).await?;
            *map = next;
        }
        Ok(out)
    }
}

#[async_trait]
impl MultiMap for JsonMultiMapStore {
    fn name(&self) -> &str { &self.name }

    async fn put(&self, key: ObjectId, value: Value) -> Result<bool, StoreError> {
        let collection = self.collection;
        self.update_map(|m| {
            let changed = collection.insert(m.entry(key).or_default(), value);
            (changed, changed)
        })
        .await
    }

    async fn get(&self, key: &ObjectId) -> Result<Vec<Value>, StoreError> {
        let map = self.inner.read().await;
        Ok(map.get(key).cloned().unwrap_or_default())
    }

    async fn remove(&self, key: &ObjectId) -> Result<Vec<Value>, StoreError> {
        self.update_map(|m| match m.remove(key) {
            Some(values) => (values, true),
            None => (Vec::new(), false),
        })
        .await
    }

    async fn remove_value(&self, key: &ObjectId, value: &Value) -> Result<bool, StoreError> {
        self.update_map(|m| {
            let removed = m.get_mut(key).map(|values| remove_first(values, value)).unwrap_or(false);
            if removed && m.get(key).is_some_and(|v| v.is_empty()) {
                m.remove(key);
            }
            (removed, removed)
        })
        .await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.update_map(|m| {
            m.clear();
            ((), true)
        })
        .await
    }

    async fn value_count(&self, key: &ObjectId) -> Result<usize, StoreError> {
        let map = self.inner.read().await;
        Ok(map.get(key).map(Vec::len).unwrap_or(0))
    }

    async fn contains_key(&self, key: &ObjectId) -> Result<bool, StoreError> {
        let map = self.inner.read().await;
        Ok(map.contains_key(key))
    }

    async fn contains_value(&self, value: &Value) -> Result<bool, StoreError> {
        let map = self.inner.read().await;
        Ok(map.values().any(|v| v.contains(value)))
    }
}
