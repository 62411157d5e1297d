use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::info;

use super::{JsonMultiMapStore, MemoryMultiMap, MultiMap, MultiMapClient, ValueCollection};
use crate::errors::StoreError;

/// Where [`LocalClient`] keeps multimap contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Memory,
    /// One `<name>.json` file per multimap under this directory.
    File(PathBuf),
}

/// In-process [`MultiMapClient`]: creates each named multimap on first use
/// and hands the same instance to every later caller.
pub struct LocalClient {
    backend: Backend,
    collection: ValueCollection,
    maps: DashMap<String, Arc<dyn MultiMap>>,
}

impl LocalClient {
    pub fn new(backend: Backend, collection: ValueCollection) -> Self {
        Self { backend, collection, maps: DashMap::new() }
    }

    pub fn memory() -> Self { Self::new(Backend::Memory, ValueCollection::default()) }

    async fn open(&self, name: &str) -> Result<Arc<dyn MultiMap>, StoreError> {
        let map: Arc<dyn MultiMap> = match &self.backend {
            Backend::Memory => Arc::new(MemoryMultiMap::new(name, self.collection)),
            Backend::File(dir) => {
                JsonMultiMapStore::new(name, dir.join(format!("{name}.json")), self.collection).await?
            }
        };
        info!(multimap = %name, backend = ?self.backend, "multimap opened");
        Ok(map)
    }
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    let ok = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && name != "."
        && name != "..";
    if ok { Ok(()) } else { Err(StoreError::InvalidName(name.to_string())) }
}

#[async_trait]
impl MultiMapClient for LocalClient {
    async fn multimap(&self, name: &str) -> Result<Arc<dyn MultiMap>, StoreError> {
        validate_name(name)?;
        if let Some(existing) = self.maps.get(name) {
            return Ok(existing.value().clone());
        }
        let opened = self.open(name).await?;
        // a concurrent opener may have won; everyone keeps the first instance
        let map = self.maps.entry(name.to_string()).or_insert(opened).value().clone();
        Ok(map)
    }
}
