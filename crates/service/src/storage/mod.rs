//! Multimap storage abstractions
//!
//! [`MultiMap`] is the contract the connector issues exactly one call against
//! per message. [`MultiMapClient`] hands out named multimaps the way a data-grid
//! client does. Local implementations live in the submodules; `mock` records
//! calls for tests.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use common::types::ObjectId;
use serde_json::Value;

use crate::errors::StoreError;

pub mod client;
pub mod json_multimap_store;
pub mod memory;
pub mod mock;

pub use client::{Backend, LocalClient};
pub use json_multimap_store::JsonMultiMapStore;
pub use memory::MemoryMultiMap;

/// A named collection mapping one key to a collection of values.
///
/// Implementations own all state; callers hold an `Arc<dyn MultiMap>` and
/// may call it from many tasks at once.
#[async_trait]
pub trait MultiMap: Send + Sync {
    fn name(&self) -> &str;

    /// Add `value` under `key`; returns whether the collection changed.
    async fn put(&self, key: ObjectId, value: Value) -> Result<bool, StoreError>;

    /// All values stored under `key`, empty when the key is absent.
    async fn get(&self, key: &ObjectId) -> Result<Vec<Value>, StoreError>;

    /// Remove every value under `key` and return them.
    async fn remove(&self, key: &ObjectId) -> Result<Vec<Value>, StoreError>;

    /// Remove one occurrence of `value` under `key`; returns whether it existed.
    async fn remove_value(&self, key: &ObjectId, value: &Value) -> Result<bool, StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;

    async fn value_count(&self, key: &ObjectId) -> Result<usize, StoreError>;

    async fn contains_key(&self, key: &ObjectId) -> Result<bool, StoreError>;

    /// Whether any key holds `value`.
    async fn contains_value(&self, value: &Value) -> Result<bool, StoreError>;
}

/// Source of named multimaps.
#[async_trait]
pub trait MultiMapClient: Send + Sync {
    async fn multimap(&self, name: &str) -> Result<Arc<dyn MultiMap>, StoreError>;
}

/// How values under one key are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueCollection {
    /// Duplicates are dropped.
    #[default]
    Set,
    /// Duplicates are kept in insertion order.
    List,
}

impl ValueCollection {
    /// Insert into a key's value collection; returns whether it changed.
    pub fn insert(self, values: &mut Vec<Value>, value: Value) -> bool {
        if self == ValueCollection::Set && values.contains(&value) {
            return false;
        }
        values.push(value);
        true
    }
}

impl FromStr for ValueCollection {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "set" => Ok(Self::Set),
            "list" => Ok(Self::List),
            other => Err(StoreError::UnknownCollection(other.to_string())),
        }
    }
}

/// Remove the first occurrence of `value`; returns whether one was found.
pub(crate) fn remove_first(values: &mut Vec<Value>, value: &Value) -> bool {
    match values.iter().position(|v| v == value) {
        Some(pos) => {
            values.remove(pos);
            true
        }
        None => false,
    }
}
