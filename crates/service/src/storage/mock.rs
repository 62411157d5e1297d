//! Recording multimap for tests and doc examples.
//!
//! Every call is logged as a [`Call`]; read answers come from values primed
//! with the `when_*` methods and default to empty/false/zero.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use common::types::ObjectId;
use serde_json::Value;

use super::{MultiMap, MultiMapClient};
use crate::errors::StoreError;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Put(ObjectId, Value),
    Get(ObjectId),
    Remove(ObjectId),
    RemoveValue(ObjectId, Value),
    Clear,
    ValueCount(ObjectId),
    ContainsKey(ObjectId),
    ContainsValue(Value),
}

impl Call {
    pub fn is_mutating(&self) -> bool {
        matches!(self, Call::Put(..) | Call::Remove(_) | Call::RemoveValue(..) | Call::Clear)
    }
}

#[derive(Default)]
struct Answers {
    get: HashMap<ObjectId, Vec<Value>>,
    value_count: HashMap<ObjectId, usize>,
    contains_key: HashMap<ObjectId, bool>,
    // Value is not hashable, so probes are matched linearly
    contains_value: Vec<(Value, bool)>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Default)]
pub struct RecordingMultiMap {
    name: String,
    calls: Mutex<Vec<Call>>,
    answers: Mutex<Answers>,
    failure: Mutex<Option<StoreError>>,
}

impl RecordingMultiMap {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Default::default() }
    }

    pub fn when_get(&self, key: impl Into<ObjectId>, values: Vec<Value>) {
        lock(&self.answers).get.insert(key.into(), values);
    }

    pub fn when_value_count(&self, key: impl Into<ObjectId>, count: usize) {
        lock(&self.answers).value_count.insert(key.into(), count);
    }

    pub fn when_contains_key(&self, key: impl Into<ObjectId>, present: bool) {
        lock(&self.answers).contains_key.insert(key.into(), present);
    }

    pub fn when_contains_value(&self, value: impl Into<Value>, present: bool) {
        lock(&self.answers).contains_value.push((value.into(), present));
    }

    /// Make every following call fail with `err`.
    pub fn fail_with(&self, err: StoreError) {
        *lock(&self.failure) = Some(err);
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    pub fn mutating_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutating).collect()
    }

    fn record(&self, call: Call) -> Result<(), StoreError> {
        lock(&self.calls).push(call);
        match lock(&self.failure).as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MultiMap for RecordingMultiMap {
    fn name(&self) -> &str { &self.name }

    async fn put(&self, key: ObjectId, value: Value) -> Result<bool, StoreError> {
        self.record(Call::Put(key, value))?;
        Ok(true)
    }

    async fn get(&self, key: &ObjectId) -> Result<Vec<Value>, StoreError> {
        self.record(Call::Get(key.clone()))?;
        Ok(lock(&self.answers).get.get(key).cloned().unwrap_or_default())
    }

    async fn remove(&self, key: &ObjectId) -> Result<Vec<Value>, StoreError> {
        self.record(Call::Remove(key.clone()))?;
        Ok(Vec::new())
    }

    async fn remove_value(&self, key: &ObjectId, value: &Value) -> Result<bool, StoreError> {
        self.record(Call::RemoveValue(key.clone(), value.clone()))?;
        Ok(true)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.record(Call::Clear)
    }

    async fn value_count(&self, key: &ObjectId) -> Result<usize, StoreError> {
        self.record(Call::ValueCount(key.clone()))?;
        Ok(lock(&self.answers).value_count.get(key).copied().unwrap_or(0))
    }

    async fn contains_key(&self, key: &ObjectId) -> Result<bool, StoreError> {
        self.record(Call::ContainsKey(key.clone()))?;
        Ok(lock(&self.answers).contains_key.get(key).copied().unwrap_or(false))
    }

    async fn contains_value(&self, value: &Value) -> Result<bool, StoreError> {
        self.record(Call::ContainsValue(value.clone()))?;
        let answers = lock(&self.answers);
        Ok(answers.contains_value.iter().any(|(v, present)| v == value && *present))
    }
}

/// Client that always hands out the same [`RecordingMultiMap`] and remembers
/// which names were requested.
pub struct MockClient {
    pub map: Arc<RecordingMultiMap>,
    requested: Mutex<Vec<String>>,
}

impl MockClient {
    pub fn new(map: Arc<RecordingMultiMap>) -> Self {
        Self { map, requested: Mutex::new(Vec::new()) }
    }

    pub fn requested(&self) -> Vec<String> {
        lock(&self.requested).clone()
    }
}

#[async_trait]
impl MultiMapClient for MockClient {
    async fn multimap(&self, name: &str) -> Result<Arc<dyn MultiMap>, StoreError> {
        lock(&self.requested).push(name.to_string());
        Ok(self.map.clone())
    }
}
