//! The multimap producer: turns one inbound message into exactly one store call.
//!
//! Resolution order for the operation is the message's `operation` header,
//! then the endpoint default. The whole request is validated into a
//! [`Command`] before the store is touched, so rejected messages leave no
//! trace in the multimap.

use std::sync::Arc;
use std::time::Instant;

use common::types::{headers, Message, ObjectId};
use serde_json::Value;
use service::storage::{MultiMap, MultiMapClient};
use tracing::{debug, instrument, warn};

use crate::endpoint::Endpoint;
use crate::errors::OperationError;
use crate::observability::{
    FAILURES_TOTAL, MESSAGES_TOTAL, OPERATIONS_TOTAL, OPERATION_DURATION, RESPONSES_PUBLISHED_TOTAL,
};
use crate::operation::Operation;
use crate::sink::MessageSink;

/// A fully validated request: the operation together with the key and value
/// it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Put { key: ObjectId, value: Value },
    Get { key: ObjectId },
    RemoveValue { key: ObjectId, value: Value },
    Delete { key: ObjectId },
    Clear,
    ValueCount { key: ObjectId },
    ContainsKey { key: ObjectId },
    ContainsValue { value: Value },
}

impl Command {
    /// Build the command for `op` from a message, checking that the key and
    /// body the operation needs are present.
    pub fn from_message(op: Operation, message: &Message) -> Result<Self, OperationError> {
        let key = || -> Result<ObjectId, OperationError> {
            let raw = message
                .header(headers::OBJECT_ID)
                .filter(|v| !v.is_null())
                .ok_or_else(|| OperationError::invalid(format!("{op} requires the {} header", headers::OBJECT_ID)))?;
            ObjectId::from_value(raw).ok_or_else(|| {
                OperationError::invalid(format!("{} must be a string or an integer, got {raw}", headers::OBJECT_ID))
            })
        };
        let body = || -> Result<Value, OperationError> {
            if message.has_body() {
                Ok(message.body.clone())
            } else {
                Err(OperationError::invalid(format!("{op} requires a message body")))
            }
        };

        Ok(match op {
            Operation::Put => Command::Put { key: key()?, value: body()? },
            Operation::Get => Command::Get { key: key()? },
            Operation::RemoveValue => Command::RemoveValue { key: key()?, value: body()? },
            Operation::Delete => Command::Delete { key: key()? },
            Operation::Clear => Command::Clear,
            Operation::ValueCount => Command::ValueCount { key: key()? },
            Operation::ContainsKey => Command::ContainsKey { key: key()? },
            Operation::ContainsValue => Command::ContainsValue { value: body()? },
        })
    }

    pub fn operation(&self) -> Operation {
        match self {
            Command::Put { .. } => Operation::Put,
            Command::Get { .. } => Operation::Get,
            Command::RemoveValue { .. } => Operation::RemoveValue,
            Command::Delete { .. } => Operation::Delete,
            Command::Clear => Operation::Clear,
            Command::ValueCount { .. } => Operation::ValueCount,
            Command::ContainsKey { .. } => Operation::ContainsKey,
            Command::ContainsValue { .. } => Operation::ContainsValue,
        }
    }

    /// Issue the single store call; returns the response body, if the
    /// operation has one.
    async fn execute(self, map: &dyn MultiMap) -> Result<Option<Value>, OperationError> {
        let out = match self {
            Command::Put { key, value } => {
                map.put(key, value).await?;
                None
            }
            Command::Get { key } => Some(Value::Array(map.get(&key).await?)),
            Command::RemoveValue { key, value } => {
                map.remove_value(&key, &value).await?;
                None
            }
            Command::Delete { key } => {
                map.remove(&key).await?;
                None
            }
            Command::Clear => {
                map.clear().await?;
                None
            }
            Command::ValueCount { key } => Some(Value::from(map.value_count(&key).await?)),
            Command::ContainsKey { key } => Some(Value::Bool(map.contains_key(&key).await?)),
            Command::ContainsValue { value } => Some(Value::Bool(map.contains_value(&value).await?)),
        };
        Ok(out)
    }
}

/// Message-driven adapter over one named multimap.
///
/// Holds no per-invocation state; share it behind an `Arc` across tasks.
pub struct MultimapProducer {
    map: Arc<dyn MultiMap>,
    default_operation: Option<Operation>,
    sink: Option<Arc<dyn MessageSink>>,
}

impl MultimapProducer {
    pub fn new(map: Arc<dyn MultiMap>, default_operation: Option<Operation>) -> Self {
        Self { map, default_operation, sink: None }
    }

    /// Look up the endpoint's multimap through `client`.
    pub async fn connect(client: &dyn MultiMapClient, endpoint: &Endpoint) -> Result<Self, OperationError> {
        let map = client.multimap(&endpoint.multimap).await?;
        Ok(Self::new(map, endpoint.operation))
    }

    /// Send responses to `sink` from [`process`](Self::process).
    pub fn with_sink(mut self, sink: Arc<dyn MessageSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn multimap_name(&self) -> &str { self.map.name() }

    pub fn default_operation(&self) -> Option<Operation> { self.default_operation }

    /// Per-message header first, endpoint default second.
    pub fn resolve_operation(&self, message: &Message) -> Result<Operation, OperationError> {
        match message.header(headers::OPERATION) {
            Some(v) if !v.is_null() => Operation::from_header(v),
            _ => self
                .default_operation
                .ok_or_else(|| OperationError::Unsupported("<none>".to_string())),
        }
    }

    /// Perform the message's operation and return the response message, if
    /// the operation produces one. Nothing is published here.
    #[instrument(skip_all, fields(multimap = %self.map.name(), operation = tracing::field::Empty))]
    pub async fn handle(&self, message: Message) -> Result<Option<Message>, OperationError> {
        MESSAGES_TOTAL.inc();
        let result = self.handle_inner(message).await;
        if let Err(e) = &result {
            FAILURES_TOTAL.with_label_values(&[e.kind()]).inc();
            warn!(error = %e, code = e.code(), kind = e.kind(), "multimap operation failed");
        }
        result
    }

    async fn handle_inner(&self, mut message: Message) -> Result<Option<Message>, OperationError> {
        let op = self.resolve_operation(&message)?;
        tracing::Span::current().record("operation", op.as_str());
        let command = Command::from_message(op, &message)?;

        OPERATIONS_TOTAL.with_label_values(&[op.as_str()]).inc();
        let started = Instant::now();
        let result = command.execute(self.map.as_ref()).await;
        OPERATION_DURATION.observe(started.elapsed().as_secs_f64());
        let body = result?;
        debug!(has_response = body.is_some(), "multimap operation done");

        Ok(body.map(|body| {
            message.remove_header(headers::OPERATION);
            message.remove_header(headers::OBJECT_ID);
            message.body = body;
            message
        }))
    }

    /// [`handle`](Self::handle), then publish any response to the configured
    /// sink. The response is still returned to the caller.
    pub async fn process(&self, message: Message) -> Result<Option<Message>, OperationError> {
        let response = self.handle(message).await?;
        if let (Some(sink), Some(resp)) = (&self.sink, &response) {
            if let Err(e) = sink.publish(resp.clone()).await {
                let e = OperationError::from(e);
                FAILURES_TOTAL.with_label_values(&[e.kind()]).inc();
                warn!(sink = sink.name(), error = %e, "publishing response failed");
                return Err(e);
            }
            RESPONSES_PUBLISHED_TOTAL.inc();
        }
        Ok(response)
    }
}
