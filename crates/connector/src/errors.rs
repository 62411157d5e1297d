use service::errors::StoreError;
use thiserror::Error;

/// Failures of a single producer invocation.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("the value '{0}' is not allowed for parameter 'operation' on the multimap")]
    Unsupported(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl OperationError {
    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            OperationError::Unsupported(_) => 1001,
            OperationError::InvalidRequest(_) => 1002,
            OperationError::Store(e) => e.code(),
            OperationError::Sink(_) => 3001,
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            OperationError::Unsupported(_) => "unsupported_operation",
            OperationError::InvalidRequest(_) => "invalid_request",
            OperationError::Store(_) => "store",
            OperationError::Sink(_) => "sink",
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self { Self::InvalidRequest(msg.into()) }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink {0} is closed")]
    Closed(String),
    #[error("sink io error: {0}")]
    Io(String),
    #[error("sink encode error: {0}")]
    Encode(String),
}
