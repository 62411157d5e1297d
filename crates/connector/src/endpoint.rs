//! `multimap:<name>[?operation=<op>]` endpoint URIs.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

use crate::operation::Operation;

pub const SCHEME: &str = "multimap";

#[derive(Debug, Error, PartialEq)]
pub enum EndpointError {
    #[error("endpoint must start with multimap: (got {0})")]
    Scheme(String),
    #[error("endpoint has no multimap name")]
    MissingName,
    #[error("multimap name is not valid percent-encoded UTF-8: {0}")]
    Encoding(String),
    #[error("unknown endpoint parameter {0}")]
    UnknownParameter(String),
    #[error("endpoint parameter {0} given more than once")]
    DuplicateParameter(String),
    #[error("endpoint operation {0} is not supported")]
    InvalidOperation(String),
}

/// Adapter-level configuration: which multimap to talk to and, optionally,
/// the operation used when a message does not name one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub multimap: String,
    pub operation: Option<Operation>,
}

impl Endpoint {
    pub fn new(multimap: &str, operation: Option<Operation>) -> Self {
        Self { multimap: multimap.to_string(), operation }
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        let uri = uri.trim();
        let url = Url::parse(uri).map_err(|_| EndpointError::Scheme(uri.to_string()))?;
        if url.scheme() != SCHEME {
            return Err(EndpointError::Scheme(uri.to_string()));
        }

        // multimap:bar carries the name in the path, multimap://bar in the host
        let raw = match url.host_str() {
            Some(host) => host,
            None => url.path().trim_start_matches('/'),
        };
        let name = urlencoding::decode(raw).map_err(|_| EndpointError::Encoding(raw.to_string()))?;
        if name.is_empty() {
            return Err(EndpointError::MissingName);
        }

        let mut operation = None;
        for (k, v) in url.query_pairs() {
            match k.as_ref() {
                "operation" => {
                    if operation.is_some() {
                        return Err(EndpointError::DuplicateParameter("operation".to_string()));
                    }
                    let op = v.parse().map_err(|_| EndpointError::InvalidOperation(v.to_string()))?;
                    operation = Some(op);
                }
                other => return Err(EndpointError::UnknownParameter(other.to_string())),
            }
        }

        Ok(Self { multimap: name.into_owned(), operation })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}:{}", self.multimap)?;
        if let Some(op) = self.operation {
            write!(f, "?operation={op}")?;
        }
        Ok(())
    }
}
