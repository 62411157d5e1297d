//! Shared building blocks for the connector workspace.
//!
//! - `types`: the message model exchanged between sources, the adapter and sinks.
//! - `utils::logging`: tracing subscriber setup.
//! - `env`: startup sanity checks.
//! - `admin_http`: `/healthz` and `/metrics` endpoints.

use thiserror::Error;

pub mod types;
pub mod utils;
pub mod env;
pub mod admin_http;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("encode error: {0}")]
    Encode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_error_messages() {
        let e = CoreError::Parse("eof".into());
        assert_eq!(e.to_string(), "parse error: eof");
    }
}
