//! Message-driven adapter that performs multimap operations.
//!
//! An inbound [`Message`](common::types::Message) names an operation and a key
//! in its headers; [`producer::MultimapProducer`] validates it, issues one call
//! against a [`service::storage::MultiMap`], and hands any result to a
//! [`sink::MessageSink`].

pub mod bootstrap;
pub mod endpoint;
pub mod errors;
pub mod observability;
pub mod operation;
pub mod producer;
pub mod route;
pub mod sink;

pub use endpoint::Endpoint;
pub use errors::OperationError;
pub use operation::Operation;
pub use producer::MultimapProducer;
