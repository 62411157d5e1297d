//! Store layer for the multimap connector.
//! - `storage` defines the multimap contract the adapter talks to and the
//!   local implementations of it.
//! - `errors` holds the store error taxonomy surfaced verbatim to callers.

pub mod errors;
pub mod storage;
