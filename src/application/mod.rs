//! Application layer: the reconciliation engine, the ingestion loop that feeds
//! it, and the connection API applications talk to.
//!
//! All mutable purchase state sits in one `ReconciliationEngine` per
//! connection. The ingestion loop is its only writer on the delivery path, and
//! listener fanout always happens after the engine's lock is released.

pub mod connection;
pub mod engine;
pub mod ingestion;
