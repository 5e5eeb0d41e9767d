//! Core data model types: addresses, parsed and enriched messages, batches.

pub mod address;
pub mod message;
