//! `mailsift`: turn archived mailbox exports into validated, threaded,
//! enriched email records.
//!
//! The core parses raw messages into [`model::message::ParsedMessage`]
//! records, reconstructs threads across the whole corpus, recovers quoted
//! ancestors from reply bodies and derives domain and content signals.
//! [`pipeline::Pipeline`] drives the stages over any [`mailbox::Mailbox`].

pub mod checkpoint;
pub mod classify;
pub mod config;
pub mod enrich;
pub mod error;
pub mod export;
pub mod mailbox;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod split;
pub mod store;
pub mod thread;
