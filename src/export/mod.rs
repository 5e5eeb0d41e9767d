//! Export functionality: JSON Lines sinks for enriched records.

pub mod jsonl;
