//! Message parsing: timestamp codec, header parsing, identifiers, bodies and the record builder.

pub mod body;
pub mod builder;
pub mod date;
pub mod header;
pub mod identifier;
pub mod mbox;
pub mod timestamp;
