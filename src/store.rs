//! Insertion-ordered records de-duplicated by natural key.

use std::collections::HashMap;

use tracing::warn;

use crate::model::message::{EnrichedMessage, SubMessage};

/// A record's identity for de-duplication.
pub trait NaturalKey {
    fn natural_key(&self) -> String;
}

impl NaturalKey for EnrichedMessage {
    fn natural_key(&self) -> String {
        self.message.global_message_id.clone()
    }
}

/// A sub-message is identified by its parent and its position in the parent.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SubMessageRecord {
    pub parent_message_id: String,
    pub position: usize,
    #[serde(flatten)]
    pub sub_message: SubMessage,
}

impl NaturalKey for SubMessageRecord {
    fn natural_key(&self) -> String {
        format!("{}#{}", self.parent_message_id, self.position)
    }
}

/// A `(message_id, text)` pair for text consumers.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TextRecord {
    pub message_id: String,
    pub text: String,
}

impl NaturalKey for TextRecord {
    fn natural_key(&self) -> String {
        self.message_id.clone()
    }
}

/// Records in first-seen order. The first record stored under a key wins.
#[derive(Debug)]
pub struct KeyedStore<T> {
    records: Vec<T>,
    index: HashMap<String, usize>,
    duplicates: usize,
}

impl<T> Default for KeyedStore<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            index: HashMap::new(),
            duplicates: 0,
        }
    }
}

impl<T: NaturalKey> KeyedStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `record` unless its key is already present.
    ///
    /// Returns `true` if the record was stored. A duplicate is counted,
    /// logged and discarded.
    pub fn upsert(&mut self, record: T) -> bool {
        let key = record.natural_key();
        if self.index.contains_key(&key) {
            self.duplicates += 1;
            warn!(key = %key, "Duplicate record, keeping the first one");
            return false;
        }
        self.index.insert(key, self.records.len());
        self.records.push(record);
        true
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.index.get(key).map(|&i| &self.records[i])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of rejected duplicates.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.records.iter()
    }
}

impl<T: NaturalKey> Extend<T> for KeyedStore<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for record in iter {
            self.upsert(record);
        }
    }
}
