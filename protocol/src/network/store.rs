//! The node's seen-set.
//!
//! A key lands in the store at most once per node. Its presence means the
//! node has already surfaced and broadcast that message and must never do so
//! again; this is the only thing stopping a flood from looping forever
//! through a cyclic peer graph.
//!
//! Two tasks insert concurrently (the dispatcher for network messages, the
//! writer pipeline for locally created ones), so insertion goes through the
//! `DashMap` entry API: check and insert happen under the same shard lock.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::message::{Message, MessageKey};

/// Deduplicating map from [`MessageKey`] to [`Message`]. Unbounded; entries
/// live for the whole process.
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: DashMap<MessageKey, Message>,
}

impl MessageStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `message` unless its key is already present.
    ///
    /// Returns `true` if this call inserted it, `false` for a duplicate.
    /// Exactly one of any number of concurrent callers with the same key gets
    /// `true`.
    pub fn insert_if_new(&self, message: &Message) -> bool {
        match self.messages.entry(message.key()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(message.clone());
                true
            }
        }
    }

    /// Whether a key has been seen.
    pub fn contains(&self, key: &MessageKey) -> bool {
        self.messages.contains_key(key)
    }

    /// Looks up a stored message.
    pub fn get(&self, key: &MessageKey) -> Option<Message> {
        self.messages.get(key).map(|entry| entry.value().clone())
    }

    /// Number of distinct messages seen.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether nothing has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// All stored messages from one origin, sorted by sequence.
    ///
    /// The dispatcher never reorders; this is for consumers that want
    /// per-origin order after the fact.
    pub fn from_origin(&self, origin: &str) -> Vec<Message> {
        let mut found: Vec<Message> = self
            .messages
            .iter()
            .filter(|entry| entry.key().origin == origin)
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by_key(|m| m.sequence);
        found
    }
}
