//! Chat messages and their dedup identity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::KEY_SEPARATOR;

/// One chat message plus its provenance.
///
/// Created exactly once, by the originating node's writer pipeline, and never
/// mutated afterwards. Every copy in transit and in every node's store is a
/// clone of that original value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The chat payload. Arbitrary text, newlines included.
    pub content: String,
    /// Per-origin counter assigned by the originating node. Starts at 1.
    pub sequence: u64,
    /// Listen address of the originating node.
    pub origin: String,
}

impl Message {
    /// Builds a message. Only the origin's writer pipeline should call this
    /// with its own origin string.
    pub fn new(content: impl Into<String>, sequence: u64, origin: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sequence,
            origin: origin.into(),
        }
    }

    /// The dedup identity of this message.
    pub fn key(&self) -> MessageKey {
        MessageKey {
            origin: self.origin.clone(),
            sequence: self.sequence,
        }
    }
}

/// Renders the user-facing chat line, `<key> > <content>`.
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} > {}", self.key(), self.content)
    }
}

/// `(origin, sequence)`: the identity shared by every copy of one logical
/// message. Renders as `origin|sequence`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageKey {
    /// Originating node.
    pub origin: String,
    /// Sequence number assigned by the origin.
    pub sequence: u64,
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.origin, KEY_SEPARATOR, self.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_renders_origin_pipe_sequence() {
        let msg = Message::new("hello", 1, "A");
        assert_eq!(msg.key().to_string(), "A|1");
    }

    #[test]
    fn display_is_the_chat_line() {
        let msg = Message::new("hello", 7, "/ip4/127.0.0.1/tcp/3001");
        assert_eq!(msg.to_string(), "/ip4/127.0.0.1/tcp/3001|7 > hello");
    }

    #[test]
    fn same_origin_and_sequence_is_same_key() {
        let a = Message::new("hello", 3, "A");
        let b = Message::new("something else entirely", 3, "A");
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), Message::new("hello", 4, "A").key());
        assert_ne!(a.key(), Message::new("hello", 3, "B").key());
    }

    #[test]
    fn json_field_names_are_stable() {
        let msg = Message::new("hi", 2, "A");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["content"], "hi");
        assert_eq!(json["sequence"], 2);
        assert_eq!(json["origin"], "A");
    }
}
