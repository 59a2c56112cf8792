//! # Wire Codec
//!
//! Frames are newline-delimited JSON: one object per line, encoded and
//! flushed once per message. JSON escapes any newline inside `content`, so a
//! raw `\n` on the wire always ends a frame and arbitrary chat text can never
//! break the framing.
//!
//! ```text
//! {"type":"hello","protocol":"/chat/1.0.0","peer_id":"12D3Koo...","listen_addr":"/ip4/127.0.0.1/tcp/3001"}
//! {"type":"chat","content":"hi","sequence":1,"origin":"/ip4/127.0.0.1/tcp/3001"}
//! ```
//!
//! Any decode error (bad JSON, over-long line, I/O failure) is terminal for
//! the stream it happened on and for nothing else.

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use super::message::Message;
use crate::config::MAX_FRAME_LENGTH;
use crate::identity::PeerId;

/// Greeting exchanged once, in both directions, when a stream opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// Stream protocol name; must equal [`crate::config::PROTOCOL_NAME`].
    pub protocol: String,
    /// Sender's peer id.
    pub peer_id: PeerId,
    /// Sender's listen multiaddr (also its message origin).
    pub listen_addr: String,
}

/// Everything that travels over a peer stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireFrame {
    /// Handshake greeting. Valid only as the first frame in each direction.
    Hello(Hello),
    /// A chat message in flight.
    Chat(Message),
}

/// Errors produced while framing or parsing.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Underlying stream I/O failed.
    #[error("stream i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A line exceeded the maximum frame length, or line framing failed.
    #[error("framing error: {0}")]
    Framing(#[from] LinesCodecError),

    /// A complete line was not a valid frame.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// `tokio_util` codec turning a byte stream into [`WireFrame`]s and back.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    lines: LinesCodec,
}

impl FrameCodec {
    /// Codec with the default maximum frame length.
    pub fn new() -> Self {
        Self::with_max_length(MAX_FRAME_LENGTH)
    }

    /// Codec rejecting frames longer than `max_length` bytes.
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_length),
        }
    }

    fn parse(line: Option<String>) -> Result<Option<WireFrame>, CodecError> {
        match line {
            Some(line) => Ok(Some(serde_json::from_str(&line)?)),
            None => Ok(None),
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = WireFrame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<WireFrame>, CodecError> {
        loop {
            match self.lines.decode(src)? {
                // Tolerate stray blank lines between records.
                Some(line) if line.trim().is_empty() => continue,
                other => return Self::parse(other),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<WireFrame>, CodecError> {
        loop {
            match self.lines.decode_eof(src)? {
                Some(line) if line.trim().is_empty() => continue,
                other => return Self::parse(other),
            }
        }
    }
}

impl Encoder<WireFrame> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, frame: WireFrame, dst: &mut BytesMut) -> Result<(), CodecError> {
        let line = serde_json::to_string(&frame)?;
        self.lines.encode(line, dst)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(frame: WireFrame) -> BytesMut {
        let mut buf = BytesMut::new();
        FrameCodec::new().encode(frame, &mut buf).unwrap();
        buf
    }

    #[test]
    fn embedded_newlines_stay_inside_one_frame() {
        let msg = Message::new("line one\nline two\r\n{\"type\":\"chat\"}", 1, "A");
        let mut buf = encode(WireFrame::Chat(msg.clone()));

        // Exactly one raw newline: the terminator.
        assert_eq!(buf.iter().filter(|b| **b == b'\n').count(), 1);

        let decoded = FrameCodec::new().decode(&mut buf).unwrap();
        assert_eq!(decoded, Some(WireFrame::Chat(msg)));
        assert!(buf.is_empty());
    }

    #[test]
    fn back_to_back_frames_decode_in_order() {
        let mut buf = encode(WireFrame::Chat(Message::new("one", 1, "A")));
        buf.extend_from_slice(&encode(WireFrame::Chat(Message::new("two", 2, "A"))));

        let mut codec = FrameCodec::new();
        let first = codec.decode(&mut buf).unwrap();
        let second = codec.decode(&mut buf).unwrap();
        let third = codec.decode(&mut buf).unwrap();

        assert!(matches!(first, Some(WireFrame::Chat(m)) if m.sequence == 1));
        assert!(matches!(second, Some(WireFrame::Chat(m)) if m.sequence == 2));
        assert!(third.is_none());
    }

    #[test]
    fn partial_frame_waits_for_more_bytes() {
        let full = encode(WireFrame::Chat(Message::new("hello", 1, "A")));
        let (head, tail) = full.split_at(full.len() / 2);

        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(head);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(tail);
        assert!(codec.decode(&mut buf).unwrap().is_some());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let mut buf = BytesMut::from(&b"\n\r\n"[..]);
        buf.extend_from_slice(&encode(WireFrame::Chat(Message::new("x", 5, "A"))));
        let decoded = FrameCodec::new().decode(&mut buf).unwrap();
        assert!(matches!(decoded, Some(WireFrame::Chat(m)) if m.sequence == 5));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let mut buf = BytesMut::from(&b"hello there, not json\n"[..]);
        let err = FrameCodec::new().decode(&mut buf).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)));
    }

    #[test]
    fn unknown_frame_type_is_an_error() {
        let mut buf = BytesMut::from(&b"{\"type\":\"gossip\",\"ttl\":3}\n"[..]);
        assert!(FrameCodec::new().decode(&mut buf).is_err());
    }

    #[test]
    fn over_long_frame_is_an_error() {
        let mut codec = FrameCodec::with_max_length(32);
        let mut buf = encode(WireFrame::Chat(Message::new("x".repeat(100), 1, "A")));
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, CodecError::Framing(_)));
    }

    #[test]
    fn hello_frame_uses_type_tag() {
        let hello = Hello {
            protocol: "/chat/1.0.0".into(),
            peer_id: PeerId::new("peer-a"),
            listen_addr: "/ip4/127.0.0.1/tcp/3001".into(),
        };
        let buf = encode(WireFrame::Hello(hello));
        let text = std::str::from_utf8(&buf).unwrap();
        assert!(text.starts_with("{\"type\":\"hello\""));
        assert!(text.contains("\"peer_id\":\"peer-a\""));
    }

    #[test]
    fn final_frame_without_newline_is_read_at_eof() {
        let mut buf = BytesMut::from(&b"{\"type\":\"chat\",\"content\":\"bye\",\"sequence\":9,\"origin\":\"A\"}"[..]);
        let mut codec = FrameCodec::new();
        assert!(codec.decode(&mut buf).unwrap().is_none());
        let last = codec.decode_eof(&mut buf).unwrap();
        assert!(matches!(last, Some(WireFrame::Chat(m)) if m.content == "bye"));
    }
}
