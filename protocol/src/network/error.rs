//! Error types for the network layer.
//!
//! Only connection setup can fail loudly. Once a stream is attached to a
//! node, its errors end that stream's tasks and are logged, never returned.

use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

use super::codec::CodecError;
use crate::identity::{IdentityError, PeerId};

/// Errors raised while binding, dialing or handshaking.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The TCP listener could not be bound.
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        /// Requested bind address.
        addr: SocketAddr,
        /// OS error.
        #[source]
        source: std::io::Error,
    },

    /// The listen host is a wildcard address, which cannot serve as an
    /// origin.
    #[error("refusing to listen on unspecified address {0}; pass a concrete interface address")]
    UnspecifiedHost(IpAddr),

    /// The node identity could not be created.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// The remote peer could not be reached.
    #[error("failed to dial {target}: {source}")]
    Dial {
        /// `host:port` that was dialed.
        target: String,
        /// OS error.
        #[source]
        source: std::io::Error,
    },

    /// The remote end speaks a different stream protocol.
    #[error("protocol mismatch: expected {expected}, got {actual}")]
    ProtocolMismatch {
        /// Our protocol name.
        expected: String,
        /// What the peer announced.
        actual: String,
    },

    /// The remote end is not the peer its address named.
    #[error("peer id mismatch: expected {expected}, got {actual}")]
    PeerMismatch {
        /// Peer id from the dialed multiaddr.
        expected: PeerId,
        /// Peer id the remote presented.
        actual: PeerId,
    },

    /// The remote end presented our own peer id.
    #[error("refusing connection to self ({0})")]
    SelfConnection(PeerId),

    /// The first frame from the peer was not a hello.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The peer did not complete the handshake in time.
    #[error("handshake timed out after {timeout_ms}ms")]
    HandshakeTimeout {
        /// Configured deadline.
        timeout_ms: u64,
    },

    /// The stream closed before the handshake completed.
    #[error("connection closed during handshake")]
    ConnectionClosed,

    /// Framing or parsing failed during the handshake.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Local socket error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
