//! # Protocol Configuration & Constants
//!
//! Every magic number in murmur lives here, plus [`NodeConfig`], the runtime
//! settings the binary assembles from its command line.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Protocol Identity
// ---------------------------------------------------------------------------

/// Stream protocol name announced in the handshake. Peers speaking anything
/// else are disconnected before a single chat frame is exchanged.
pub const PROTOCOL_NAME: &str = "/chat/1.0.0";

/// Crate-level protocol version string.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Separator between origin and sequence in a rendered message key.
pub const KEY_SEPARATOR: char = '|';

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// Maximum length of one encoded frame (a single JSON line), in bytes.
/// Anything longer is treated as a malformed stream and closes it.
pub const MAX_FRAME_LENGTH: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Timing Constants
// ---------------------------------------------------------------------------

/// How long either side of a fresh connection may take to send its hello.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// [`HANDSHAKE_TIMEOUT`] in milliseconds, for serialized configs.
pub const HANDSHAKE_TIMEOUT_MS: u64 = 10_000;

// ---------------------------------------------------------------------------
// Network Defaults
// ---------------------------------------------------------------------------

/// Host the listener binds to unless told otherwise. Loopback, matching the
/// addresses the node prints for others to dial.
pub const DEFAULT_LISTEN_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Default source port. Zero lets the OS pick a free port.
pub const DEFAULT_SOURCE_PORT: u16 = 0;

/// Number of bytes of seed material fed into Ed25519 key derivation.
pub const KEY_SEED_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Node Configuration
// ---------------------------------------------------------------------------

/// Runtime configuration for a single gossip node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Address the TCP listener binds to.
    pub listen_host: IpAddr,
    /// Port the TCP listener binds to (0 = ephemeral).
    pub listen_port: u16,
    /// Optional peer multiaddr to dial at startup.
    pub bootstrap: Option<String>,
    /// Derive the node key from the listen port instead of the OS RNG, so
    /// restarting on the same port yields the same peer id.
    pub deterministic_identity: bool,
    /// Handshake deadline in milliseconds.
    pub handshake_timeout_ms: u64,
    /// Maximum encoded frame length in bytes.
    pub max_frame_length: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_host: DEFAULT_LISTEN_HOST,
            listen_port: DEFAULT_SOURCE_PORT,
            bootstrap: None,
            deterministic_identity: true,
            handshake_timeout_ms: HANDSHAKE_TIMEOUT_MS,
            max_frame_length: MAX_FRAME_LENGTH,
        }
    }
}

impl NodeConfig {
    /// The handshake deadline as a [`Duration`].
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}
