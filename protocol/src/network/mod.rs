//! # Network Module
//!
//! Flood gossip for chat messages: every node forwards every message it has
//! not seen before to all of its peers, and drops the ones it has.
//!
//! ## Architecture
//!
//! ```text
//! message.rs    - Message and its (origin, sequence) dedup key
//! store.rs      - Seen-set with atomic insert-if-absent
//! codec.rs      - Newline-delimited JSON frames (hello + chat)
//! registry.rs   - One outbound queue per connected peer
//! node.rs       - GossipNode: publish, dispatch, broadcast, stream attach
//! pipeline.rs   - Dispatcher, writer pipeline, per-stream reader/writer tasks
//! transport.rs  - TCP listener/dialer and the hello handshake
//! stats.rs      - Atomic counters for observability
//! ```
//!
//! ## Design Decisions
//!
//! - All network-side dedup runs in one dispatcher task fed by one unbounded
//!   channel. The writer pipeline inserts its own messages directly, so the
//!   store uses `DashMap`'s entry API to keep check-then-insert atomic.
//! - Broadcast only enqueues. Each peer stream has its own writer task, so a
//!   stalled peer delays nobody but itself.
//! - No TTL and no fan-out limit: dedup alone bounds the flood, since each
//!   node forwards each key at most once.
//! - The registry is a `parking_lot::RwLock<HashMap>`; broadcast iterates a
//!   snapshot so the lock is never held while sending.

pub mod codec;
pub mod error;
pub mod message;
pub mod node;
pub mod pipeline;
pub mod registry;
pub mod stats;
pub mod store;
pub mod transport;

pub use codec::{CodecError, FrameCodec, Hello, WireFrame};
pub use error::NetworkError;
pub use message::{Message, MessageKey};
pub use node::{Disposition, GossipNode, Inbound, NodeChannels, NodeRuntime};
pub use pipeline::{run_dispatcher, run_writer};
pub use registry::{PeerHandle, StreamRegistry};
pub use stats::{NodeStats, StatsSnapshot};
pub use store::MessageStore;
pub use transport::{handshake, TcpTransport};
