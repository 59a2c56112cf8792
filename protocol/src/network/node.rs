//! # Gossip Node
//!
//! `GossipNode` is the runtime entity behind one chat peer. It owns the
//! node's identity, the [`StreamRegistry`], the [`MessageStore`], the inbound
//! channel feeding the dispatcher and the output channel the user sees.
//!
//! Every task gets an `Arc<GossipNode>`; there is no global state.
//!
//! ```text
//! stream ──► reader ──┐
//! stream ──► reader ──┼──► inbound channel ──► dispatcher ──► store ──► output
//! stream ──► reader ──┘                            │
//!                                                  ▼
//! user input ──► publish ──► store ──────────► broadcast ──► per-peer queues
//! ```
//!
//! ## Flood rule
//!
//! A message is surfaced and re-broadcast the first time its key is seen and
//! never again. Broadcast goes to every registered peer whose id differs from
//! the node's own, including the neighbour the message just came from; that
//! neighbour's own dedup absorbs the echo. In any connected graph, cyclic or
//! not, each node therefore forwards each key at most once and the flood
//! terminates.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, info, trace, warn};

use futures::StreamExt;

use super::codec::FrameCodec;
use super::message::Message;
use super::pipeline;
use super::registry::{PeerHandle, StreamRegistry};
use super::stats::{NodeStats, StatsSnapshot};
use super::store::MessageStore;
use crate::identity::PeerId;

// ---------------------------------------------------------------------------
// Channel Payloads
// ---------------------------------------------------------------------------

/// A message received from the network, tagged with the stream it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// Peer whose stream delivered the frame.
    pub from: PeerId,
    /// The decoded message.
    pub message: Message,
}

/// What the dispatcher did with one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// First sighting: stored, surfaced and queued to `forwarded` peers.
    Accepted {
        /// Number of peer queues the message was handed to.
        forwarded: usize,
    },
    /// Already seen: dropped without output or re-broadcast.
    Duplicate,
}

/// Receiving ends created alongside a node.
#[derive(Debug)]
pub struct NodeChannels {
    /// Feed for the dispatcher.
    pub inbound: mpsc::UnboundedReceiver<Inbound>,
    /// Newly accepted network messages, in acceptance order.
    pub output: mpsc::UnboundedReceiver<Message>,
}

/// A node with its dispatcher already running.
#[derive(Debug)]
pub struct NodeRuntime {
    /// The shared node.
    pub node: Arc<GossipNode>,
    /// Newly accepted network messages, ready to display.
    pub output: mpsc::UnboundedReceiver<Message>,
    /// The dispatcher task.
    pub dispatcher: JoinHandle<()>,
}

// ---------------------------------------------------------------------------
// Gossip Node
// ---------------------------------------------------------------------------

/// One peer of the gossip chat network.
#[derive(Debug)]
pub struct GossipNode {
    /// This node's peer id. Broadcast never targets it.
    peer_id: PeerId,
    /// Listen address string stamped as `origin` on local messages.
    origin: String,
    /// Open streams, one per peer.
    registry: StreamRegistry,
    /// Seen-set.
    store: MessageStore,
    /// Last sequence number handed out. Incremented before use.
    outgoing_sequence: AtomicU64,
    /// Source of connection ids for registry entries.
    next_conn_id: AtomicU64,
    /// Feeds the dispatcher. Readers hold clones via the node.
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    /// Carries accepted messages to whoever displays them.
    output_tx: mpsc::UnboundedSender<Message>,
    /// Counters.
    stats: NodeStats,
}

impl GossipNode {
    /// Creates a node and the receivers for its inbound and output channels.
    ///
    /// Nothing runs yet; hand `channels.inbound` to
    /// [`pipeline::run_dispatcher`] or use [`GossipNode::launch`].
    pub fn new(peer_id: PeerId, origin: impl Into<String>) -> (Arc<Self>, NodeChannels) {
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let (output_tx, output) = mpsc::unbounded_channel();
        let origin = origin.into();

        info!(peer = %peer_id, origin = %origin, "creating gossip node");

        let node = Arc::new(Self {
            peer_id,
            origin,
            registry: StreamRegistry::new(),
            store: MessageStore::new(),
            outgoing_sequence: AtomicU64::new(0),
            next_conn_id: AtomicU64::new(0),
            inbound_tx,
            output_tx,
            stats: NodeStats::default(),
        });

        (node, NodeChannels { inbound, output })
    }

    /// Creates a node and spawns its dispatcher. Must be called from inside
    /// a Tokio runtime.
    pub fn launch(peer_id: PeerId, origin: impl Into<String>) -> NodeRuntime {
        let (node, channels) = Self::new(peer_id, origin);
        let dispatcher = tokio::spawn(pipeline::run_dispatcher(
            Arc::clone(&node),
            channels.inbound,
        ));
        NodeRuntime {
            node,
            output: channels.output,
            dispatcher,
        }
    }

    /// This node's peer id.
    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    /// Origin string stamped on locally created messages.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// The seen-set.
    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// The stream registry.
    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    /// Number of peers with an open stream.
    pub fn peer_count(&self) -> usize {
        self.registry.len()
    }

    /// Current counter values.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub(crate) fn stats_handle(&self) -> &NodeStats {
        &self.stats
    }

    /// A sender into the dispatcher's inbound channel, for programmatic
    /// injection of network messages.
    pub fn inbound_sender(&self) -> mpsc::UnboundedSender<Inbound> {
        self.inbound_tx.clone()
    }

    // -----------------------------------------------------------------------
    // Streams
    // -----------------------------------------------------------------------

    /// Registers a freshly opened duplex stream for `peer` and starts its
    /// reader and writer tasks. Returns the connection id.
    ///
    /// Inbound accepts and outbound dials go through here alike. A previous
    /// stream for the same peer is replaced and wound down.
    pub fn attach_stream<S>(self: &Arc<Self>, peer: PeerId, stream: S) -> u64
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        self.attach_framed(peer, Framed::new(stream, FrameCodec::new()))
    }

    /// Like [`attach_stream`](Self::attach_stream), for a stream that already
    /// went through framing (e.g. a completed handshake). Bytes buffered in
    /// the codec are preserved.
    pub fn attach_framed<S>(self: &Arc<Self>, peer: PeerId, framed: Framed<S, FrameCodec>) -> u64
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (sink, frames) = framed.split();
        let (handle, outbound) = PeerHandle::channel(conn_id);

        if let Some(previous) = self.registry.put(peer.clone(), handle) {
            info!(
                peer = %peer,
                old_conn = previous.conn_id(),
                new_conn = conn_id,
                "replacing existing stream for peer"
            );
        }
        self.stats.record_stream_opened();
        info!(peer = %peer, conn = conn_id, peers = self.registry.len(), "stream attached");

        tokio::spawn(pipeline::write_stream(
            Arc::clone(self),
            peer.clone(),
            conn_id,
            sink,
            outbound,
        ));
        tokio::spawn(pipeline::read_stream(
            Arc::clone(self),
            peer,
            conn_id,
            frames,
        ));

        conn_id
    }

    /// Drops the registry entry for `peer` if it still belongs to
    /// `conn_id`. Called by a stream's tasks on their first I/O error.
    pub(crate) fn detach(&self, peer: &PeerId, conn_id: u64, reason: &str) {
        if self.registry.remove_if(peer, conn_id) {
            self.stats.record_stream_closed();
            info!(
                peer = %peer,
                conn = conn_id,
                reason,
                peers = self.registry.len(),
                "stream detached"
            );
        }
    }

    pub(crate) fn forward_inbound(&self, inbound: Inbound) -> bool {
        self.inbound_tx.send(inbound).is_ok()
    }

    // -----------------------------------------------------------------------
    // Flood
    // -----------------------------------------------------------------------

    /// Creates, records and broadcasts a local message.
    ///
    /// The message is inserted into the local store before it leaves, so if
    /// it ever loops back through the graph the dispatcher drops it. It is
    /// not echoed on the output channel.
    ///
    /// Sequences already present in the store (frames from an earlier run
    /// on the same origin, or a peer forging this origin) are skipped, so a
    /// key is never broadcast twice with different content.
    pub fn publish(&self, content: impl Into<String>) -> Message {
        let content = content.into();
        let message = loop {
            let sequence = self.outgoing_sequence.fetch_add(1, Ordering::SeqCst) + 1;
            let candidate = Message::new(content.clone(), sequence, self.origin.clone());
            if self.store.insert_if_new(&candidate) {
                break candidate;
            }
            warn!(key = %candidate.key(), "sequence already seen for own origin, skipping");
        };
        self.stats.record_originated();

        let forwarded = self.broadcast(&message);
        debug!(key = %message.key(), forwarded, "published local message");
        message
    }

    /// One dispatcher step: dedup, surface, re-broadcast.
    pub fn handle_incoming(&self, inbound: Inbound) -> Disposition {
        let Inbound { from, message } = inbound;

        if !self.store.insert_if_new(&message) {
            self.stats.record_duplicate();
            trace!(peer = %from, key = %message.key(), "dropping duplicate message");
            return Disposition::Duplicate;
        }
        self.stats.record_accepted();

        if self.output_tx.send(message.clone()).is_err() {
            trace!(key = %message.key(), "output receiver gone, message not displayed");
        }

        let forwarded = self.broadcast(&message);
        debug!(peer = %from, key = %message.key(), forwarded, "accepted new message");
        Disposition::Accepted { forwarded }
    }

    /// Queues `message` to every registered peer except this node itself.
    ///
    /// Uses a registry snapshot: peers attached mid-broadcast are not
    /// included. A peer whose queue is closed is removed and skipped; the
    /// rest still receive the message. Returns the number of queues fed.
    pub fn broadcast(&self, message: &Message) -> usize {
        let mut queued = 0;

        for (peer, handle) in self.registry.snapshot() {
            if peer == self.peer_id {
                continue;
            }
            match handle.send(message.clone()) {
                Ok(()) => queued += 1,
                Err(_) => {
                    self.stats.record_broadcast_failure();
                    warn!(peer = %peer, key = %message.key(), "peer stream closed during broadcast");
                    self.detach(&peer, handle.conn_id(), "outbound queue closed");
                }
            }
        }

        self.stats.record_queued(queued);
        queued
    }
}
