//! Long-running tasks around a [`GossipNode`].
//!
//! - [`run_dispatcher`]: the single consumer of the inbound channel. All
//!   network-side dedup decisions happen here, one message at a time.
//! - [`run_writer`]: turns lines of user (or programmatic) input into
//!   published messages.
//! - `read_stream` / `write_stream`: the two halves of one peer stream,
//!   spawned by [`GossipNode::attach_framed`].
//!
//! A stream's tasks end on their first error (or EOF) and remove the peer's
//! registry entry on the way out. Nothing here is fatal to the node.

use std::sync::Arc;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, trace, warn};

use super::codec::{FrameCodec, WireFrame};
use super::message::Message;
use super::node::{GossipNode, Inbound};
use crate::identity::PeerId;

/// Drains the inbound channel until every sender is gone.
pub async fn run_dispatcher(node: Arc<GossipNode>, mut inbound: mpsc::UnboundedReceiver<Inbound>) {
    debug!(peer = %node.peer_id(), "dispatcher started");
    while let Some(item) = inbound.recv().await {
        node.handle_incoming(item);
    }
    debug!(peer = %node.peer_id(), "inbound channel closed, dispatcher exiting");
}

/// Publishes every non-blank line of `input` until EOF.
///
/// Line terminators are stripped. Returns the number of messages published;
/// an input read error ends the pipeline and is returned to the caller.
pub async fn run_writer<R>(node: Arc<GossipNode>, input: R) -> std::io::Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut published = 0u64;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        node.publish(line);
        published += 1;
    }

    debug!(published, "input exhausted, writer pipeline exiting");
    Ok(published)
}

/// Reader half of a peer stream: decode frames, push chat messages into the
/// inbound channel in arrival order.
pub(crate) async fn read_stream<S>(
    node: Arc<GossipNode>,
    peer: PeerId,
    conn_id: u64,
    mut frames: SplitStream<Framed<S, FrameCodec>>,
) where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let reason = loop {
        match frames.next().await {
            Some(Ok(WireFrame::Chat(message))) => {
                trace!(peer = %peer, key = %message.key(), "frame received");
                let delivered = node.forward_inbound(Inbound {
                    from: peer.clone(),
                    message,
                });
                if !delivered {
                    break "dispatcher stopped";
                }
            }
            Some(Ok(WireFrame::Hello(_))) => {
                warn!(peer = %peer, conn = conn_id, "unexpected hello after handshake");
                break "protocol violation";
            }
            Some(Err(e)) => {
                warn!(peer = %peer, conn = conn_id, error = %e, "failed to read from stream");
                break "read error";
            }
            None => break "end of stream",
        }
    };

    node.detach(&peer, conn_id, reason);
}

/// Writer half of a peer stream: one encode + flush per queued message.
///
/// Ends when the queue closes (the registry entry was replaced or removed)
/// or on the first write error.
pub(crate) async fn write_stream<S>(
    node: Arc<GossipNode>,
    peer: PeerId,
    conn_id: u64,
    mut sink: SplitSink<Framed<S, FrameCodec>, WireFrame>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
) where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    while let Some(message) = outbound.recv().await {
        let key = message.key();
        if let Err(e) = sink.send(WireFrame::Chat(message)).await {
            node.stats_handle().record_broadcast_failure();
            warn!(peer = %peer, conn = conn_id, key = %key, error = %e, "failed to write to stream");
            node.detach(&peer, conn_id, "write error");
            return;
        }
        trace!(peer = %peer, key = %key, "frame sent");
    }

    if let Err(e) = sink.close().await {
        debug!(peer = %peer, conn = conn_id, error = %e, "error closing stream");
    }
}
