//! Per-peer registry of open streams.
//!
//! Each entry is the typed write side of exactly one open duplex stream: an
//! outbound queue drained by that stream's writer task. At most one entry
//! exists per peer; a newer connection to or from the same peer replaces the
//! old entry, and dropping the old handle closes its queue, which in turn
//! ends the old writer task.
//!
//! Broadcast works on a snapshot taken under a short read lock. The lock is
//! never held across an `.await` or a queue send, so concurrent accept,
//! teardown and broadcast cannot deadlock.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use super::message::Message;
use crate::identity::PeerId;

/// Write side of one registered stream.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    conn_id: u64,
    outbound: mpsc::UnboundedSender<Message>,
}

impl PeerHandle {
    /// Creates a handle and the receiving end its writer task drains.
    pub fn channel(conn_id: u64) -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        (Self { conn_id, outbound }, rx)
    }

    /// Node-unique id of the connection behind this handle.
    pub fn conn_id(&self) -> u64 {
        self.conn_id
    }

    /// Queues a message for the peer. Never blocks.
    ///
    /// Fails, handing the message back, once the writer task has exited.
    pub fn send(&self, message: Message) -> Result<(), Message> {
        self.outbound.send(message).map_err(|err| err.0)
    }

    /// Whether the writer task behind this handle is gone.
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

/// Concurrent map from peer id to its open stream.
#[derive(Debug, Default)]
pub struct StreamRegistry {
    streams: RwLock<HashMap<PeerId, PeerHandle>>,
}

impl StreamRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handle` for `peer`, replacing any existing entry.
    ///
    /// Returns the replaced handle. Callers normally just drop it, which
    /// closes the old stream's outbound queue.
    pub fn put(&self, peer: PeerId, handle: PeerHandle) -> Option<PeerHandle> {
        self.streams.write().insert(peer, handle)
    }

    /// Looks up the handle registered for `peer`.
    pub fn get(&self, peer: &PeerId) -> Option<PeerHandle> {
        self.streams.read().get(peer).cloned()
    }

    /// Removes `peer` only if its entry still belongs to connection
    /// `conn_id`. A task cleaning up after a replaced connection must not
    /// evict the replacement.
    pub fn remove_if(&self, peer: &PeerId, conn_id: u64) -> bool {
        let mut streams = self.streams.write();
        match streams.get(peer) {
            Some(handle) if handle.conn_id == conn_id => {
                streams.remove(peer);
                true
            }
            _ => false,
        }
    }

    /// Peers registered at the time of the call.
    pub fn list_peers(&self) -> Vec<PeerId> {
        self.streams.read().keys().cloned().collect()
    }

    /// Peers and handles registered at the time of the call.
    pub fn snapshot(&self) -> Vec<(PeerId, PeerHandle)> {
        self.streams
            .read()
            .iter()
            .map(|(peer, handle)| (peer.clone(), handle.clone()))
            .collect()
    }

    /// Number of registered peers.
    pub fn len(&self) -> usize {
        self.streams.read().len()
    }

    /// Whether no peer is registered.
    pub fn is_empty(&self) -> bool {
        self.streams.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn put_replaces_existing_entry() {
        let registry = StreamRegistry::new();
        let (first, _rx1) = PeerHandle::channel(1);
        let (second, _rx2) = PeerHandle::channel(2);

        assert!(registry.put(PeerId::from("b"), first).is_none());
        let replaced = registry.put(PeerId::from("b"), second).unwrap();

        assert_eq!(replaced.conn_id(), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&PeerId::from("b")).unwrap().conn_id(), 2);
    }

    #[test]
    fn dropping_replaced_handle_closes_its_queue() {
        let registry = StreamRegistry::new();
        let (first, mut rx1) = PeerHandle::channel(1);
        let (second, _rx2) = PeerHandle::channel(2);

        registry.put(PeerId::from("b"), first);
        drop(registry.put(PeerId::from("b"), second));

        // The old writer task would observe end-of-queue here.
        assert!(matches!(
            rx1.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn remove_if_ignores_stale_connection_ids() {
        let registry = StreamRegistry::new();
        let (old, _rx1) = PeerHandle::channel(1);
        let (new, _rx2) = PeerHandle::channel(2);

        registry.put(PeerId::from("b"), old);
        registry.put(PeerId::from("b"), new);

        assert!(!registry.remove_if(&PeerId::from("b"), 1));
        assert_eq!(registry.len(), 1);
        assert!(registry.remove_if(&PeerId::from("b"), 2));
        assert!(registry.is_empty());
        assert!(!registry.remove_if(&PeerId::from("missing"), 2));
    }

    #[test]
    fn send_fails_after_receiver_dropped() {
        let (handle, rx) = PeerHandle::channel(7);
        assert!(handle.send(Message::new("a", 1, "A")).is_ok());
        drop(rx);
        assert!(handle.is_closed());
        let bounced = handle.send(Message::new("b", 2, "A")).unwrap_err();
        assert_eq!(bounced.sequence, 2);
    }

    #[test]
    fn snapshot_is_unaffected_by_later_mutation() {
        let registry = StreamRegistry::new();
        let (a, _ra) = PeerHandle::channel(1);
        let (b, _rb) = PeerHandle::channel(2);
        registry.put(PeerId::from("a"), a);
        registry.put(PeerId::from("b"), b);

        let snapshot = registry.snapshot();
        registry.remove_if(&PeerId::from("a"), 1);

        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.list_peers(), vec![PeerId::from("b")]);
    }

    #[test]
    fn concurrent_put_and_list_do_not_deadlock() {
        let registry = Arc::new(StreamRegistry::new());
        let mut handles = Vec::new();

        for t in 0..4u64 {
            let registry = Arc::clone(&registry);
            handles.push(std::thread::spawn(move || {
                for i in 0..200u64 {
                    let conn = t * 1_000 + i;
                    let (handle, _rx) = PeerHandle::channel(conn);
                    let peer = PeerId::new(format!("peer-{t}-{}", i % 10));
                    registry.put(peer.clone(), handle);
                    let _ = registry.snapshot();
                    registry.remove_if(&peer, conn);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert!(registry.is_empty());
    }
}
