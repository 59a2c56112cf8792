//! # TCP Transport
//!
//! Stream establishment for the gossip node: a Tokio TCP listener for inbound
//! peers, a dialer for the bootstrap peer, and the hello handshake that tells
//! each side who is on the other end.
//!
//! ```text
//! Dialer                              Listener
//! ──────                              ────────
//!   │  hello {protocol, peer_id, ..}    │
//!   │─────────────────────────────────> │
//!   │  hello {protocol, peer_id, ..}    │
//!   │<───────────────────────────────── │
//!   │  chat frames, both directions     │
//! ```
//!
//! Both sides send their hello before reading, so neither waits on the other.
//! The handshake and all later traffic share one `Framed` codec, which is
//! handed to the node intact; bytes that arrived right behind the hello are
//! not lost.
//!
//! The hello is not authenticated. Message content is not signed either, so
//! a peer lying about its id gains nothing it could not already do.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use libp2p::Multiaddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use super::codec::{FrameCodec, Hello, WireFrame};
use super::error::NetworkError;
use super::node::GossipNode;
use crate::config::{NodeConfig, PROTOCOL_NAME};
use crate::identity::{dialable_address, listen_multiaddr, NodeIdentity, PeerAddr, PeerId};

/// Pause after a failed `accept()` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Sends `local`, then waits for and validates the remote hello.
///
/// Rejects a different protocol name and a remote claiming our own peer id.
pub async fn handshake<S>(
    framed: &mut Framed<S, FrameCodec>,
    local: &Hello,
) -> Result<Hello, NetworkError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    framed.send(WireFrame::Hello(local.clone())).await?;

    let remote = match framed.next().await {
        Some(Ok(WireFrame::Hello(hello))) => hello,
        Some(Ok(WireFrame::Chat(_))) => {
            return Err(NetworkError::Handshake("chat frame before hello".into()))
        }
        Some(Err(e)) => return Err(e.into()),
        None => return Err(NetworkError::ConnectionClosed),
    };

    if remote.protocol != local.protocol {
        return Err(NetworkError::ProtocolMismatch {
            expected: local.protocol.clone(),
            actual: remote.protocol,
        });
    }
    if remote.peer_id == local.peer_id {
        return Err(NetworkError::SelfConnection(remote.peer_id));
    }

    Ok(remote)
}

/// A bound TCP listener plus the local hello it presents to every peer.
#[derive(Debug)]
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
    listen_addr: Multiaddr,
    hello: Hello,
    handshake_timeout: Duration,
    max_frame_length: usize,
}

impl TcpTransport {
    /// Binds the listener described by `config` for an existing identity.
    pub async fn bind(identity: &NodeIdentity, config: &NodeConfig) -> Result<Self, NetworkError> {
        let (listener, local_addr) = listen(config).await?;
        Ok(Self::from_listener(listener, local_addr, identity, config))
    }

    /// Binds the listener described by `config`, then creates the node
    /// identity for the port actually bound.
    ///
    /// In deterministic mode the key is seeded from that port, so nodes
    /// started with `--sp 0` still get distinct peer ids.
    pub async fn bind_with_identity(
        config: &NodeConfig,
    ) -> Result<(Self, NodeIdentity), NetworkError> {
        let (listener, local_addr) = listen(config).await?;
        let identity = NodeIdentity::for_mode(config.deterministic_identity, local_addr.port())?;
        let transport = Self::from_listener(listener, local_addr, &identity, config);
        Ok((transport, identity))
    }

    fn from_listener(
        listener: TcpListener,
        local_addr: SocketAddr,
        identity: &NodeIdentity,
        config: &NodeConfig,
    ) -> Self {
        let listen_addr = listen_multiaddr(local_addr);

        info!(addr = %listen_addr, peer = %identity.peer_id(), "listening for peers");

        Self {
            listener,
            local_addr,
            hello: Hello {
                protocol: PROTOCOL_NAME.to_string(),
                peer_id: identity.peer_id().clone(),
                listen_addr: listen_addr.to_string(),
            },
            listen_addr,
            handshake_timeout: config.handshake_timeout(),
            max_frame_length: config.max_frame_length,
        }
    }

    /// The bound socket address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `/ip4/<ip>/tcp/<port>`; also the origin of local messages.
    pub fn listen_addr(&self) -> &Multiaddr {
        &self.listen_addr
    }

    /// The address other nodes pass to `--dest` to reach this one.
    pub fn dial_addr(&self) -> String {
        dialable_address(&self.listen_addr, &self.hello.peer_id)
    }

    fn codec(&self) -> FrameCodec {
        FrameCodec::with_max_length(self.max_frame_length)
    }

    /// Accepts peers forever, attaching each one that completes the
    /// handshake. Per-connection failures are logged and skipped.
    pub async fn run_accept_loop(&self, node: Arc<GossipNode>) {
        loop {
            let (stream, remote_addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };
            debug!(remote = %remote_addr, "incoming connection");

            let node = Arc::clone(&node);
            let hello = self.hello.clone();
            let codec = self.codec();
            let deadline = self.handshake_timeout;

            tokio::spawn(async move {
                match establish(stream, codec, &hello, deadline).await {
                    Ok((remote, framed)) => {
                        info!(peer = %remote.peer_id, addr = %remote.listen_addr, "got a new stream");
                        node.attach_framed(remote.peer_id, framed);
                    }
                    Err(e) => {
                        warn!(remote = %remote_addr, error = %e, "inbound handshake failed");
                    }
                }
            });
        }
    }

    /// Connects to `addr`, handshakes and attaches the stream to `node`.
    ///
    /// If `addr` names a peer id, the remote must present exactly that id.
    pub async fn dial(&self, node: &Arc<GossipNode>, addr: &PeerAddr) -> Result<PeerId, NetworkError> {
        let stream = TcpStream::connect(addr.dial_target.as_str())
            .await
            .map_err(|source| NetworkError::Dial {
                target: addr.dial_target.clone(),
                source,
            })?;

        let (remote, framed) =
            establish(stream, self.codec(), &self.hello, self.handshake_timeout).await?;

        if let Some(expected) = &addr.peer_id {
            if expected != &remote.peer_id {
                return Err(NetworkError::PeerMismatch {
                    expected: expected.clone(),
                    actual: remote.peer_id,
                });
            }
        }

        info!(peer = %remote.peer_id, addr = %addr, "connected to peer");
        node.attach_framed(remote.peer_id.clone(), framed);
        Ok(remote.peer_id)
    }
}

/// Binds the TCP listener. Refuses a wildcard host, since the listen address
/// is the origin of every local message.
async fn listen(config: &NodeConfig) -> Result<(TcpListener, SocketAddr), NetworkError> {
    if config.listen_host.is_unspecified() {
        return Err(NetworkError::UnspecifiedHost(config.listen_host));
    }

    let requested = SocketAddr::new(config.listen_host, config.listen_port);
    let listener = TcpListener::bind(requested)
        .await
        .map_err(|source| NetworkError::Bind {
            addr: requested,
            source,
        })?;
    let local_addr = listener.local_addr()?;
    Ok((listener, local_addr))
}

/// Frames a raw stream and runs the handshake under a deadline.
async fn establish<S>(
    stream: S,
    codec: FrameCodec,
    hello: &Hello,
    deadline: Duration,
) -> Result<(Hello, Framed<S, FrameCodec>), NetworkError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(stream, codec);
    let remote = tokio::time::timeout(deadline, handshake(&mut framed, hello))
        .await
        .map_err(|_| NetworkError::HandshakeTimeout {
            timeout_ms: deadline.as_millis() as u64,
        })??;
    Ok((remote, framed))
}
