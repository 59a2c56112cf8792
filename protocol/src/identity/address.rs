//! Peer address parsing.
//!
//! Peers advertise themselves as multiaddrs such as
//! `/ip4/127.0.0.1/tcp/3001/p2p/12D3KooW...`. The transport needs two things
//! out of that: something `tokio::net::TcpStream::connect` accepts, and the
//! peer id the remote end is expected to present during the handshake.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use libp2p::multiaddr::Protocol;
use libp2p::Multiaddr;

use super::{IdentityError, PeerId};

/// A resolved dial target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddr {
    /// The original multiaddr, as given.
    pub multiaddr: Multiaddr,
    /// `host:port` suitable for `TcpStream::connect`.
    pub dial_target: String,
    /// Peer id named by a trailing `/p2p/` component, if any.
    pub peer_id: Option<PeerId>,
}

impl PeerAddr {
    /// Parses a peer multiaddr string.
    ///
    /// Accepts an `ip4`, `ip6`, `dns`, `dns4` or `dns6` host, followed by a
    /// `tcp` port and an optional `p2p` peer id.
    pub fn parse(input: &str) -> Result<Self, IdentityError> {
        let multiaddr: Multiaddr = input
            .trim()
            .parse()
            .map_err(|e: libp2p::multiaddr::Error| IdentityError::InvalidAddress {
                input: input.to_string(),
                reason: e.to_string(),
            })?;

        let mut host: Option<String> = None;
        let mut port: Option<u16> = None;
        let mut peer_id: Option<PeerId> = None;

        for protocol in multiaddr.iter() {
            match protocol {
                Protocol::Ip4(ip) if host.is_none() => host = Some(ip.to_string()),
                Protocol::Ip6(ip) if host.is_none() => host = Some(format!("[{ip}]")),
                Protocol::Dns(name) | Protocol::Dns4(name) | Protocol::Dns6(name)
                    if host.is_none() =>
                {
                    host = Some(name.to_string())
                }
                Protocol::Tcp(p) if port.is_none() => port = Some(p),
                Protocol::P2p(id) => peer_id = Some(PeerId::from(id)),
                other => {
                    return Err(IdentityError::UnsupportedAddress {
                        input: input.to_string(),
                        component: other.to_string(),
                    })
                }
            }
        }

        let host = host.ok_or_else(|| IdentityError::UnsupportedAddress {
            input: input.to_string(),
            component: "missing host".into(),
        })?;
        let port = port.ok_or_else(|| IdentityError::UnsupportedAddress {
            input: input.to_string(),
            component: "missing tcp port".into(),
        })?;

        Ok(Self {
            multiaddr,
            dial_target: format!("{host}:{port}"),
            peer_id,
        })
    }
}

impl FromStr for PeerAddr {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.multiaddr)
    }
}

/// The `/ip4/<ip>/tcp/<port>` multiaddr of a bound socket.
///
/// Its string form is what a node stamps as `origin` on the messages it
/// creates.
pub fn listen_multiaddr(addr: SocketAddr) -> Multiaddr {
    Multiaddr::empty()
        .with(Protocol::from(addr.ip()))
        .with(Protocol::Tcp(addr.port()))
}

/// The full dialable address of a node: its listen multiaddr plus `/p2p/<id>`.
pub fn dialable_address(listen: &Multiaddr, peer_id: &PeerId) -> String {
    format!("{listen}/p2p/{peer_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::NodeIdentity;

    #[test]
    fn parses_ip4_tcp_without_peer_id() {
        let addr = PeerAddr::parse("/ip4/127.0.0.1/tcp/3001").unwrap();
        assert_eq!(addr.dial_target, "127.0.0.1:3001");
        assert!(addr.peer_id.is_none());
    }

    #[test]
    fn parses_trailing_peer_id() {
        let identity = NodeIdentity::from_port_seed(3001).unwrap();
        let text = format!("/ip4/127.0.0.1/tcp/3001/p2p/{}", identity.peer_id());
        let addr: PeerAddr = text.parse().unwrap();
        assert_eq!(addr.dial_target, "127.0.0.1:3001");
        assert_eq!(addr.peer_id.as_ref(), Some(identity.peer_id()));
    }

    #[test]
    fn parses_ip6_and_dns_hosts() {
        let v6 = PeerAddr::parse("/ip6/::1/tcp/4000").unwrap();
        assert_eq!(v6.dial_target, "[::1]:4000");

        let dns = PeerAddr::parse("/dns4/localhost/tcp/4001").unwrap();
        assert_eq!(dns.dial_target, "localhost:4001");
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            PeerAddr::parse("not a multiaddr"),
            Err(IdentityError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn rejects_missing_port() {
        assert!(matches!(
            PeerAddr::parse("/ip4/127.0.0.1"),
            Err(IdentityError::UnsupportedAddress { .. })
        ));
    }

    #[test]
    fn rejects_non_tcp_transport() {
        assert!(matches!(
            PeerAddr::parse("/ip4/127.0.0.1/udp/3001"),
            Err(IdentityError::UnsupportedAddress { .. })
        ));
    }

    #[test]
    fn listen_multiaddr_renders_origin_string() {
        let addr: SocketAddr = "127.0.0.1:3001".parse().unwrap();
        let multiaddr = listen_multiaddr(addr);
        assert_eq!(multiaddr.to_string(), "/ip4/127.0.0.1/tcp/3001");

        let peer = PeerId::new("QmPeer");
        assert_eq!(
            dialable_address(&multiaddr, &peer),
            "/ip4/127.0.0.1/tcp/3001/p2p/QmPeer"
        );
    }
}
