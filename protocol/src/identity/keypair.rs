//! Node key material and the peer identifier derived from it.
//!
//! Keys are Ed25519, held as a `libp2p::identity::Keypair` so the peer id
//! matches what any libp2p tooling would compute for the same key. The key
//! only names the node; chat content is not signed.

use std::fmt;

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::IdentityError;
use crate::config::KEY_SEED_LENGTH;

/// Stable identifier of a peer on the gossip network.
///
/// The base58 rendering of a libp2p peer id for real nodes. Any string is
/// accepted so in-process peers (tests, simulations) can use readable names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Wraps an identity string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<libp2p::PeerId> for PeerId {
    fn from(id: libp2p::PeerId) -> Self {
        Self(id.to_base58())
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A node's key pair together with its derived [`PeerId`]. `Debug` omits
/// the key.
#[derive(Clone)]
pub struct NodeIdentity {
    keypair: libp2p::identity::Keypair,
    peer_id: PeerId,
}

impl NodeIdentity {
    /// Generates a fresh Ed25519 identity from the OS RNG.
    pub fn generate() -> Result<Self, IdentityError> {
        let mut seed = [0u8; KEY_SEED_LENGTH];
        OsRng.fill_bytes(&mut seed);
        Self::from_seed(seed)
    }

    /// Derives an identity deterministically from a listen port.
    ///
    /// Debug mode: the same port always yields the same peer id, so a node
    /// can be restarted and redialed with an unchanged multiaddr. Never use
    /// this for a node reachable from outside a test bench.
    pub fn from_port_seed(port: u16) -> Result<Self, IdentityError> {
        let mut rng = StdRng::seed_from_u64(u64::from(port));
        let mut seed = [0u8; KEY_SEED_LENGTH];
        rng.fill_bytes(&mut seed);
        Self::from_seed(seed)
    }

    /// Builds an identity from raw Ed25519 secret key bytes.
    pub fn from_seed(mut seed: [u8; KEY_SEED_LENGTH]) -> Result<Self, IdentityError> {
        let keypair = libp2p::identity::Keypair::ed25519_from_bytes(&mut seed)
            .map_err(|e| IdentityError::KeyGeneration(e.to_string()))?;
        let peer_id = PeerId::from(keypair.public().to_peer_id());
        debug!(peer = %peer_id, "node identity created");
        Ok(Self { keypair, peer_id })
    }

    /// Picks the deterministic or random constructor.
    pub fn for_mode(deterministic: bool, port: u16) -> Result<Self, IdentityError> {
        if deterministic {
            Self::from_port_seed(port)
        } else {
            Self::generate()
        }
    }

    /// The identity's peer id.
    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    /// The public half of the key pair.
    pub fn public(&self) -> libp2p::identity::PublicKey {
        self.keypair.public()
    }
}

impl fmt::Debug for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeIdentity")
            .field("peer_id", &self.peer_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_seed_is_deterministic() {
        let a = NodeIdentity::from_port_seed(3001).unwrap();
        let b = NodeIdentity::from_port_seed(3001).unwrap();
        assert_eq!(a.peer_id(), b.peer_id());
    }

    #[test]
    fn different_ports_give_different_ids() {
        let a = NodeIdentity::from_port_seed(3001).unwrap();
        let b = NodeIdentity::from_port_seed(3002).unwrap();
        assert_ne!(a.peer_id(), b.peer_id());
    }

    #[test]
    fn random_identities_differ() {
        let a = NodeIdentity::generate().unwrap();
        let b = NodeIdentity::generate().unwrap();
        assert_ne!(a.peer_id(), b.peer_id());
    }

    #[test]
    fn peer_id_matches_libp2p_derivation() {
        let identity = NodeIdentity::from_port_seed(4000).unwrap();
        let expected = PeerId::from(identity.public().to_peer_id());
        assert_eq!(identity.peer_id(), &expected);
        // libp2p base58 peer ids are parseable back into libp2p's type.
        assert!(identity
            .peer_id()
            .as_str()
            .parse::<libp2p::PeerId>()
            .is_ok());
    }

    #[test]
    fn debug_output_hides_key_material() {
        let identity = NodeIdentity::from_port_seed(1).unwrap();
        let rendered = format!("{identity:?}");
        assert!(rendered.contains(identity.peer_id().as_str()));
        assert!(!rendered.contains("keypair"));
    }
}
