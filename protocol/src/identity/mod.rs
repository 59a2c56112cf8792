//! # Identity Module
//!
//! Who a node is and how to reach other nodes.
//!
//! 1. **Keypair**: Ed25519 key material and the derived [`PeerId`]. In debug
//!    mode the key is seeded from the listen port so identities survive
//!    restarts.
//! 2. **Address**: multiaddr parsing into a TCP dial target plus the peer id
//!    the remote side must present.

pub mod address;
pub mod keypair;

pub use address::{dialable_address, listen_multiaddr, PeerAddr};
pub use keypair::{NodeIdentity, PeerId};

use thiserror::Error;

/// Errors raised while creating identities or parsing peer addresses.
///
/// All of these are setup errors: the node cannot start without a valid
/// identity and a parseable bootstrap address.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Key derivation from the seed material failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// The string is not a multiaddr at all.
    #[error("invalid peer address {input:?}: {reason}")]
    InvalidAddress {
        /// The rejected input.
        input: String,
        /// Parser diagnostics.
        reason: String,
    },

    /// The multiaddr parsed but cannot be dialed over TCP.
    #[error("unsupported peer address {input:?}: {component}")]
    UnsupportedAddress {
        /// The rejected input.
        input: String,
        /// The offending or missing component.
        component: String,
    },
}
