// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # murmur Core Library
//!
//! A peer-to-peer chat where every node floods every message it has not seen
//! before to every peer it knows, and drops everything else. No topology
//! knowledge, no hop counts: receiver-side dedup on `(origin, sequence)` is
//! the whole termination argument.
//!
//! ## Architecture
//!
//! - **network**: The flood engine: message store, dispatcher, per-stream
//!   pipelines, TCP transport and wire codec.
//! - **identity**: Ed25519 node identity and peer multiaddr parsing.
//! - **config**: Protocol constants and runtime node configuration.
//!
//! ## Quick look
//!
//! ```no_run
//! use murmur_protocol::identity::PeerId;
//! use murmur_protocol::network::GossipNode;
//!
//! # async fn demo() {
//! let mut runtime = GossipNode::launch(PeerId::from("alice"), "/ip4/127.0.0.1/tcp/3001");
//! runtime.node.publish("hello, everyone");
//! while let Some(message) = runtime.output.recv().await {
//!     println!("{message}");
//! }
//! # }
//! ```

pub mod config;
pub mod identity;
pub mod network;
