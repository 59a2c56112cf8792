//! # CLI Interface
//!
//! Command-line arguments for `murmur-node`, parsed with `clap` derive. There
//! are no subcommands: the binary always starts one chat node.

use std::net::IpAddr;

use clap::{ArgAction, Parser};

use murmur_protocol::config::{NodeConfig, DEFAULT_LISTEN_HOST, DEFAULT_SOURCE_PORT, HANDSHAKE_TIMEOUT_MS};

use crate::logging::LogFormat;

/// Peer-to-peer flood chat node.
///
/// Reads chat lines from stdin, floods them to every connected peer and
/// prints every message it sees for the first time as `<origin|seq> > text`.
#[derive(Parser, Debug)]
#[command(name = "murmur-node", about = "Peer-to-peer flood chat node", version)]
pub struct MurmurCli {
    /// Source port to listen on (0 picks a free port).
    #[arg(long = "sp", env = "MURMUR_SOURCE_PORT", default_value_t = DEFAULT_SOURCE_PORT)]
    pub source_port: u16,

    /// Multiaddr of a peer to connect to at startup, e.g.
    /// `/ip4/127.0.0.1/tcp/3001/p2p/12D3KooW...`.
    #[arg(long = "dest", short = 'd', env = "MURMUR_DEST")]
    pub dest: Option<String>,

    /// Derive the node key from the bound listen port, so the peer id is
    /// stable across restarts on the same port.
    #[arg(
        long,
        env = "MURMUR_DEBUG",
        action = ArgAction::Set,
        default_value_t = true
    )]
    pub debug: bool,

    /// Address to bind the listener on. Must be a concrete interface
    /// address: it becomes the origin of every message this node sends.
    #[arg(long, env = "MURMUR_HOST", default_value_t = DEFAULT_LISTEN_HOST)]
    pub host: IpAddr,

    /// Deadline for the connection handshake, in milliseconds.
    #[arg(long, env = "MURMUR_HANDSHAKE_TIMEOUT_MS", default_value_t = HANDSHAKE_TIMEOUT_MS)]
    pub handshake_timeout_ms: u64,

    /// Default log filter when `RUST_LOG` is not set.
    #[arg(long, env = "MURMUR_LOG_LEVEL", default_value = "murmur_node=info,murmur_protocol=info")]
    pub log_level: String,

    /// Log output format.
    #[arg(long, env = "MURMUR_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Serve Prometheus metrics on this port. Disabled when omitted.
    #[arg(long, env = "MURMUR_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

impl MurmurCli {
    /// Runtime configuration for the protocol library.
    pub fn node_config(&self) -> NodeConfig {
        NodeConfig {
            listen_host: self.host,
            listen_port: self.source_port,
            bootstrap: self.dest.clone(),
            deterministic_identity: self.debug,
            handshake_timeout_ms: self.handshake_timeout_ms,
            ..NodeConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        MurmurCli::command().debug_assert();
    }

    #[test]
    fn defaults_match_node_config() {
        let cli = MurmurCli::try_parse_from(["murmur-node"]).unwrap();
        assert_eq!(cli.node_config(), NodeConfig::default());
        assert!(cli.metrics_port.is_none());
        assert_eq!(cli.log_format, LogFormat::Pretty);
    }

    #[test]
    fn parses_chat_flags() {
        let cli = MurmurCli::try_parse_from([
            "murmur-node",
            "--sp",
            "3002",
            "-d",
            "/ip4/127.0.0.1/tcp/3001",
            "--debug",
            "false",
            "--log-format",
            "json",
        ])
        .unwrap();

        let config = cli.node_config();
        assert_eq!(config.listen_port, 3002);
        assert_eq!(config.bootstrap.as_deref(), Some("/ip4/127.0.0.1/tcp/3001"));
        assert!(!config.deterministic_identity);
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn debug_flag_requires_a_value() {
        assert!(MurmurCli::try_parse_from(["murmur-node", "--debug", "maybe"]).is_err());
    }
}
