// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # murmur Chat Node
//!
//! Entry point for the `murmur-node` binary. Parses CLI arguments, sets up
//! logging, binds the TCP listener, optionally dials a bootstrap peer and
//! then relays until the process is signalled. Closing stdin only stops
//! local input; the node keeps forwarding peer traffic.
//!
//! Tasks:
//!
//! - dispatcher  - dedups and floods network messages (spawned by `launch`)
//! - accept loop - handshakes and attaches inbound peers
//! - writer      - turns stdin lines into local messages
//! - printer     - writes accepted messages to stdout
//! - metrics     - optional Prometheus endpoint

mod cli;
mod logging;
mod metrics;

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::signal;

use murmur_protocol::identity::PeerAddr;
use murmur_protocol::network::{run_writer, GossipNode, TcpTransport};

use cli::MurmurCli;
use metrics::{MetricsState, NodeMetrics};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = MurmurCli::parse();
    logging::init_logging(&cli.log_level, cli.log_format);

    let config = cli.node_config();
    tracing::info!(
        host = %config.listen_host,
        port = config.listen_port,
        deterministic = config.deterministic_identity,
        protocol = murmur_protocol::config::PROTOCOL_NAME,
        version = murmur_protocol::config::PROTOCOL_VERSION,
        "starting murmur-node"
    );

    // --- Listener & identity ---
    let (transport, identity) = TcpTransport::bind_with_identity(&config)
        .await
        .context("failed to start listener")?;
    let transport = Arc::new(transport);

    // --- Node ---
    let runtime = GossipNode::launch(identity.peer_id().clone(), transport.listen_addr().to_string());
    let node = Arc::clone(&runtime.node);

    eprintln!(
        "Run 'murmur-node --sp <port> -d {}' on another console.",
        transport.dial_addr()
    );
    eprintln!("You can replace 127.0.0.1 with your public IP as well.");

    // --- Bootstrap ---
    if let Some(dest) = &config.bootstrap {
        let addr = PeerAddr::parse(dest).with_context(|| format!("invalid --dest address {dest}"))?;
        let peer = transport
            .dial(&node, &addr)
            .await
            .with_context(|| format!("failed to connect to {dest}"))?;
        tracing::info!(peer = %peer, "connected to bootstrap peer");
    }

    // --- Accept loop ---
    let accept = {
        let transport = Arc::clone(&transport);
        let node = Arc::clone(&node);
        tokio::spawn(async move { transport.run_accept_loop(node).await })
    };

    // --- Printer ---
    let mut output = runtime.output;
    let printer = tokio::spawn(async move {
        while let Some(message) = output.recv().await {
            println!("{message}");
        }
    });

    // --- Metrics server ---
    let metrics_server = match cli.metrics_port {
        Some(port) => {
            let state = Arc::new(MetricsState::new(
                NodeMetrics::new().context("failed to create metrics registry")?,
                Arc::clone(&node),
            ));
            let addr = format!("{}:{}", config.listen_host, port);
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind metrics listener on {addr}"))?;
            tracing::info!("metrics server listening on {}", addr);

            Some(tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, metrics::router(state)).await {
                    tracing::error!("metrics server error: {}", e);
                }
            }))
        }
        None => None,
    };

    // --- Run ---
    relay_until(
        Arc::clone(&node),
        BufReader::new(tokio::io::stdin()),
        shutdown_signal(),
    )
    .await;

    accept.abort();
    printer.abort();
    runtime.dispatcher.abort();
    if let Some(server) = metrics_server {
        server.abort();
    }

    let stats = node.stats();
    tracing::info!(
        accepted = stats.messages_accepted,
        duplicates = stats.duplicates_dropped,
        originated = stats.messages_originated,
        peers = node.peer_count(),
        "murmur-node stopped"
    );
    Ok(())
}

/// Publishes `input` line by line, then keeps the node relaying until
/// `shutdown` resolves.
async fn relay_until<R, F>(node: Arc<GossipNode>, input: R, shutdown: F)
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    tokio::select! {
        res = run_writer(node, input) => {
            match res {
                Ok(published) => tracing::info!(published, "stdin closed, relaying until shutdown"),
                Err(e) => tracing::error!("failed to read stdin, relaying until shutdown: {}", e),
            }
            (&mut shutdown).await;
        }
        _ = &mut shutdown => {}
    }

    tracing::info!("shutdown signal received");
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// If a handler cannot be installed, that signal is simply never observed.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
