//! # Prometheus Metrics
//!
//! Exposes the node's flood counters at `/metrics`. The protocol library only
//! keeps atomic counters; every scrape advances the Prometheus counters below
//! to a fresh [`StatsSnapshot`] before encoding.
//!
//! All metrics live in a dedicated [`prometheus::Registry`] under the
//! `murmur` prefix.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use parking_lot::Mutex;
use prometheus::{IntCounter, IntGauge, Registry, TextEncoder};

use murmur_protocol::network::{GossipNode, StatsSnapshot};

/// Prometheus handles mirroring [`StatsSnapshot`].
///
/// The snapshot totals only grow, so each counter is advanced by the
/// difference since the previous scrape.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Network messages accepted on first sight.
    pub messages_accepted: IntCounter,
    /// Network messages dropped as duplicates.
    pub duplicates_dropped: IntCounter,
    /// Messages typed in locally.
    pub messages_originated: IntCounter,
    /// Per-peer frames handed to outbound queues.
    pub frames_forwarded: IntCounter,
    /// Broadcast sends that hit a closed stream.
    pub broadcast_failures: IntCounter,
    /// Streams attached since startup.
    pub streams_opened: IntCounter,
    /// Streams removed since startup.
    pub streams_closed: IntCounter,
    /// Peers with an open stream right now.
    pub connected_peers: IntGauge,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    let counter = IntCounter::new(name, help)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGauge, prometheus::Error> {
    let gauge = IntGauge::new(name, help)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

/// Moves `counter` up to `total`. Never moves it down.
fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("murmur".into()), None)?;

        Ok(Self {
            messages_accepted: counter(
                &registry,
                "messages_accepted_total",
                "Network messages seen for the first time",
            )?,
            duplicates_dropped: counter(
                &registry,
                "duplicates_dropped_total",
                "Network messages dropped as already seen",
            )?,
            messages_originated: counter(
                &registry,
                "messages_originated_total",
                "Chat messages created by this node",
            )?,
            frames_forwarded: counter(
                &registry,
                "frames_forwarded_total",
                "Per-peer frames queued for sending",
            )?,
            broadcast_failures: counter(
                &registry,
                "broadcast_failures_total",
                "Broadcast sends that found the peer stream closed",
            )?,
            streams_opened: counter(&registry, "streams_opened_total", "Peer streams attached")?,
            streams_closed: counter(&registry, "streams_closed_total", "Peer streams removed")?,
            connected_peers: gauge(
                &registry,
                "connected_peers",
                "Number of peers with an open stream",
            )?,
            registry,
        })
    }

    /// Brings the counters up to a stats snapshot and sets the live peer count.
    pub fn observe(&self, stats: &StatsSnapshot, peers: usize) {
        advance(&self.messages_accepted, stats.messages_accepted);
        advance(&self.duplicates_dropped, stats.duplicates_dropped);
        advance(&self.messages_originated, stats.messages_originated);
        advance(&self.frames_forwarded, stats.frames_queued);
        advance(&self.broadcast_failures, stats.broadcast_failures);
        advance(&self.streams_opened, stats.streams_opened);
        advance(&self.streams_closed, stats.streams_closed);
        self.connected_peers.set(peers as i64);
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

/// State shared with the `/metrics` handler.
pub struct MetricsState {
    /// Metric handles.
    pub metrics: NodeMetrics,
    /// The node whose counters are exported.
    pub node: Arc<GossipNode>,
    /// Serializes scrapes so two of them cannot advance a counter twice.
    pub scrape: Mutex<()>,
}

impl MetricsState {
    /// State exporting `node` through `metrics`.
    pub fn new(metrics: NodeMetrics, node: Arc<GossipNode>) -> Self {
        Self {
            metrics,
            node,
            scrape: Mutex::new(()),
        }
    }

    /// Refreshes the metrics from the node and encodes them.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let _guard = self.scrape.lock();
        self.metrics
            .observe(&self.node.stats(), self.node.peer_count());
        self.metrics.encode()
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<MetricsState>;

/// Builds the router serving `/metrics`.
pub fn router(state: SharedMetrics) -> axum::Router {
    axum::Router::new()
        .route("/metrics", axum::routing::get(metrics_handler))
        .with_state(state)
}

/// Axum handler that refreshes the metrics and renders them.
pub async fn metrics_handler(State(state): State<SharedMetrics>) -> impl IntoResponse {
    match state.render() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
