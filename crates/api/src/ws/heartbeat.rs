//! Liveness supervision for WebSocket registries.

use std::sync::Arc;
use std::time::Duration;

/// Default interval between heartbeat sweeps (in seconds).
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// A connection registry that can be swept for dead connections.
///
/// Implemented by both WebSocket registries; the heartbeat task itself is
/// registry-agnostic.
#[async_trait::async_trait]
pub trait Liveness: Send + Sync {
    /// Prune connections that missed the previous ping, then mark the
    /// survivors unresponsive and ping them.
    ///
    /// A connection is only terminated after missing two consecutive
    /// sweeps; a single slow pong never kills it. Returns
    /// `(pruned, pinged)` counts.
    async fn sweep_and_ping(&self) -> (usize, usize);
}

/// Spawn a background task that periodically sweeps a registry.
///
/// The returned `JoinHandle` can be used to abort the task during shutdown.
pub fn start_heartbeat<R>(registry: Arc<R>, interval: Duration) -> tokio::task::JoinHandle<()>
where
    R: Liveness + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;
            let (pruned, pinged) = registry.sweep_and_ping().await;
            if pruned > 0 {
                tracing::info!(pruned, pinged, "Pruned unresponsive WebSocket connections");
            } else {
                tracing::debug!(pinged, "WebSocket heartbeat ping");
            }
        }
    })
}
