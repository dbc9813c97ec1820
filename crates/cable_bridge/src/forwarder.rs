//! Forwarder
//!
//! Background task that drains a FIFO queue of broadcasts into an
//! [`ExternalSink`]. Callers enqueue without waiting; each sink call is
//! bounded by a timeout, and failures are logged and counted rather than
//! returned.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::{BridgeError, BridgeResult, ExternalSink, Forwarded};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Forwarding limits
#[derive(Debug, Clone)]
pub struct ForwarderConfig {
    /// Upper bound for a single sink call
    pub timeout: Duration,

    /// Forwards buffered before new ones are dropped
    pub queue_capacity: usize,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            queue_capacity: 1024,
        }
    }
}

impl ForwarderConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stats
// ─────────────────────────────────────────────────────────────────────────────

/// Forwarding outcome counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardStats {
    /// Sink calls that succeeded
    pub forwarded: u64,
    /// Sink calls that returned an error
    pub failed: u64,
    /// Sink calls that exceeded the timeout
    pub timed_out: u64,
    /// Forwards never attempted (queue full or forwarder closed)
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    forwarded: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> ForwardStats {
        ForwardStats {
            forwarded: self.forwarded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Forwarder
// ─────────────────────────────────────────────────────────────────────────────

enum ForwardCommand {
    Broadcast(Forwarded),
    Flush(oneshot::Sender<()>),
}

/// Handle to a running forwarding task
///
/// A single queue feeds the task, so forwards reach the sink in the order
/// they were enqueued, per channel and overall.
pub struct Forwarder {
    tx: RwLock<Option<mpsc::Sender<ForwardCommand>>>,
    counters: Arc<Counters>,
}

impl Forwarder {
    /// Spawn the forwarding task on the current tokio runtime
    pub fn spawn(sink: Arc<dyn ExternalSink>, config: ForwarderConfig) -> BridgeResult<Self> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| BridgeError::NoRuntime)?;

        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let counters = Arc::new(Counters::default());

        runtime.spawn(run_forwarder(sink, rx, config.timeout, Arc::clone(&counters)));
        debug!(
            timeout = ?config.timeout,
            queue_capacity = config.queue_capacity,
            "Forwarder started"
        );

        Ok(Self {
            tx: RwLock::new(Some(tx)),
            counters,
        })
    }

    /// Enqueue a broadcast without waiting, returns false if it was dropped
    pub fn forward(&self, channel: &str, payload: &str) -> bool {
        let guard = self.tx.read();
        let Some(tx) = guard.as_ref() else {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(channel = %channel, "Forwarder closed, broadcast not forwarded");
            return false;
        };

        let command = ForwardCommand::Broadcast(Forwarded {
            channel: channel.to_string(),
            payload: payload.to_string(),
        });

        match tx.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(channel = %channel, "Forward queue full, broadcast dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(channel = %channel, "Forwarder task gone, broadcast dropped");
                false
            }
        }
    }

    /// Wait until every forward enqueued before this call has been attempted
    pub async fn flush(&self) {
        let tx = self.tx.read().clone();
        let Some(tx) = tx else {
            return;
        };

        let (done_tx, done_rx) = oneshot::channel();
        if tx.send(ForwardCommand::Flush(done_tx)).await.is_err() {
            return;
        }
        let _ = done_rx.await;
    }

    /// Stop accepting forwards; already queued ones are still delivered
    pub fn close(&self) {
        if self.tx.write().take().is_some() {
            debug!("Forwarder closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.read().is_none()
    }

    pub fn stats(&self) -> ForwardStats {
        self.counters.snapshot()
    }
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("closed", &self.is_closed())
            .field("stats", &self.stats())
            .finish()
    }
}

async fn run_forwarder(
    sink: Arc<dyn ExternalSink>,
    mut rx: mpsc::Receiver<ForwardCommand>,
    timeout: Duration,
    counters: Arc<Counters>,
) {
    while let Some(command) = rx.recv().await {
        let forwarded = match command {
            ForwardCommand::Broadcast(forwarded) => forwarded,
            ForwardCommand::Flush(done) => {
                let _ = done.send(());
                continue;
            }
        };

        let call = sink.broadcast(&forwarded.channel, &forwarded.payload);
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(())) => {
                counters.forwarded.fetch_add(1, Ordering::Relaxed);
                trace!(channel = %forwarded.channel, "Broadcast forwarded");
            }
            Ok(Err(e)) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(channel = %forwarded.channel, error = %e, "External broadcast failed");
            }
            Err(_) => {
                counters.timed_out.fetch_add(1, Ordering::Relaxed);
                warn!(channel = %forwarded.channel, ?timeout, "External broadcast timed out");
            }
        }
    }

    debug!("Forwarder task stopped");
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FailingSink, RecordingSink, SlowSink};

    #[tokio::test]
    async fn test_forwards_in_order() {
        let sink = Arc::new(RecordingSink::default());
        let forwarder = Forwarder::spawn(sink.clone(), ForwarderConfig::default()).unwrap();

        for i in 0..50 {
            assert!(forwarder.forward("room:1", &i.to_string()));
        }
        forwarder.flush().await;

        let payloads: Vec<String> = sink.calls().into_iter().map(|f| f.payload).collect();
        let expected: Vec<String> = (0..50).map(|i| i.to_string()).collect();
        assert_eq!(payloads, expected);
        assert_eq!(forwarder.stats().forwarded, 50);
    }

    #[tokio::test]
    async fn test_sink_failure_is_counted() {
        let forwarder =
            Forwarder::spawn(Arc::new(FailingSink), ForwarderConfig::default()).unwrap();

        assert!(forwarder.forward("room:1", "hi"));
        forwarder.flush().await;

        assert_eq!(
            forwarder.stats(),
            ForwardStats {
                failed: 1,
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn test_slow_sink_times_out() {
        let config = ForwarderConfig::default().with_timeout(Duration::from_millis(20));
        let forwarder =
            Forwarder::spawn(Arc::new(SlowSink(Duration::from_secs(5))), config).unwrap();

        forwarder.forward("room:1", "hi");
        forwarder.flush().await;

        assert_eq!(forwarder.stats().timed_out, 1);
    }

    #[tokio::test]
    async fn test_full_queue_drops() {
        let sink = Arc::new(RecordingSink::default());
        let config = ForwarderConfig::default().with_queue_capacity(1);
        let forwarder = Forwarder::spawn(sink.clone(), config).unwrap();

        // Current-thread runtime: the task has not run yet, so the queue
        // still holds the first forward when the second arrives.
        assert!(forwarder.forward("room:1", "first"));
        assert!(!forwarder.forward("room:1", "second"));
        forwarder.flush().await;

        assert_eq!(sink.calls().len(), 1);
        assert_eq!(forwarder.stats().dropped, 1);
    }

    #[tokio::test]
    async fn test_closed_forwarder_drops() {
        let sink = Arc::new(RecordingSink::default());
        let forwarder = Forwarder::spawn(sink.clone(), ForwarderConfig::default()).unwrap();

        forwarder.close();
        assert!(forwarder.is_closed());
        assert!(!forwarder.forward("room:1", "late"));
        forwarder.flush().await;

        assert!(sink.calls().is_empty());
        assert_eq!(forwarder.stats().dropped, 1);
    }

    #[test]
    fn test_spawn_without_runtime() {
        let result = Forwarder::spawn(
            Arc::new(RecordingSink::default()),
            ForwarderConfig::default(),
        );
        assert!(matches!(result, Err(BridgeError::NoRuntime)));
    }
}
