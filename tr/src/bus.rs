//! Change bus - pub/sub fan-out for file-change notifications
//!
//! Consumers (CLI watchers, audit sinks) subscribe to capture events via a
//! bounded broadcast channel. Emission is fire-and-forget and never stalls
//! the capture path; slow subscribers drop the oldest notices and observe a
//! lag count.

use tokio::sync::broadcast;
use tracing::debug;

use crate::snapshot::ChangeOp;

/// Default channel capacity (notices)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1_024;

/// Lightweight notification for one captured change
#[derive(Debug, Clone)]
pub struct ChangeNotice {
    pub change_id: String,
    pub session_id: String,
    pub agent_id: String,
    pub file_path: String,
    pub op: ChangeOp,
}

/// Broadcast bus for change notices
pub struct ChangeBus {
    tx: broadcast::Sender<ChangeNotice>,
}

impl ChangeBus {
    /// Create a bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit a notice to all subscribers
    ///
    /// No subscribers is fine; the notice is dropped.
    pub fn emit(&self, notice: ChangeNotice) {
        debug!(change_id = %notice.change_id, file = %notice.file_path, "ChangeBus::emit");
        let _ = self.tx.send(notice);
    }

    /// Subscribe to notices emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotice> {
        self.tx.subscribe()
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice(id: &str) -> ChangeNotice {
        ChangeNotice {
            change_id: id.to_string(),
            session_id: "sess".to_string(),
            agent_id: "agent".to_string(),
            file_path: "src/lib.rs".to_string(),
            op: ChangeOp::Write,
        }
    }

    #[tokio::test]
    async fn test_emit_and_receive() {
        let bus = ChangeBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(notice("c-1"));

        let got = rx.recv().await.unwrap();
        assert_eq!(got.change_id, "c-1");
        assert_eq!(got.op, ChangeOp::Write);
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_ok() {
        let bus = ChangeBus::new(16);
        bus.emit(notice("c-2"));
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_instead_of_blocking() {
        let bus = ChangeBus::new(2);
        let mut rx = bus.subscribe();

        for i in 0..10 {
            bus.emit(notice(&format!("c-{}", i)));
        }

        // The emitter never blocked; the receiver sees a lag error first
        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(missed)) => assert!(missed > 0),
            Ok(n) => assert!(n.change_id.starts_with("c-")),
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }
}
