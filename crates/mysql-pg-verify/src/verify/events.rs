//! Delivery of [`VerifyEvent`]s to an optional consumer.

use tokio::sync::mpsc;
use tracing::debug;

use super::types::VerifyEvent;

/// Forwards events to a channel when one is attached.
///
/// A closed or absent receiver never fails a run.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<VerifyEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<VerifyEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Sink that only traces.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub async fn emit(&self, event: VerifyEvent) {
        debug!(target: "mysql_pg_verify::events", "{}", event);
        if let Some(tx) = &self.tx {
            let _ = tx.send(event).await;
        }
    }
}
