use std::sync::Arc;

use tokio::sync::mpsc;
use tollway_core::UsageRecord;
use tollway_telemetry::{Counter, KeyValue, metrics};

use crate::error::ChargebackError;
use crate::sink::TelemetrySink;

/// Hands finished usage records to the sink without blocking the caller
///
/// Records travel over an unbounded channel to a background task that
/// delivers them one at a time. Delivery failures are logged and counted,
/// never reported back.
#[derive(Clone)]
pub struct ChargebackEmitter {
    tx: mpsc::UnboundedSender<UsageRecord>,
}

impl ChargebackEmitter {
    /// Create an emitter and spawn its delivery task
    ///
    /// The task runs until every clone of the emitter is dropped.
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(deliver_records(rx, sink));

        Self { tx }
    }

    /// Enqueue a record for delivery
    pub fn emit(&self, record: UsageRecord) {
        if let Err(e) = self.tx.send(record) {
            tracing::warn!(
                consumer = %e.0.consumer,
                "failed to enqueue usage record, delivery task stopped"
            );
            dropped_counter().add(1, &[KeyValue::new("reason", "closed")]);
        }
    }
}

impl std::fmt::Debug for ChargebackEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChargebackEmitter").finish_non_exhaustive()
    }
}

fn dropped_counter() -> Counter<u64> {
    metrics::counter(metrics::CHARGEBACK_DROPPED, "Usage records that never reached the sink")
}

async fn deliver_records(mut rx: mpsc::UnboundedReceiver<UsageRecord>, sink: Arc<dyn TelemetrySink>) {
    let dropped = dropped_counter();

    while let Some(record) = rx.recv().await {
        match sink.emit(&record).await {
            Ok(()) => {
                tracing::debug!(
                    sink = sink.name(),
                    consumer = %record.consumer,
                    total_tokens = record.total_tokens,
                    "usage record delivered"
                );
            }
            Err(ChargebackError::CircuitOpen) => {
                tracing::debug!(sink = sink.name(), consumer = %record.consumer, "usage record dropped, circuit open");
                dropped.add(1, &[KeyValue::new("reason", "circuit_open")]);
            }
            Err(e) => {
                tracing::warn!(
                    sink = sink.name(),
                    error = %e,
                    consumer = %record.consumer,
                    total_tokens = record.total_tokens,
                    "failed to deliver usage record"
                );
                dropped.add(1, &[KeyValue::new("reason", "error")]);
            }
        }
    }

    tracing::debug!("chargeback emitter shutting down");
}
