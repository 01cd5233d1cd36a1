use async_trait::async_trait;
use tollway_core::UsageRecord;

use crate::error::ChargebackError;

/// Durable destination for finished usage records
///
/// Delivery is best-effort; callers log failures and move on.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Deliver one record
    async fn emit(&self, record: &UsageRecord) -> Result<(), ChargebackError>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Writes records to the application log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl TelemetrySink for LogSink {
    async fn emit(&self, record: &UsageRecord) -> Result<(), ChargebackError> {
        tracing::info!(
            target: "tollway::chargeback",
            time_generated = %record.time_generated,
            consumer = %record.consumer,
            model = record.model.as_deref().unwrap_or_default(),
            object_type = record.object_type.as_deref().unwrap_or_default(),
            input_tokens = record.input_tokens,
            output_tokens = record.output_tokens,
            total_tokens = record.total_tokens,
            "usage recorded"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
