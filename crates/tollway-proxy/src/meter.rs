//! Response body metering
//!
//! The caller sees upstream bytes unchanged and as they arrive; a copy is
//! kept so the usage record can be built once the body ends.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use tollway_chargeback::ChargebackEmitter;
use tollway_core::UsageRecord;
use tollway_telemetry::{KeyValue, metrics};

use crate::forward::{BodyStream, ForwardError};
use crate::segment;

/// Everything needed to turn the buffered body into a usage record
#[derive(Debug)]
pub struct Meter {
    pub record: UsageRecord,
    pub cluster: String,
    /// Upstream `Content-Type`, if any
    pub content_type: Option<String>,
    pub emitter: ChargebackEmitter,
}

impl Meter {
    fn complete(mut self, body: &[u8], ending: &'static str) {
        let event_stream = segment::is_event_stream(self.content_type.as_deref(), body);
        let segments = segment::extract_usage(body, event_stream, &mut self.record);
        self.record.finalize();

        tracing::debug!(
            cluster = %self.cluster,
            consumer = %self.record.consumer,
            ending,
            segments,
            body_bytes = body.len(),
            total_tokens = self.record.total_tokens,
            "response metered"
        );

        if self.record.has_usage() {
            let tokens = metrics::counter(metrics::TOKENS, "Tokens metered from upstream responses");
            let model = self.record.model.clone().unwrap_or_default();

            for (direction, count) in [("input", self.record.input_tokens), ("output", self.record.output_tokens)] {
                tokens.add(
                    count,
                    &[
                        KeyValue::new("cluster", self.cluster.clone()),
                        KeyValue::new("model", model.clone()),
                        KeyValue::new("direction", direction),
                    ],
                );
            }
        }

        self.emitter.emit(self.record);
    }
}

/// Pass-through body that meters itself when it ends
///
/// The record is emitted exactly once: when the upstream body ends, when
/// it fails, or when the caller goes away before either.
pub struct MeteredBody {
    inner: BodyStream,
    buffer: BytesMut,
    meter: Option<Meter>,
}

impl MeteredBody {
    pub fn new(inner: BodyStream, meter: Meter) -> Self {
        Self {
            inner,
            buffer: BytesMut::new(),
            meter: Some(meter),
        }
    }

    fn finish(&mut self, ending: &'static str) {
        if let Some(meter) = self.meter.take() {
            meter.complete(&self.buffer, ending);
            self.buffer.clear();
        }
    }
}

impl Stream for MeteredBody {
    type Item = Result<Bytes, ForwardError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if this.meter.is_some() {
                    this.buffer.extend_from_slice(&chunk);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                tracing::warn!(error = %e, "upstream body failed mid-stream");
                this.finish("error");
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finish("complete");
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for MeteredBody {
    fn drop(&mut self) {
        if self.meter.is_some() {
            tracing::debug!("caller went away before the body ended");
            self.finish("truncated");
        }
    }
}
