//! Usage extraction from upstream response bodies
//!
//! Each response fragment is decoded into a partial schema in which every
//! field is optional and a malformed field reads as absent, so one odd
//! value never discards the rest of the fragment.

use serde::Deserialize;
use serde_with::{DefaultOnError, DisplayFromStr, PickFirst, serde_as};
use tollway_core::UsageRecord;

const SSE_DATA: &str = "data:";
const SSE_DONE: &str = "[DONE]";

/// One JSON document or streamed fragment
#[serde_as]
#[derive(Debug, Default, Deserialize)]
struct Segment {
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    object: Option<String>,
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    model: Option<String>,
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    usage: Option<Usage>,
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    data: Option<Vec<DataItem>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Token counts; some upstreams send them as strings
#[serde_as]
#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(_, DisplayFromStr)>>>")]
    #[serde(default)]
    completion_tokens: Option<u64>,
}

/// Element of a `list` response
#[serde_as]
#[derive(Debug, Default, Deserialize)]
struct DataItem {
    #[serde_as(as = "DefaultOnError")]
    #[serde(default)]
    object: Option<String>,
}

impl Segment {
    /// Fold this segment into the record
    fn apply(mut self, record: &mut UsageRecord) {
        if let Some(error) = self.error.take() {
            let message = error
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default();
            tracing::warn!(message, "upstream reported an error in the response body");
            return;
        }

        let object_type = match self.object.take() {
            Some(object) if object == "chat.completion" => Some(object),
            // Only the final chunk of a usage-enabled stream carries usage
            Some(object) if object == "chat.completion.chunk" && self.usage.is_some() => Some(object),
            Some(object) if object == "list" => self
                .data
                .take()
                .and_then(|items| items.into_iter().next())
                .and_then(|item| item.object),
            _ => None,
        };

        if let Some(object_type) = object_type {
            record.object_type = Some(object_type);
            self.copy_usage(record);
        }
    }

    fn copy_usage(self, record: &mut UsageRecord) {
        if let Some(model) = self.model {
            record.model = Some(model);
        }

        let Some(usage) = self.usage else {
            return;
        };

        if let Some(prompt) = usage.prompt_tokens {
            record.input_tokens = prompt;
        }
        if let Some(completion) = usage.completion_tokens {
            record.output_tokens = completion;
        }
    }
}

/// Whether a body should be read as a stream of `data:` segments
pub fn is_event_stream(content_type: Option<&str>, body: &[u8]) -> bool {
    let declared = content_type.is_some_and(|ct| ct.trim_start().starts_with("text/event-stream"));
    declared || body.trim_ascii_start().starts_with(SSE_DATA.as_bytes())
}

/// Parse a complete response body into `record`
///
/// Returns the number of segments that were decoded.
pub fn extract_usage(body: &[u8], event_stream: bool, record: &mut UsageRecord) -> usize {
    let text = String::from_utf8_lossy(body);

    if event_stream {
        data_segments(&text)
            .into_iter()
            .filter(|segment| apply_segment(segment, record))
            .count()
    } else {
        usize::from(apply_segment(text.trim(), record))
    }
}

fn apply_segment(raw: &str, record: &mut UsageRecord) -> bool {
    match serde_json::from_str::<Segment>(raw) {
        Ok(segment) => {
            segment.apply(record);
            true
        }
        Err(e) => {
            tracing::debug!(error = %e, "skipping unparsable response segment");
            false
        }
    }
}

/// Payloads of the `data:` fields of an event stream
///
/// Consecutive `data:` lines of one event are joined with newlines. Empty
/// payloads and the `[DONE]` sentinel are dropped.
fn data_segments(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        if line.trim().is_empty() {
            segments.extend(current.take());
            continue;
        }

        if let Some(data) = line.strip_prefix(SSE_DATA) {
            let data = data.strip_prefix(' ').unwrap_or(data);
            match current {
                Some(ref mut pending) => {
                    pending.push('\n');
                    pending.push_str(data);
                }
                None => current = Some(data.to_owned()),
            }
        }
    }
    segments.extend(current);

    segments.retain(|segment| {
        let segment = segment.trim();
        !segment.is_empty() && segment != SSE_DONE
    });
    segments
}
