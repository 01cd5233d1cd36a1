use jiff::Timestamp;
use serde::Serialize;

/// Per-request charge-back record
///
/// Built once per request and filled in as response fragments are parsed.
/// Field names serialize in the column layout of the charge-back table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UsageRecord {
    /// When the record was created
    pub time_generated: Timestamp,
    /// Billing principal (`X-Consumer` header)
    pub consumer: String,
    /// Model reported by the upstream
    pub model: Option<String>,
    /// Response object type (e.g. `chat.completion.chunk`, `embedding`)
    pub object_type: Option<String>,
    /// Prompt tokens
    pub input_tokens: u64,
    /// Completion tokens
    pub output_tokens: u64,
    /// Input plus output, set by [`UsageRecord::finalize`]
    pub total_tokens: u64,
}

impl UsageRecord {
    /// Start an empty record for the given consumer
    pub fn new(consumer: impl Into<String>) -> Self {
        Self {
            time_generated: Timestamp::now(),
            consumer: consumer.into(),
            model: None,
            object_type: None,
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
        }
    }

    /// Compute the total token count
    pub const fn finalize(&mut self) {
        self.total_tokens = self.input_tokens.saturating_add(self.output_tokens);
    }

    /// Whether any usage was extracted from the response
    pub const fn has_usage(&self) -> bool {
        self.input_tokens > 0 || self.output_tokens > 0
    }
}
