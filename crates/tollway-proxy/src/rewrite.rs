//! Request body rewriting

use bytes::Bytes;
use serde_json::{Map, Value};

/// Ask a streaming request to report usage in its final chunk
///
/// Returns the rewritten body when `stream` is `true` and
/// `stream_options.include_usage` is not already `true`. Any other body,
/// including one that is not JSON, is left to be forwarded untouched.
pub fn force_usage(body: &[u8]) -> Option<Bytes> {
    if body.is_empty() {
        return None;
    }

    let mut document: Value = match serde_json::from_slice(body) {
        Ok(document) => document,
        Err(e) => {
            tracing::debug!(error = %e, "request body is not JSON, forwarding unchanged");
            return None;
        }
    };

    let object = document.as_object_mut()?;

    if object.get("stream").and_then(Value::as_bool) != Some(true) {
        return None;
    }

    let includes_usage = object
        .get("stream_options")
        .and_then(|options| options.get("include_usage"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if includes_usage {
        return None;
    }

    match object.get_mut("stream_options") {
        Some(Value::Object(options)) => {
            options.insert("include_usage".to_owned(), Value::Bool(true));
        }
        _ => {
            let mut options = Map::new();
            options.insert("include_usage".to_owned(), Value::Bool(true));
            object.insert("stream_options".to_owned(), Value::Object(options));
        }
    }

    match serde_json::to_vec(&document) {
        Ok(rewritten) => Some(Bytes::from(rewritten)),
        Err(e) => {
            tracing::debug!(error = %e, "failed to serialize rewritten request body");
            None
        }
    }
}
