use http::HeaderMap;

/// Header naming the billing principal of a request
pub const CONSUMER_HEADER: &str = "x-consumer";

/// Consumer recorded when the request carries no `X-Consumer` header
pub const UNKNOWN_CONSUMER: &str = "Unknown Consumer";

/// Resolve the billing principal for a request
pub fn consumer_from_headers(headers: &HeaderMap) -> String {
    headers
        .get(CONSUMER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map_or_else(|| UNKNOWN_CONSUMER.to_owned(), ToOwned::to_owned)
}
