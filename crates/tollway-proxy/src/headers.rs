//! Header rewriting between the caller and the upstream

use http::header::{self, HeaderMap, HeaderName};

/// Connection-scoped headers that never cross the proxy
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any named by `Connection`
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in &named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Headers to send upstream
///
/// Caller credentials are dropped; the bearer token is attached per
/// attempt. `Accept-Encoding` is dropped so the body arrives uncompressed
/// and can be metered. `Content-Length` is left to the transport, which
/// sets it from the (possibly rewritten) body.
pub fn upstream_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = inbound.clone();

    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers.remove(header::AUTHORIZATION);
    headers.remove("api-key");
    headers.remove(header::ACCEPT_ENCODING);
    headers.remove(header::CONTENT_LENGTH);

    headers
}

/// Headers to relay back to the caller
pub fn downstream_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = upstream.clone();
    strip_hop_by_hop(&mut headers);
    headers
}
