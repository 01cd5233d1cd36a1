//! Request pipeline of the tollway proxy
//!
//! An inbound request is matched to a cluster, replayed against its
//! destinations until one gives a deliverable response, and the response
//! body is metered on its way back to the caller.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod error;
pub mod forward;
mod headers;
pub mod meter;
pub mod retry;
mod rewrite;
mod router;
pub mod segment;
mod state;

pub use error::ProxyError;
pub use forward::{BodyStream, ForwardError, Forwarder, ReqwestForwarder, UpstreamRequest, UpstreamResponse};
pub use retry::{Delivery, PreparedRequest, RetryController, RetryPolicy};
pub use router::proxy_router;
pub use state::ProxyState;
