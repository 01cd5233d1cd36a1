//! Shared types for the tollway workspace

#![allow(clippy::must_use_candidate)]

mod consumer;
mod error;
mod usage;

pub use consumer::{CONSUMER_HEADER, UNKNOWN_CONSUMER, consumer_from_headers};
pub use error::HttpError;
pub use usage::UsageRecord;
