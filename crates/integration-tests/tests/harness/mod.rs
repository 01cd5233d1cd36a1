#![allow(dead_code)]

pub mod config;
pub mod mock_ingestion;
pub mod mock_upstream;
pub mod server;
