//! # Indexing
//!
//! Submission of queued URLs to the external search indexing API.

pub mod client;
pub mod processor;
pub mod worker;

pub use client::{GoogleIndexingClient, IndexingApi};
pub use processor::{ProcessSummary, QueueProcessor};
pub use worker::IndexingWorker;
