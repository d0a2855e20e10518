//! # SEO Pipeline Library
//!
//! Revenue-driven SEO promotion and indexing for the travel affiliate site:
//! funnel aggregation, profit classification, plan building and application,
//! the health-gated indexing queue processor, and listing revenue scoring.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod indexing;
pub mod location;
pub mod models;
pub mod repositories;
pub mod revenue;
pub mod seo;
pub mod server;
pub mod telemetry;
pub use migration;
