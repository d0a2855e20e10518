//! # Repository Layer
//!
//! Thin wrappers over SeaORM for the SEO control state and the indexing queue.
//! Repositories return `DbErr`; pipeline operations decide how a failure degrades.

pub mod city_registry;
pub mod index_queue;
pub mod system_config;

pub use city_registry::CityRegistryRepository;
pub use index_queue::{IndexQueueRepository, PendingUrl};
pub use system_config::SystemConfigRepository;
