//! Graph source module
//!
//! The read side of replication: the [`GraphSource`] collaborator trait, the
//! closed property value model and a Neo4j Query API implementation.
//!
//! # Overview
//!
//! - `SourceEntity` - one node with its element id, labels and properties
//! - `PropertyValue` / `Temporal` - closed scalar variants with total
//!   conversions to JSON
//! - `Neo4jHttpSource` - range queries over HTTP with typed JSON decoding
//! - `InMemorySource` - fixed entity list, used as a test double

mod client;
mod decode;
mod memory;
mod rate_limit;
mod types;

pub use client::{query_endpoint, Neo4jHttpSource};
pub use memory::InMemorySource;
pub use rate_limit::RateLimiter;
pub use types::{GraphSource, PropertyValue, SourceEntity, Temporal};
