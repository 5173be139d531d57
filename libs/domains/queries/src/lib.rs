//! Queries Domain Library
//!
//! Interactive producer side of semantic search: free-text queries are
//! embedded, encoded against the registered Avro schema and published to a
//! stream topic for downstream similarity matching.
//!
//! ```text
//! stdin ─► QueryLoop ─► EmbeddingProvider ─► EventEncoder ─► StreamPublisher
//!                            (optional)        │
//!                                              └─ SchemaRegistry
//! ```
//!
//! An embedding outage degrades the event to text-only instead of dropping
//! the query.

pub mod encoder;
pub mod error;
pub mod models;
pub mod query_loop;
pub mod registry;

pub use encoder::{EventEncoder, frame_schema_id};
pub use error::{QueryError, QueryResult};
pub use models::QueryEvent;
pub use query_loop::{LoopState, LoopSummary, QueryLoop, QueryLoopConfig, FLUSH_NOTICE, PROMPT};
pub use registry::{
    HttpSchemaRegistry, RegisteredSchema, SchemaRegistry, SchemaRegistryConfig, StaticSchemaRegistry,
    USER_QUERY_SCHEMA, value_subject,
};
