//! # merlin-orm: Persistence Core
//!
//! Object-relational persistence core: a `Model` trait family mapping
//! application structs to relational rows, an `EntityManager` carrying the
//! save/delete lifecycle (existence resolution, validation pipeline,
//! lifecycle events, virtual-foreign-key integrity), a dual-mode
//! `Resultset` cursor and a finder facade with aggregates.
//!
//! Query compilation, schema migration and the database wire protocol are
//! out of scope; they are consumed through the `Connection`,
//! `MetadataProvider` and `QueryExecutor` capability traits.

pub mod connection;
pub mod error;
pub mod events;
pub mod manager;
pub mod message;
pub mod metadata;
pub mod model;
pub mod naming;
pub mod query;
pub mod relations;
pub mod resultset;
pub mod value;

// Re-export core traits and types
pub use connection::{BoundClause, Connection, Row, TableRef};
pub use error::{OrmError, OrmResult};
pub use events::{disable_events, events_disabled, EventDispatcher, LifecycleEvent};
pub use manager::{EntityManager, EntityManagerBuilder, ModelOps};
pub use message::{Message, MessageKind};
pub use metadata::{EntityMeta, InMemoryMetadata, MetadataProvider};
pub use model::{Model, ModelHooks, Operation, Record};
pub use query::{AggregateResult, Criteria, FindParams, QueryExecutor, QueryPlan};
pub use relations::{ForeignKeyRule, Relation, RelationKind, RelationRegistry};
pub use resultset::{CacheHint, Mode, Resultset, RowCursor};
pub use value::{bind, Value};
