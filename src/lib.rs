//! # relmap
//!
//! A runtime relational-mapping engine: declarative per-type descriptors
//! drive predicate compilation, recursive join building, row-graph
//! hydration, and cascading persistence.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        EntityDescriptor (per-type, declared once)        │
//! │     table, primary key, attributes, relation metadata    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [sql::builder + filter::where_part]
//! ┌─────────────────────────────────────────────────────────┐
//! │        SELECT / LEFT JOIN chain + bound parameters       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [executor]
//! ┌─────────────────────────────────────────────────────────┐
//! │              flat rows (alias.column → value)            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [hydrate]
//! ┌─────────────────────────────────────────────────────────┐
//! │             deduplicated typed entity graph              │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Mutations run the other way: [`persist`] walks an entity's relation
//! graph and issues cascading insert/update/delete statements through the
//! same executor. [`mapper::DataMapper`] is the typed facade over both
//! directions.

pub mod entity;
pub mod error;
pub mod executor;
pub mod filter;
pub mod hydrate;
pub mod mapper;
pub mod persist;
pub mod schema;
pub mod sql;
pub mod value;

pub use entity::{Entity, Schema};
pub use error::{Error, Result};
pub use executor::{SqlExecutor, SqliteExecutor};
pub use filter::{Criteria, CriteriaGroup, Operator, Sort, SortDir, WherePart};
pub use hydrate::hydrate;
pub use mapper::{DataMapper, FetchOptions, Page};
pub use schema::{descriptor_of, DescriptorBuilder, EntityDescriptor, Relation};
pub use sql::{Dialect, QueryBuilder};
pub use value::{Kind, Row, Value};
