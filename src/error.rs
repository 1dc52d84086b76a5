//! Unified error type for the mapping engine.
//!
//! Errors fall into four classes: configuration errors (bad descriptor
//! declarations — fatal, never retried), filter errors (bad criteria, caught
//! before any SQL executes), integrity errors (raised at persistence time),
//! and execution errors (propagated unchanged from the SQL facility).

use crate::filter::Operator;

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by descriptor validation, criteria compilation, query
/// building, hydration and persistence.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ------------------------------------------------------------------
    // Configuration errors
    // ------------------------------------------------------------------
    #[error("no primary key declared for entity '{entity}'")]
    MissingPrimaryKey { entity: String },

    #[error(
        "joined column '{column}' of relation '{attribute}' on entity '{entity}' \
         does not exist as a column on the target entity"
    )]
    MissingJoinedColumn {
        entity: String,
        attribute: String,
        column: String,
    },

    #[error("entity '{entity}' declares neither a table name nor a custom select")]
    MissingTable { entity: String },

    #[error("no attribute named '{attribute}' on entity '{entity}'")]
    UnknownAttribute { entity: String, attribute: String },

    #[error("configuration error: {0}")]
    Config(String),

    // ------------------------------------------------------------------
    // Filter errors
    // ------------------------------------------------------------------
    #[error("unknown column '{column}' used in criteria against '{scope}'")]
    UnknownColumn { column: String, scope: String },

    #[error("the operator '{operator:?}' does not support list values")]
    UnexpectedListValue { operator: Operator },

    #[error("the operator '{operator:?}' supports list values only, please provide them")]
    MissingListValue { operator: Operator },

    #[error("expected exactly two list values to use the BETWEEN operator, got {got}")]
    BetweenArity { got: usize },

    #[error("the operator '{operator:?}' requires a value")]
    MissingValue { operator: Operator },

    #[error("possible attempt of SQL injection, invalid identifier found: '{0}'")]
    InvalidIdentifier(String),

    #[error("a sort is required in order to use paging")]
    SortRequired,

    // ------------------------------------------------------------------
    // Integrity errors
    // ------------------------------------------------------------------
    #[error(
        "many-to-many relation '{attribute}' links an entity without a primary key; \
         mapped entities must be persisted before they can be linked"
    )]
    UnsavedLink { attribute: String },

    // ------------------------------------------------------------------
    // Conversion errors
    // ------------------------------------------------------------------
    #[error("cannot convert {value} to {target}")]
    Conversion { value: String, target: &'static str },

    // ------------------------------------------------------------------
    // Execution errors
    // ------------------------------------------------------------------
    #[error("execution error: {0}")]
    Execution(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
