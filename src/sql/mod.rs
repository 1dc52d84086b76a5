//! SQL text generation: identifier hygiene, dialect switches, and the
//! recursive query builder.

pub mod builder;
pub mod dialect;

pub use builder::QueryBuilder;
pub use dialect::Dialect;

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

static IDENTIFIER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern"));

/// Reject any name that is not a plain SQL identifier.
///
/// Everything spliced into SQL text (table names, column names, aliases,
/// sort fields) passes through here first. User-supplied values never do;
/// they are always bound as parameters.
pub fn validate_identifier(name: &str) -> Result<()> {
    if IDENTIFIER_PATTERN.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}
