//! Backend dialect switch.
//!
//! The engine emits portable SQL everywhere except pagination, where SQL
//! Server wants `OFFSET .. ROWS FETCH NEXT .. ROWS ONLY` and everyone else
//! takes `LIMIT .. OFFSET ..`.

/// Identifies the SQL backend behind the execution facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    Sqlite,
    Postgres,
    MySql,
    SqlServer,
}

impl Dialect {
    /// Append pagination for the 1-based `page` of `page_size` rows.
    ///
    /// The statement must already carry an ORDER BY clause; paging without
    /// a stable order returns nondeterministic slices.
    pub fn paginate(self, sql: &str, page_size: u64, page: u64) -> String {
        let start_row = page.saturating_sub(1) * page_size;
        match self {
            Dialect::SqlServer => {
                format!("{sql} OFFSET {start_row} ROWS FETCH NEXT {page_size} ROWS ONLY")
            }
            _ => format!("{sql} LIMIT {page_size} OFFSET {start_row}"),
        }
    }
}
