//! The recursive query builder: one descriptor tree in, one SELECT with a
//! LEFT JOIN chain out.
//!
//! Child occurrences get deterministic aliases (`parentTable_attribute`)
//! that double as the hydrator's dedup namespace. A visited-table stack
//! guards against relation cycles, and a fetch depth caps how far the join
//! chain descends.

use tracing::debug;

use crate::error::{Error, Result};
use crate::filter::{CriteriaGroup, Sort, SortDir, WherePart};
use crate::schema::{EntityDescriptor, Relation};
use crate::value::Value;

/// Joined columns are labeled `alias.column` so the hydrator can address
/// them per graph branch.
pub const COLUMN_LABEL_DELIMITER: char = '.';

/// Relation descent without a limit.
pub const UNLIMITED_DEPTH: i32 = -1;

/// A finished statement plus its positional parameters.
#[derive(Debug, Clone)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Builds fetch and count statements for one root descriptor.
pub struct QueryBuilder<'a> {
    root: &'static EntityDescriptor,
    filter: Option<&'a CriteriaGroup>,
    sort: Option<&'a Sort>,
    fetch_depth: i32,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(root: &'static EntityDescriptor) -> Self {
        Self {
            root,
            filter: None,
            sort: None,
            fetch_depth: UNLIMITED_DEPTH,
        }
    }

    #[must_use]
    pub fn filter(mut self, filter: &'a CriteriaGroup) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: &'a Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// `-1` descends without limit, `0` fetches the root only.
    #[must_use]
    pub fn fetch_depth(mut self, fetch_depth: i32) -> Self {
        self.fetch_depth = fetch_depth;
        self
    }

    /// Assemble the full fetch statement.
    ///
    /// Column order follows descriptor attribute order, root first, then
    /// each joined child depth-first. Without an explicit sort the result
    /// is ordered descending by the root primary key.
    pub fn build(&self) -> Result<BuiltQuery> {
        let mut sections = Sections::default();
        let mut visited = Vec::new();
        descend(
            self.root,
            None,
            self.filter,
            &mut visited,
            0,
            self.fetch_depth,
            &mut sections,
        )?;

        let order_by = match self.sort {
            Some(sort) if !sort.is_empty() => sort.to_sql()?,
            _ if self.root.custom_sql.is_some() => String::new(),
            _ => {
                let table = self.root.table()?;
                let pk = self.root.primary_key_column();
                Sort::by(&format!("{table}.{pk}"), SortDir::Desc).to_sql()?
            }
        };

        let sql = format!(
            "{}{}{}{}{}",
            sections.select, sections.from, sections.join, sections.where_clause, order_by
        );
        debug!(sql = %sql, param_count = sections.params.len(), "built query");
        Ok(BuiltQuery {
            sql,
            params: sections.params,
        })
    }

    /// Assemble the matching count statement: `COUNT(DISTINCT root.pk)`
    /// over the same root filter, without joins.
    pub fn build_count(&self) -> Result<BuiltQuery> {
        let table = self.root.table()?;
        let pk = self.root.primary_key_column();

        let mut sections = Sections::default();
        let mut visited = Vec::new();
        descend(self.root, None, self.filter, &mut visited, 0, 0, &mut sections)?;

        let sql = format!(
            "SELECT COUNT(DISTINCT {table}.{pk}){}{}{}",
            sections.from, sections.join, sections.where_clause
        );
        debug!(sql = %sql, param_count = sections.params.len(), "built count query");
        Ok(BuiltQuery {
            sql,
            params: sections.params,
        })
    }
}

/// Compute the alias of a joined child: `parentTable_attribute`.
pub fn child_alias(parent_table: &str, attribute: &str) -> String {
    format!("{parent_table}_{attribute}")
}

// =============================================================================
// Assembly
// =============================================================================

#[derive(Default)]
struct Sections {
    select: String,
    from: String,
    join: String,
    where_clause: String,
    params: Vec<Value>,
}

fn descend(
    desc: &'static EntityDescriptor,
    alias: Option<&str>,
    filter: Option<&CriteriaGroup>,
    visited: &mut Vec<String>,
    depth: i32,
    fetch_depth: i32,
    sections: &mut Sections,
) -> Result<()> {
    let depth = depth + 1;

    // A custom select defines its own projection and aliases; it takes the
    // WHERE clause unscoped and never grows joins.
    if let Some(custom) = &desc.custom_sql {
        sections.select.push_str(custom);
        if let Some(group) = filter.filter(|g| !g.is_empty()) {
            let part = WherePart::compile(None, group)?;
            sections.params.extend(part.params);
            sections.where_clause = format!(" WHERE {}", part.sql);
        }
        return Ok(());
    }

    let table = desc.table()?;
    let current_alias = alias.unwrap_or(table).to_string();

    if sections.select.is_empty() {
        sections.select = format!("SELECT {}", columns_csv(table, desc, false));
        sections.from = format!(" FROM {table}");
        if let Some(group) = filter.filter(|g| !g.is_empty()) {
            let part = WherePart::compile(Some(table), group)?;
            sections.params.extend(part.params);
            sections.where_clause = format!(" WHERE {}", part.sql);
        }
    }

    for (attr, relation, _) in desc.relation_attributes() {
        if fetch_depth != UNLIMITED_DEPTH && depth > fetch_depth {
            continue;
        }
        let child = relation.target()?;
        let Some(child_table) = child.table_name.as_deref() else {
            // custom-select entities cannot be joined, only fetched as roots
            debug!(
                entity = %desc.entity_name,
                attribute = %attr.name,
                "skipping relation to a custom-select entity"
            );
            continue;
        };
        // cycle guard: a table already on the ancestor path is not joined again
        if visited.iter().any(|t| t == child_table) {
            debug!(
                entity = %desc.entity_name,
                attribute = %attr.name,
                table = child_table,
                "cycle detected, relation excluded from joins"
            );
            continue;
        }

        let alias = child_alias(table, &attr.name);
        sections.select.push_str(", ");
        sections.select.push_str(&columns_csv(&alias, child, true));
        append_join(sections, &current_alias, &alias, &attr.name, desc, child, relation)?;

        visited.push(table.to_string());
        descend(child, Some(&alias), None, visited, depth, fetch_depth, sections)?;
        visited.pop();
    }
    Ok(())
}

fn append_join(
    sections: &mut Sections,
    parent_alias: &str,
    alias: &str,
    attribute: &str,
    parent: &EntityDescriptor,
    child: &'static EntityDescriptor,
    relation: &Relation,
) -> Result<()> {
    let child_table = child.table()?;
    if let Some(pivot) = &relation.mapping_table {
        // parent -> pivot on the master key, pivot -> child on the joined key
        sections.join.push_str(&format!(
            " LEFT JOIN {pivot} ON {pivot}.{} = {parent_alias}.{}",
            relation.master_column,
            parent.primary_key_column()
        ));
        sections.join.push_str(&format!(
            " LEFT JOIN {child_table} {alias} ON {pivot}.{} = {alias}.{}",
            relation.joined_column,
            child.primary_key_column()
        ));
    } else {
        if !child.has_column(&relation.joined_column) {
            return Err(Error::MissingJoinedColumn {
                entity: parent.entity_name.clone(),
                attribute: attribute.to_string(),
                column: relation.joined_column.clone(),
            });
        }
        sections.join.push_str(&format!(
            " LEFT JOIN {child_table} {alias} ON {alias}.{} = {parent_alias}.{}",
            relation.joined_column, relation.master_column
        ));
    }
    Ok(())
}

/// Comma-separated column list. Joined columns are re-labeled
/// `"alias.column"` so every branch of the graph keeps its own namespace in
/// the flat result row.
fn columns_csv(alias: &str, desc: &EntityDescriptor, label: bool) -> String {
    desc.scalar_attributes()
        .filter_map(|a| a.column())
        .map(|col| {
            if label {
                format!("{alias}.{col} AS \"{alias}{COLUMN_LABEL_DELIMITER}{col}\"")
            } else {
                format!("{alias}.{col}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
