//! The cascading persistence engine: ordered insert, diff-based update of
//! child collections, two-phase delete.
//!
//! Statement sequences are not wrapped in a transaction here; atomicity is
//! the caller's boundary around the whole call.

use tracing::debug;

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::executor::SqlExecutor;
use crate::filter::{CriteriaGroup, WherePart};
use crate::schema::{EntityDescriptor, Relation};
use crate::value::Value;

// =============================================================================
// Insert
// =============================================================================

/// Insert `entity` and cascade: unsaved to-one parents go in first, the row
/// itself gets its generated key assigned back, one-to-many children are
/// backfilled with the new foreign key and inserted when unsaved, and
/// many-to-many links get one pivot row each.
///
/// Linked entities behind a mapping table must already be persisted;
/// linking an entity without a primary key is an integrity error.
pub fn insert(
    executor: &dyn SqlExecutor,
    desc: &'static EntityDescriptor,
    entity: &mut dyn Entity,
) -> Result<()> {
    insert_parents_first(executor, desc, entity)?;

    let table = desc.table()?;
    let pk_attr = desc.primary_key().name.clone();
    let (columns, values) = persist_columns(desc, entity)?;
    let key = executor.insert_returning_key(table, desc.primary_key_column(), &columns, &values)?;
    entity.set(&pk_attr, key)?;
    let parent_key = entity.get(&pk_attr)?;
    debug!(entity = %desc.entity_name, key = %parent_key.render(), "inserted");

    for (attr, relation, many) in desc.relation_attributes() {
        if !many {
            continue;
        }
        let child_desc = relation.target()?;
        if relation.mapping_table.is_some() {
            for child in entity.to_many(&attr.name)? {
                let child_key = child.get(&child_desc.primary_key().name)?;
                insert_link(executor, relation, &attr.name, &parent_key, &child_key)?;
            }
        } else {
            let fk_attr = foreign_key_attribute(child_desc, &relation.joined_column)?;
            let fk_value = value_for_column(desc, entity, &relation.master_column)?;
            for child in entity.to_many_mut(&attr.name)? {
                child.set(&fk_attr, fk_value.clone())?;
                if child.get(&child_desc.primary_key().name)?.is_null() {
                    insert(executor, child_desc, child)?;
                }
            }
        }
    }
    Ok(())
}

/// Required to-one parents without a primary key are created before the
/// row that references them.
fn insert_parents_first(
    executor: &dyn SqlExecutor,
    desc: &'static EntityDescriptor,
    entity: &mut dyn Entity,
) -> Result<()> {
    for (attr, relation, many) in desc.relation_attributes() {
        if many || relation.mapping_table.is_some() {
            continue;
        }
        let child_desc = relation.target()?;
        if let Some(parent) = entity.to_one_mut(&attr.name)? {
            if parent.get(&child_desc.primary_key().name)?.is_null() {
                insert(executor, child_desc, parent)?;
            }
        }
    }
    Ok(())
}

// =============================================================================
// Update
// =============================================================================

/// Update `entity` by primary key and cascade. Without a primary key this
/// delegates to [`insert`].
///
/// Child collections are reconciled against the store first: one-to-many
/// rows whose key is absent from the in-memory set are deleted (scoped to
/// this parent's foreign key), pivot rows likewise against the current
/// links. Then the row's own columns are updated, surviving children are
/// recursively updated, unsaved ones inserted, and missing pivot rows added.
pub fn update(
    executor: &dyn SqlExecutor,
    desc: &'static EntityDescriptor,
    entity: &mut dyn Entity,
) -> Result<()> {
    let pk_attr = desc.primary_key().name.clone();
    if entity.get(&pk_attr)?.is_null() {
        return insert(executor, desc, entity);
    }
    insert_parents_first(executor, desc, entity)?;

    let table = desc.table()?;
    let pk_column = desc.primary_key_column();
    let parent_key = entity.get(&pk_attr)?;

    // reconcile before touching the row itself
    for (attr, relation, many) in desc.relation_attributes() {
        if !many {
            continue;
        }
        let child_desc = relation.target()?;
        if let Some(pivot) = &relation.mapping_table {
            let current = linked_keys(child_desc, entity.to_many(&attr.name)?, &attr.name)?;
            delete_stale(
                executor,
                pivot,
                &relation.master_column,
                &relation.joined_column,
                &parent_key,
                &current,
            )?;
        } else {
            let child_table = child_desc.table()?;
            let fk_value = value_for_column(desc, entity, &relation.master_column)?;
            let surviving: Vec<Value> = entity
                .to_many(&attr.name)?
                .iter()
                .map(|c| c.get(&child_desc.primary_key().name))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .filter(|v| !v.is_null())
                .collect();
            delete_stale(
                executor,
                child_table,
                &relation.joined_column,
                child_desc.primary_key_column(),
                &fk_value,
                &surviving,
            )?;
        }
    }

    let (columns, values) = persist_columns(desc, entity)?;
    if !columns.is_empty() {
        let assignments = columns
            .iter()
            .map(|c| format!("{c} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE {table} SET {assignments} WHERE {pk_column} = ?");
        let mut params = values;
        params.push(parent_key.clone());
        executor.execute(&sql, &params)?;
    }

    for (attr, relation, many) in desc.relation_attributes() {
        if !many {
            continue;
        }
        let child_desc = relation.target()?;
        if let Some(pivot) = &relation.mapping_table {
            // diff against what reconciliation left behind
            let existing = existing_links(executor, pivot, relation, &parent_key)?;
            for child in entity.to_many(&attr.name)? {
                let child_key = child.get(&child_desc.primary_key().name)?;
                if existing.iter().any(|e| e.render() == child_key.render()) {
                    continue;
                }
                insert_link(executor, relation, &attr.name, &parent_key, &child_key)?;
            }
        } else {
            let fk_attr = foreign_key_attribute(child_desc, &relation.joined_column)?;
            let fk_value = value_for_column(desc, entity, &relation.master_column)?;
            for child in entity.to_many_mut(&attr.name)? {
                child.set(&fk_attr, fk_value.clone())?;
                if child.get(&child_desc.primary_key().name)?.is_null() {
                    insert(executor, child_desc, child)?;
                } else {
                    update(executor, child_desc, child)?;
                }
            }
        }
    }
    Ok(())
}

/// `DELETE FROM {table} WHERE scope = ? AND key NOT IN (...)`, or everything
/// in scope when the kept set is empty.
fn delete_stale(
    executor: &dyn SqlExecutor,
    table: &str,
    scope_column: &str,
    key_column: &str,
    scope: &Value,
    kept: &[Value],
) -> Result<()> {
    if kept.is_empty() {
        executor.execute(
            &format!("DELETE FROM {table} WHERE {scope_column} = ?"),
            std::slice::from_ref(scope),
        )?;
    } else {
        let sql = format!(
            "DELETE FROM {table} WHERE {scope_column} = ? AND {key_column} NOT IN ({})",
            placeholders(kept.len())
        );
        let mut params = Vec::with_capacity(kept.len() + 1);
        params.push(scope.clone());
        params.extend(kept.iter().cloned());
        executor.execute(&sql, &params)?;
    }
    Ok(())
}

fn existing_links(
    executor: &dyn SqlExecutor,
    pivot: &str,
    relation: &Relation,
    parent_key: &Value,
) -> Result<Vec<Value>> {
    let sql = format!(
        "SELECT {} FROM {pivot} WHERE {} = ?",
        relation.joined_column, relation.master_column
    );
    let rows = executor.query_rows(&sql, std::slice::from_ref(parent_key))?;
    Ok(rows
        .iter()
        .filter_map(|r| r.iter().next().map(|(_, v)| v.clone()))
        .filter(|v| !v.is_null())
        .collect())
}

fn insert_link(
    executor: &dyn SqlExecutor,
    relation: &Relation,
    attribute: &str,
    parent_key: &Value,
    child_key: &Value,
) -> Result<()> {
    if child_key.is_null() {
        return Err(Error::UnsavedLink {
            attribute: attribute.to_string(),
        });
    }
    let pivot = relation
        .mapping_table
        .as_deref()
        .ok_or_else(|| Error::Config(format!("relation '{attribute}' has no mapping table")))?;
    let sql = format!(
        "INSERT INTO {pivot} ({}, {}) VALUES (?, ?)",
        relation.master_column, relation.joined_column
    );
    executor.execute(&sql, &[parent_key.clone(), child_key.clone()])?;
    Ok(())
}

fn linked_keys(
    child_desc: &EntityDescriptor,
    children: Vec<&dyn Entity>,
    attribute: &str,
) -> Result<Vec<Value>> {
    let mut keys = Vec::with_capacity(children.len());
    for child in children {
        let key = child.get(&child_desc.primary_key().name)?;
        if key.is_null() {
            return Err(Error::UnsavedLink {
                attribute: attribute.to_string(),
            });
        }
        keys.push(key);
    }
    Ok(keys)
}

// =============================================================================
// Delete
// =============================================================================

/// Delete every row of `desc` matching `filter`, descendants first.
///
/// Target keys are resolved through a subquery shared down the cascade;
/// the final delete per table runs against the materialized key list in a
/// second statement, since some engines refuse a delete whose subquery
/// references the deleted table.
pub fn delete_where(
    executor: &dyn SqlExecutor,
    desc: &'static EntityDescriptor,
    filter: &CriteriaGroup,
) -> Result<()> {
    let table = desc.table()?;
    let part = WherePart::compile(Some(table), filter)?;
    let key_stmt = format!(
        "SELECT {} FROM {table} WHERE {}",
        desc.primary_key_column(),
        part.sql
    );
    let mut visited = Vec::new();
    delete_recursively(executor, desc, &key_stmt, &part.params, &mut visited)
}

fn delete_recursively(
    executor: &dyn SqlExecutor,
    desc: &'static EntityDescriptor,
    key_stmt: &str,
    params: &[Value],
    visited: &mut Vec<String>,
) -> Result<()> {
    let table = desc.table()?;
    visited.push(table.to_string());

    for (_, relation, many) in desc.relation_attributes() {
        if let Some(pivot) = &relation.mapping_table {
            let sql = format!(
                "DELETE FROM {pivot} WHERE {} IN ({key_stmt})",
                relation.master_column
            );
            executor.execute(&sql, params)?;
        } else if many {
            let child_desc = relation.target()?;
            let Some(child_table) = child_desc.table_name.as_deref() else {
                continue;
            };
            // self- and mutual references stop at the revisited table
            if visited.iter().any(|t| t == child_table) {
                continue;
            }
            let child_stmt = format!(
                "SELECT {} FROM {child_table} WHERE {} IN ({key_stmt})",
                child_desc.primary_key_column(),
                relation.joined_column
            );
            delete_recursively(executor, child_desc, &child_stmt, params, visited)?;
        }
    }

    let keys: Vec<Value> = executor
        .query_rows(key_stmt, params)?
        .iter()
        .filter_map(|r| r.iter().next().map(|(_, v)| v.clone()))
        .filter(|v| !v.is_null())
        .collect();
    if !keys.is_empty() {
        let sql = format!(
            "DELETE FROM {table} WHERE {} IN ({})",
            desc.primary_key_column(),
            placeholders(keys.len())
        );
        executor.execute(&sql, &keys)?;
        debug!(entity = %desc.entity_name, count = keys.len(), "deleted");
    }

    visited.pop();
    Ok(())
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Columns written on insert/update: scalar non-key columns in declaration
/// order, then foreign-key columns of to-one relations (the nested entity's
/// key, or NULL) where not already covered by a scalar.
fn persist_columns(
    desc: &'static EntityDescriptor,
    entity: &dyn Entity,
) -> Result<(Vec<String>, Vec<Value>)> {
    let mut columns = Vec::new();
    let mut values = Vec::new();
    for attr in desc.scalar_attributes() {
        if attr.is_primary_key() {
            continue;
        }
        if let Some(column) = attr.column() {
            columns.push(column.to_string());
            values.push(entity.get(&attr.name)?);
        }
    }
    for (attr, relation, many) in desc.relation_attributes() {
        if many || relation.mapping_table.is_some() {
            continue;
        }
        let child_desc = relation.target()?;
        let fk = match entity.to_one(&attr.name)? {
            Some(child) => child.get(&child_desc.primary_key().name)?,
            None => Value::Null,
        };
        match columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(&relation.master_column))
        {
            // a declared scalar already carries the column; the nested
            // entity's key wins when one is attached
            Some(idx) => {
                if !fk.is_null() {
                    values[idx] = fk;
                }
            }
            None => {
                columns.push(relation.master_column.clone());
                values.push(fk);
            }
        }
    }
    Ok((columns, values))
}

/// Read the value backing `column` on `entity`, for foreign-key backfill.
fn value_for_column(
    desc: &'static EntityDescriptor,
    entity: &dyn Entity,
    column: &str,
) -> Result<Value> {
    for attr in desc.scalar_attributes() {
        if attr.column().is_some_and(|c| c.eq_ignore_ascii_case(column)) {
            return entity.get(&attr.name);
        }
    }
    Err(Error::Config(format!(
        "column '{column}' is not mapped by a scalar attribute on entity '{}'",
        desc.entity_name
    )))
}

/// Attribute on the child entity backing its foreign-key column.
fn foreign_key_attribute(child_desc: &EntityDescriptor, joined_column: &str) -> Result<String> {
    child_desc
        .scalar_attributes()
        .find(|a| {
            a.column()
                .is_some_and(|c| c.eq_ignore_ascii_case(joined_column))
        })
        .map(|a| a.name.clone())
        .ok_or_else(|| Error::MissingJoinedColumn {
            entity: child_desc.entity_name.clone(),
            attribute: joined_column.to_string(),
            column: joined_column.to_string(),
        })
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(",")
}
