//! The row hydrator: flat joined rows back into a deduplicated entity graph.
//!
//! Join fan-out repeats root and intermediate data across rows; dedup keys
//! decide whether a row cell materializes a new graph node or only descends
//! into an existing one. To-many keys are `alias#pk`; to-one keys also carry
//! the owning entity's key, so a target shared by sibling parents attaches
//! under each of them. Scalars are applied exactly once per node, so
//! NULL-padded fan-out rows never overwrite real data.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use crate::entity::Entity;
use crate::error::Result;
use crate::schema::{AttributeKind, EntityDescriptor};
use crate::sql::builder::child_alias;
use crate::value::{Row, Value};

/// Rebuild the entity graph for `desc` from `rows`.
///
/// Root order is the first-seen order of distinct root primary keys. Rows
/// with a NULL root key are skipped; a NULL child key in a row means the
/// relation had no match there (outer-join miss).
pub fn hydrate(desc: &'static EntityDescriptor, rows: &[Row]) -> Result<Vec<Box<dyn Entity>>> {
    let mut order: Vec<String> = Vec::new();
    let mut roots: HashMap<String, (Box<dyn Entity>, HashSet<String>)> = HashMap::new();

    let pk_column = desc.primary_key_column();
    for row in rows {
        let Some(pk) = root_cell(row, desc, pk_column).filter(|v| !v.is_null()) else {
            continue;
        };
        let key = pk.render();

        let slot = match roots.entry(key.clone()) {
            Entry::Vacant(entry) => {
                let mut entity = desc.new_instance();
                apply_scalars(entity.as_mut(), desc, row, None)?;
                order.push(key);
                entry.insert((entity, HashSet::new()))
            }
            Entry::Occupied(entry) => entry.into_mut(),
        };
        fill_relations(slot.0.as_mut(), desc, row, &mut slot.1)?;
    }

    Ok(order
        .iter()
        .filter_map(|key| roots.remove(key).map(|(entity, _)| entity))
        .collect())
}

/// Root columns come back bare (`column`) from most drivers, qualified
/// (`table.column`) from some.
fn root_cell<'r>(row: &'r Row, desc: &EntityDescriptor, column: &str) -> Option<&'r Value> {
    row.get(column).or_else(|| {
        desc.table_name
            .as_deref()
            .and_then(|table| row.get(&format!("{table}.{column}")))
    })
}

fn apply_scalars(
    entity: &mut dyn Entity,
    desc: &EntityDescriptor,
    row: &Row,
    alias: Option<&str>,
) -> Result<()> {
    for attr in &desc.attributes {
        let AttributeKind::Scalar {
            column, value_kind, ..
        } = &attr.kind
        else {
            continue;
        };
        let cell = match alias {
            Some(alias) => row.get(&format!("{alias}.{column}")),
            None => root_cell(row, desc, column),
        };
        if let Some(value) = cell {
            entity.set(&attr.name, value.clone().convert(*value_kind)?)?;
        }
    }
    Ok(())
}

/// Walk the relation attributes of `entity` for one row, materializing
/// unseen children and descending into seen ones.
fn fill_relations(
    entity: &mut dyn Entity,
    desc: &EntityDescriptor,
    row: &Row,
    filled: &mut HashSet<String>,
) -> Result<()> {
    for (attr, relation, many) in desc.relation_attributes() {
        let child_desc = relation.target()?;
        if child_desc.table_name.is_none() {
            continue;
        }
        // below a custom select no joins are generated; child columns the
        // select supplies itself are labeled with the bare attribute name
        let alias = match desc.table_name.as_deref() {
            Some(table) => child_alias(table, &attr.name),
            None => attr.name.clone(),
        };
        let pk_label = format!("{alias}.{}", child_desc.primary_key_column());
        let Some(pk) = row.get(&pk_label).filter(|v| !v.is_null()) else {
            continue;
        };
        // a to-one target shared by sibling parents must land under each of
        // them, so its dedup key is scoped to the owning entity
        let dedup_key = if many {
            format!("{alias}#{}", pk.render())
        } else {
            let owner = entity.get(&desc.primary_key().name)?.render();
            format!("{alias}#{owner}#{}", pk.render())
        };
        let pk_attr = child_desc.primary_key().name.clone();

        if filled.insert(dedup_key) {
            let mut child = child_desc.new_instance();
            apply_scalars(child.as_mut(), child_desc, row, Some(&alias))?;
            let stored = if many {
                entity.attach_many(&attr.name, child)?
            } else {
                entity.attach_one(&attr.name, child)?
            };
            fill_relations(stored, child_desc, row, filled)?;
        } else if many {
            // seen before: descend only, scalars stay untouched
            let target = pk.render();
            for existing in entity.to_many_mut(&attr.name)? {
                if existing.get(&pk_attr)?.render() == target {
                    fill_relations(existing, child_desc, row, filled)?;
                    break;
                }
            }
        } else if let Some(existing) = entity.to_one_mut(&attr.name)? {
            fill_relations(existing, child_desc, row, filled)?;
        }
    }
    Ok(())
}
