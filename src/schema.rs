//! Per-type descriptors: table mapping, attribute list, relation metadata,
//! and the process-wide memoized registry.
//!
//! A descriptor is declared once per entity type through [`DescriptorBuilder`]
//! and cached for the process lifetime; after the first access all reads are
//! plain pointer loads on a leaked `&'static`. Relation targets are stored as
//! lazy lookup functions so mutually-referencing entity types declare cleanly
//! without re-entering the registry.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{LazyLock, PoisonError, RwLock};

use crate::entity::{Entity, Schema};
use crate::error::{Error, Result};
use crate::sql::validate_identifier;
use crate::value::Kind;

/// Lazy handle on a related entity's descriptor.
pub type DescriptorRef = fn() -> Result<&'static EntityDescriptor>;

// =============================================================================
// Relations
// =============================================================================

/// How two entities join.
///
/// Without a mapping table the foreign key lives on the child table:
/// `child.joined_column = parent.master_column`. With one, the pivot carries
/// both keys: `pivot.master_column = parent pk` and
/// `pivot.joined_column = child pk`.
#[derive(Clone)]
pub struct Relation {
    pub target: DescriptorRef,
    pub master_column: String,
    pub joined_column: String,
    pub mapping_table: Option<String>,
}

impl Relation {
    /// Direct relation to `T`, keyed `master_column` on this side and
    /// `joined_column` on the target side.
    pub fn to<T: Schema>(master_column: &str, joined_column: &str) -> Self {
        Self {
            target: descriptor_of::<T>,
            master_column: master_column.to_string(),
            joined_column: joined_column.to_string(),
            mapping_table: None,
        }
    }

    /// Route the relation through a pivot table (many-to-many).
    #[must_use]
    pub fn via(mut self, mapping_table: &str) -> Self {
        self.mapping_table = Some(mapping_table.to_string());
        self
    }

    pub fn target(&self) -> Result<&'static EntityDescriptor> {
        (self.target)()
    }
}

impl std::fmt::Debug for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relation")
            .field("master_column", &self.master_column)
            .field("joined_column", &self.joined_column)
            .field("mapping_table", &self.mapping_table)
            .finish()
    }
}

// =============================================================================
// Attributes
// =============================================================================

#[derive(Debug, Clone)]
pub enum AttributeKind {
    Scalar {
        column: String,
        value_kind: Kind,
        primary_key: bool,
    },
    ToOne(Relation),
    ToMany(Relation),
    /// Present on the type but excluded from SQL and hydration entirely.
    Ignored,
}

/// One declared attribute. Declaration order determines generated column
/// and join order.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub kind: AttributeKind,
}

impl Attribute {
    /// Column name, for scalar attributes.
    pub fn column(&self) -> Option<&str> {
        match &self.kind {
            AttributeKind::Scalar { column, .. } => Some(column),
            _ => None,
        }
    }

    /// Relation metadata plus whether the attribute is collection-shaped.
    pub fn relation(&self) -> Option<(&Relation, bool)> {
        match &self.kind {
            AttributeKind::ToOne(r) => Some((r, false)),
            AttributeKind::ToMany(r) => Some((r, true)),
            _ => None,
        }
    }

    pub fn is_primary_key(&self) -> bool {
        matches!(
            self.kind,
            AttributeKind::Scalar {
                primary_key: true,
                ..
            }
        )
    }
}

// =============================================================================
// EntityDescriptor
// =============================================================================

/// Immutable per-type metadata: table (or custom select), primary key, and
/// the ordered attribute list.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    pub entity_name: String,
    pub table_name: Option<String>,
    pub custom_sql: Option<String>,
    pub attributes: Vec<Attribute>,
    instantiate: fn() -> Box<dyn Entity>,
    primary_key_index: usize,
}

impl EntityDescriptor {
    /// Start a declaration for an entity backed by a real table.
    pub fn builder<T: Schema>(table_name: &str) -> DescriptorBuilder {
        DescriptorBuilder {
            entity_name: short_type_name::<T>(),
            table_name: Some(table_name.to_string()),
            custom_sql: None,
            attributes: Vec::new(),
            instantiate: || Box::new(T::default()),
        }
    }

    /// Start a declaration for an entity backed by a raw SELECT statement.
    /// Such an entity is read-only and generates no joins of its own aliases.
    pub fn custom<T: Schema>(custom_sql: &str) -> DescriptorBuilder {
        DescriptorBuilder {
            entity_name: short_type_name::<T>(),
            table_name: None,
            custom_sql: Some(custom_sql.to_string()),
            attributes: Vec::new(),
            instantiate: || Box::new(T::default()),
        }
    }

    pub fn new_instance(&self) -> Box<dyn Entity> {
        (self.instantiate)()
    }

    pub fn primary_key(&self) -> &Attribute {
        &self.attributes[self.primary_key_index]
    }

    pub fn primary_key_column(&self) -> &str {
        match &self.primary_key().kind {
            AttributeKind::Scalar { column, .. } => column,
            // unreachable per build() validation
            _ => &self.primary_key().name,
        }
    }

    /// The FROM source: table name, or a parenthesized custom select.
    pub fn table(&self) -> Result<&str> {
        self.table_name.as_deref().ok_or_else(|| Error::MissingTable {
            entity: self.entity_name.clone(),
        })
    }

    pub fn attribute(&self, name: &str) -> Result<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| Error::UnknownAttribute {
                entity: self.entity_name.clone(),
                attribute: name.to_string(),
            })
    }

    /// Scalar attributes in declaration order, ignored ones excluded.
    pub fn scalar_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes
            .iter()
            .filter(|a| matches!(a.kind, AttributeKind::Scalar { .. }))
    }

    /// Relation attributes in declaration order.
    pub fn relation_attributes(&self) -> impl Iterator<Item = (&Attribute, &Relation, bool)> {
        self.attributes
            .iter()
            .filter_map(|a| a.relation().map(|(r, many)| (a, r, many)))
    }

    /// Scalar column names, used for known-column filter checks.
    pub fn column_names(&self) -> Vec<String> {
        self.scalar_attributes()
            .filter_map(|a| a.column().map(str::to_string))
            .collect()
    }

    /// Whether `column` is already covered by a scalar attribute.
    pub fn has_column(&self, column: &str) -> bool {
        self.scalar_attributes()
            .any(|a| a.column().is_some_and(|c| c.eq_ignore_ascii_case(column)))
    }
}

fn short_type_name<T>() -> String {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full).to_string()
}

// =============================================================================
// Builder
// =============================================================================

/// Fluent declaration of an [`EntityDescriptor`]. Finished by [`build`],
/// which validates the declaration and fails on configuration errors.
///
/// [`build`]: DescriptorBuilder::build
pub struct DescriptorBuilder {
    entity_name: String,
    table_name: Option<String>,
    custom_sql: Option<String>,
    attributes: Vec<Attribute>,
    instantiate: fn() -> Box<dyn Entity>,
}

impl DescriptorBuilder {
    /// Primary-key attribute, column name equal to the attribute name.
    #[must_use]
    pub fn primary_key(self, name: &str, value_kind: Kind) -> Self {
        self.primary_key_as(name, name, value_kind)
    }

    /// Primary-key attribute with an explicit column name.
    #[must_use]
    pub fn primary_key_as(mut self, name: &str, column: &str, value_kind: Kind) -> Self {
        self.attributes.push(Attribute {
            name: name.to_string(),
            kind: AttributeKind::Scalar {
                column: column.to_string(),
                value_kind,
                primary_key: true,
            },
        });
        self
    }

    /// Scalar attribute, column name equal to the attribute name.
    #[must_use]
    pub fn scalar(self, name: &str, value_kind: Kind) -> Self {
        self.scalar_as(name, name, value_kind)
    }

    /// Scalar attribute with an explicit column name.
    #[must_use]
    pub fn scalar_as(mut self, name: &str, column: &str, value_kind: Kind) -> Self {
        self.attributes.push(Attribute {
            name: name.to_string(),
            kind: AttributeKind::Scalar {
                column: column.to_string(),
                value_kind,
                primary_key: false,
            },
        });
        self
    }

    /// Attribute present on the type but invisible to the engine.
    #[must_use]
    pub fn ignored(mut self, name: &str) -> Self {
        self.attributes.push(Attribute {
            name: name.to_string(),
            kind: AttributeKind::Ignored,
        });
        self
    }

    /// Nested single entity.
    #[must_use]
    pub fn to_one(mut self, name: &str, relation: Relation) -> Self {
        self.attributes.push(Attribute {
            name: name.to_string(),
            kind: AttributeKind::ToOne(relation),
        });
        self
    }

    /// Nested entity collection.
    #[must_use]
    pub fn to_many(mut self, name: &str, relation: Relation) -> Self {
        self.attributes.push(Attribute {
            name: name.to_string(),
            kind: AttributeKind::ToMany(relation),
        });
        self
    }

    /// Validate and freeze the declaration.
    pub fn build(self) -> Result<EntityDescriptor> {
        if self.table_name.is_none() && self.custom_sql.is_none() {
            return Err(Error::MissingTable {
                entity: self.entity_name,
            });
        }
        if let Some(table) = &self.table_name {
            validate_identifier(table)?;
        }

        let mut primary_key_index = None;
        let mut seen = Vec::with_capacity(self.attributes.len());
        for (idx, attr) in self.attributes.iter().enumerate() {
            validate_identifier(&attr.name)?;
            if seen.contains(&attr.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate attribute '{}' on entity '{}'",
                    attr.name, self.entity_name
                )));
            }
            seen.push(&attr.name);

            match &attr.kind {
                AttributeKind::Scalar {
                    column,
                    primary_key,
                    ..
                } => {
                    validate_identifier(column)?;
                    if *primary_key {
                        if primary_key_index.is_some() {
                            return Err(Error::Config(format!(
                                "more than one primary key declared for entity '{}'",
                                self.entity_name
                            )));
                        }
                        primary_key_index = Some(idx);
                    }
                }
                AttributeKind::ToOne(relation) | AttributeKind::ToMany(relation) => {
                    validate_identifier(&relation.master_column)?;
                    validate_identifier(&relation.joined_column)?;
                    if let Some(pivot) = &relation.mapping_table {
                        validate_identifier(pivot)?;
                    }
                }
                AttributeKind::Ignored => {}
            }
        }

        let primary_key_index = primary_key_index.ok_or(Error::MissingPrimaryKey {
            entity: self.entity_name.clone(),
        })?;

        Ok(EntityDescriptor {
            entity_name: self.entity_name,
            table_name: self.table_name,
            custom_sql: self.custom_sql,
            attributes: self.attributes,
            instantiate: self.instantiate,
            primary_key_index,
        })
    }
}

// =============================================================================
// Registry
// =============================================================================

static REGISTRY: LazyLock<RwLock<HashMap<TypeId, &'static EntityDescriptor>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Fetch the memoized descriptor for `T`, declaring and validating it on
/// first access.
///
/// Declaration runs outside the lock, so concurrent first calls may build
/// the descriptor more than once; the first insert wins and the result is
/// identical either way since declarations are pure.
pub fn descriptor_of<T: Schema>() -> Result<&'static EntityDescriptor> {
    let id = TypeId::of::<T>();
    {
        let map = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(desc) = map.get(&id) {
            return Ok(desc);
        }
    }
    let declared = T::declare()?;
    let mut map = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    Ok(map.entry(id).or_insert_with(|| Box::leak(Box::new(declared))))
}
