//! The filter DSL: boolean trees of field-operator-value predicates plus
//! sort options.
//!
//! These are short-lived transport types, constructed per call and usually
//! deserialized straight from a client request. Compilation into SQL lives
//! in [`where_part`].

pub mod where_part;

pub use where_part::WherePart;

use serde::{Deserialize, Serialize};

use crate::value::Value;

// =============================================================================
// Operators
// =============================================================================

/// Comparison operators supported by the predicate compiler.
///
/// The `I`-prefixed variants are case-insensitive. `InSet`, `NotInSet` and
/// `Between` are the only operators that take a list value; `IsNull`,
/// `NotNull`, `IsBlank` and `NotBlank` take no value at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Equals,
    NotEqual,
    #[serde(rename = "iEquals")]
    IEquals,
    #[serde(rename = "iNotEqual")]
    INotEqual,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Contains,
    NotContains,
    #[serde(rename = "iContains")]
    IContains,
    #[serde(rename = "iNotContains")]
    INotContains,
    StartsWith,
    #[serde(rename = "iStartsWith")]
    IStartsWith,
    #[serde(rename = "iNotStartsWith")]
    INotStartsWith,
    EndsWith,
    #[serde(rename = "iEndsWith")]
    IEndsWith,
    #[serde(rename = "iNotEndsWith")]
    INotEndsWith,
    IsBlank,
    NotBlank,
    IsNull,
    NotNull,
    InSet,
    NotInSet,
    Between,
}

impl Operator {
    /// Whether this operator carries a list value.
    pub fn takes_list(self) -> bool {
        matches!(self, Operator::InSet | Operator::NotInSet | Operator::Between)
    }

    /// Whether this operator carries no value at all.
    pub fn takes_no_value(self) -> bool {
        matches!(
            self,
            Operator::IsNull | Operator::NotNull | Operator::IsBlank | Operator::NotBlank
        )
    }
}

/// Boolean connective of a [`CriteriaGroup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupOperator {
    #[default]
    And,
    Or,
}

impl GroupOperator {
    pub(crate) fn sql_separator(self) -> &'static str {
        match self {
            GroupOperator::And => " AND ",
            GroupOperator::Or => " OR ",
        }
    }
}

// =============================================================================
// Criteria
// =============================================================================

/// The operand of a leaf predicate: absent, a single value, or a list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum CriteriaValue {
    #[default]
    None,
    Single(Value),
    List(Vec<Value>),
}

impl From<Value> for CriteriaValue {
    fn from(v: Value) -> Self {
        CriteriaValue::Single(v)
    }
}

impl From<Vec<Value>> for CriteriaValue {
    fn from(v: Vec<Value>) -> Self {
        CriteriaValue::List(v)
    }
}

macro_rules! criteria_value_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for CriteriaValue {
            fn from(v: $ty) -> Self {
                CriteriaValue::Single(Value::from(v))
            }
        })*
    };
}

criteria_value_from!(i64, i32, f64, bool, &str, String, chrono::NaiveDateTime);

/// One node of the filter tree: either a leaf predicate or a nested group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Criteria {
    Leaf {
        field_name: String,
        operator: Operator,
        #[serde(default)]
        value: CriteriaValue,
    },
    Group(CriteriaGroup),
}

impl Criteria {
    /// Leaf predicate with a value.
    pub fn new(field_name: &str, operator: Operator, value: impl Into<CriteriaValue>) -> Self {
        Criteria::Leaf {
            field_name: field_name.to_string(),
            operator,
            value: value.into(),
        }
    }

    /// Leaf predicate without a value (`IS NULL`, `NOT BLANK`, ...).
    pub fn unary(field_name: &str, operator: Operator) -> Self {
        Criteria::Leaf {
            field_name: field_name.to_string(),
            operator,
            value: CriteriaValue::None,
        }
    }

    /// Wrap a nested group.
    pub fn group(group: CriteriaGroup) -> Self {
        Criteria::Group(group)
    }
}

/// A boolean tree of criteria joined by one connective.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriteriaGroup {
    pub operator: GroupOperator,
    #[serde(default)]
    pub criterias: Vec<Criteria>,
}

impl CriteriaGroup {
    pub fn and() -> Self {
        Self {
            operator: GroupOperator::And,
            criterias: Vec::new(),
        }
    }

    pub fn or() -> Self {
        Self {
            operator: GroupOperator::Or,
            criterias: Vec::new(),
        }
    }

    /// Single-criteria group, the common case.
    pub fn of(criteria: Criteria) -> Self {
        Self::and().add(criteria)
    }

    pub fn add(mut self, criteria: Criteria) -> Self {
        self.criterias.push(criteria);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.criterias.is_empty()
    }
}

impl From<Criteria> for CriteriaGroup {
    fn from(criteria: Criteria) -> Self {
        CriteriaGroup::of(criteria)
    }
}

// =============================================================================
// Sort
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    fn sql_text(self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

/// One ORDER BY entry. The field name may be qualified (`table.column`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortEntry {
    pub field_name: String,
    pub direction: SortDir,
}

/// Sort options: an ordered list of fields with directions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sort {
    pub entries: Vec<SortEntry>,
}

impl Sort {
    /// Convenience constructor for the single-field case.
    pub fn by(field_name: &str, direction: SortDir) -> Self {
        Self {
            entries: vec![SortEntry {
                field_name: field_name.to_string(),
                direction,
            }],
        }
    }

    pub fn add(mut self, field_name: &str, direction: SortDir) -> Self {
        self.entries.push(SortEntry {
            field_name: field_name.to_string(),
            direction,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as an ` ORDER BY ...` clause, empty string when no entries.
    ///
    /// Every dot-separated segment of each field name must pass identifier
    /// validation before it is spliced into SQL text.
    pub fn to_sql(&self) -> crate::error::Result<String> {
        if self.entries.is_empty() {
            return Ok(String::new());
        }
        let mut parts = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            for segment in entry.field_name.split('.') {
                crate::sql::validate_identifier(segment)?;
            }
            parts.push(format!("{} {}", entry.field_name, entry.direction.sql_text()));
        }
        Ok(format!(" ORDER BY {}", parts.join(", ")))
    }
}
