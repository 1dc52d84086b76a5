//! The predicate compiler: one [`CriteriaGroup`] in, one parenthesized SQL
//! boolean expression plus its positional parameters out.
//!
//! Column names are spliced into the SQL text and therefore validated
//! against the identifier pattern; criteria values never are, they are
//! always bound as parameters.

use tracing::debug;

use crate::error::{Error, Result};
use crate::filter::{Criteria, CriteriaGroup, CriteriaValue, Operator};
use crate::sql::validate_identifier;
use crate::value::Value;

/// A compiled filter: SQL boolean expression plus bound parameters.
///
/// An empty or absent group compiles to the always-true `(1 = 1)` so the
/// result can be attached to a `WHERE` clause unconditionally.
#[derive(Debug, Clone)]
pub struct WherePart {
    pub sql: String,
    pub params: Vec<Value>,
}

impl WherePart {
    /// Compile a group scoped to `table_alias` (`None` leaves columns
    /// unqualified, as required below custom-select entities).
    pub fn compile(table_alias: Option<&str>, group: &CriteriaGroup) -> Result<WherePart> {
        Self::compile_checked(table_alias, group, None)
    }

    /// Compile with a known-column check: every leaf field name must match
    /// one of `known_columns` case-insensitively.
    pub fn compile_checked(
        table_alias: Option<&str>,
        group: &CriteriaGroup,
        known_columns: Option<&[String]>,
    ) -> Result<WherePart> {
        let prefix = match table_alias {
            Some(alias) => {
                validate_identifier(alias)?;
                format!("{alias}.")
            }
            None => String::new(),
        };
        let scope = table_alias.unwrap_or("query root");

        let mut params = Vec::new();
        let rendered = render_group(&prefix, scope, group, known_columns, &mut params)?;
        let sql = match rendered {
            Some(s) if s.len() > 2 => s,
            _ => "(1 = 1)".to_string(),
        };
        debug!(sql = %sql, param_count = params.len(), "compiled filter");
        Ok(WherePart { sql, params })
    }
}

/// Renders one group level; `None` when the group contributes nothing.
fn render_group(
    prefix: &str,
    scope: &str,
    group: &CriteriaGroup,
    known_columns: Option<&[String]>,
    params: &mut Vec<Value>,
) -> Result<Option<String>> {
    if group.criterias.is_empty() {
        return Ok(None);
    }
    let mut parts = Vec::with_capacity(group.criterias.len());
    for criteria in &group.criterias {
        match criteria {
            Criteria::Group(nested) => {
                // empty nested groups vanish instead of producing "()"
                if let Some(text) = render_group(prefix, scope, nested, known_columns, params)? {
                    parts.push(text);
                }
            }
            Criteria::Leaf {
                field_name,
                operator,
                value,
            } => {
                parts.push(render_leaf(
                    prefix,
                    scope,
                    field_name,
                    *operator,
                    value,
                    known_columns,
                    params,
                )?);
            }
        }
    }
    if parts.is_empty() {
        return Ok(None);
    }
    Ok(Some(format!(
        "({})",
        parts.join(group.operator.sql_separator())
    )))
}

fn render_leaf(
    prefix: &str,
    scope: &str,
    field_name: &str,
    operator: Operator,
    value: &CriteriaValue,
    known_columns: Option<&[String]>,
    params: &mut Vec<Value>,
) -> Result<String> {
    if let Some(columns) = known_columns {
        if !columns.iter().any(|c| c.eq_ignore_ascii_case(field_name)) {
            return Err(Error::UnknownColumn {
                column: field_name.to_string(),
                scope: scope.to_string(),
            });
        }
    }
    validate_identifier(field_name)?;
    validate_arity(operator, value)?;

    let col = format!("{prefix}{field_name}");

    let sql = match operator {
        Operator::Equals => {
            params.push(single_value(operator, value)?);
            format!("{col} = ?")
        }
        Operator::NotEqual => {
            params.push(single_value(operator, value)?);
            format!("{col} <> ?")
        }
        // case-insensitive equality leans on LIKE without wildcards; for
        // non-string values LOWER() is meaningless, so plain LIKE is used
        Operator::IEquals => match single_value(operator, value)? {
            v @ Value::Text(_) => {
                params.push(v);
                format!("LOWER({col}) LIKE LOWER(?)")
            }
            v => {
                params.push(v);
                format!("{col} LIKE ?")
            }
        },
        Operator::INotEqual => match single_value(operator, value)? {
            v @ Value::Text(_) => {
                params.push(v);
                format!("LOWER({col}) NOT LIKE LOWER(?)")
            }
            v => {
                params.push(v);
                format!("{col} NOT LIKE ?")
            }
        },
        Operator::GreaterThan => {
            params.push(single_value(operator, value)?);
            format!("{col} > ?")
        }
        Operator::LessThan => {
            params.push(single_value(operator, value)?);
            format!("{col} < ?")
        }
        Operator::GreaterOrEqual => {
            params.push(single_value(operator, value)?);
            format!("{col} >= ?")
        }
        Operator::LessOrEqual => {
            params.push(single_value(operator, value)?);
            format!("{col} <= ?")
        }
        Operator::Contains => {
            params.push(like_param(operator, value, true, true)?);
            format!("{col} LIKE ?")
        }
        Operator::NotContains => {
            params.push(like_param(operator, value, true, true)?);
            format!("{col} NOT LIKE ?")
        }
        Operator::IContains => {
            params.push(like_param(operator, value, true, true)?);
            format!("LOWER({col}) LIKE LOWER(?)")
        }
        Operator::INotContains => {
            params.push(like_param(operator, value, true, true)?);
            format!("LOWER({col}) NOT LIKE LOWER(?)")
        }
        Operator::StartsWith => {
            params.push(like_param(operator, value, false, true)?);
            format!("{col} LIKE ?")
        }
        Operator::IStartsWith => {
            params.push(like_param(operator, value, false, true)?);
            format!("LOWER({col}) LIKE LOWER(?)")
        }
        Operator::INotStartsWith => {
            params.push(like_param(operator, value, false, true)?);
            format!("LOWER({col}) NOT LIKE LOWER(?)")
        }
        Operator::EndsWith => {
            params.push(like_param(operator, value, true, false)?);
            format!("{col} LIKE ?")
        }
        Operator::IEndsWith => {
            params.push(like_param(operator, value, true, false)?);
            format!("LOWER({col}) LIKE LOWER(?)")
        }
        Operator::INotEndsWith => {
            params.push(like_param(operator, value, true, false)?);
            format!("LOWER({col}) NOT LIKE LOWER(?)")
        }
        Operator::IsBlank => format!("({col} = '' OR {col} IS NULL)"),
        Operator::NotBlank => format!("({col} != '' AND {col} IS NOT NULL)"),
        Operator::IsNull => format!("{col} IS NULL"),
        Operator::NotNull => format!("{col} IS NOT NULL"),
        Operator::InSet => {
            let list = list_value(operator, value)?;
            let csv = placeholders(list.len());
            params.extend(list.iter().cloned());
            format!("{col} IN ({csv})")
        }
        Operator::NotInSet => {
            let list = list_value(operator, value)?;
            let csv = placeholders(list.len());
            params.extend(list.iter().cloned());
            format!("{col} NOT IN ({csv})")
        }
        Operator::Between => {
            let list = list_value(operator, value)?;
            if list.len() != 2 {
                return Err(Error::BetweenArity { got: list.len() });
            }
            params.push(list[0].clone());
            params.push(list[1].clone());
            format!("{col} BETWEEN ? AND ?")
        }
    };
    Ok(sql)
}

/// List operators require a non-empty list; everything else refuses one.
fn validate_arity(operator: Operator, value: &CriteriaValue) -> Result<()> {
    let has_list = matches!(value, CriteriaValue::List(l) if !l.is_empty());
    if has_list && !operator.takes_list() {
        return Err(Error::UnexpectedListValue { operator });
    }
    if !has_list && operator.takes_list() {
        return Err(Error::MissingListValue { operator });
    }
    Ok(())
}

fn single_value(operator: Operator, value: &CriteriaValue) -> Result<Value> {
    match value {
        CriteriaValue::Single(v) => Ok(v.clone()),
        _ => Err(Error::MissingValue { operator }),
    }
}

fn list_value<'a>(operator: Operator, value: &'a CriteriaValue) -> Result<&'a [Value]> {
    match value {
        CriteriaValue::List(l) if !l.is_empty() => Ok(l),
        _ => Err(Error::MissingListValue { operator }),
    }
}

/// LIKE parameter with wildcards on the requested sides, rendered as text.
fn like_param(
    operator: Operator,
    value: &CriteriaValue,
    leading: bool,
    trailing: bool,
) -> Result<Value> {
    let text = single_value(operator, value)?.render();
    let mut s = String::with_capacity(text.len() + 2);
    if leading {
        s.push('%');
    }
    s.push_str(&text);
    if trailing {
        s.push('%');
    }
    Ok(Value::Text(s))
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(",")
}
