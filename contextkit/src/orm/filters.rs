//! Filter conditions for `where` / `or_where` options
//!
//! Supported comparison tokens and their aliases:
//! - `equal_to` / `eq`
//! - `greater_than` / `gt`, `greater_equal_than` / `ge`
//! - `less_than` / `lt`, `less_equal_than` / `le`
//! - `like` (case-sensitive, `%` and `_` wildcards)
//! - `ilike` (case-insensitive, `%` and `_` wildcards)
//! - `between` (inclusive, two bounds)
//!
//! Shapes that match none of these are kept as [`Condition::Unsupported`]
//! and compile to nothing.

use std::str::FromStr;

use super::traits::SqlValue;

/// Comparison operator of a single-value condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
    ILike,
}

impl FromStr for Operator {
    type Err = UnknownOperator;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "equal_to" | "eq" => Ok(Operator::Eq),
            "greater_than" | "gt" => Ok(Operator::Gt),
            "greater_equal_than" | "ge" => Ok(Operator::Ge),
            "less_than" | "lt" => Ok(Operator::Lt),
            "less_equal_than" | "le" => Ok(Operator::Le),
            "like" => Ok(Operator::Like),
            "ilike" => Ok(Operator::ILike),
            other => Err(UnknownOperator(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown comparison operator '{0}'")]
pub struct UnknownOperator(pub String);

/// Native SQL expression with positional `?` parameters, used verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Fragment {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.params.push(value.into());
        self
    }
}

/// A predicate over one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        field: String,
        op: Operator,
        value: SqlValue,
    },
    /// Inclusive range
    Between {
        field: String,
        low: SqlValue,
        high: SqlValue,
    },
    Fragment(Fragment),
    /// A shape that matched no recognized pattern; ignored on compile
    Unsupported { field: String, token: String },
}

impl Condition {
    /// `(field, value)` sugar for equality
    pub fn eq(field: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self::compare(field, Operator::Eq, value)
    }

    pub fn compare(field: impl Into<String>, op: Operator, value: impl Into<SqlValue>) -> Self {
        Condition::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn between(
        field: impl Into<String>,
        low: impl Into<SqlValue>,
        high: impl Into<SqlValue>,
    ) -> Self {
        Condition::Between {
            field: field.into(),
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn fragment(fragment: Fragment) -> Self {
        Condition::Fragment(fragment)
    }

    /// Build a condition from a comparison token and its operands.
    ///
    /// Unknown tokens, or an operand count that does not fit the token,
    /// give [`Condition::Unsupported`].
    pub fn parse(field: impl Into<String>, token: &str, values: Vec<SqlValue>) -> Self {
        let field = field.into();
        let mut values = values.into_iter();

        match (token, values.next(), values.next(), values.next()) {
            ("between", Some(low), Some(high), None) => Condition::Between { field, low, high },
            (token, Some(value), None, None) => match token.parse::<Operator>() {
                Ok(op) => Condition::Compare { field, op, value },
                Err(_) => Condition::Unsupported {
                    field,
                    token: token.to_string(),
                },
            },
            (token, _, _, _) => Condition::Unsupported {
                field,
                token: token.to_string(),
            },
        }
    }

    /// Render to a SQL fragment and its bind values, or `None` when the
    /// condition is not a recognized shape.
    pub(crate) fn to_sql(&self) -> Option<(String, Vec<SqlValue>)> {
        match self {
            Condition::Compare { field, op, value } => {
                if !is_identifier(field) {
                    return None;
                }
                let rendered = match (op, value) {
                    (Operator::Eq, SqlValue::Null) => (format!("{} IS NULL", field), Vec::new()),
                    (Operator::Like, SqlValue::String(pattern)) => (
                        format!("{} GLOB ?", field),
                        vec![SqlValue::String(like_to_glob(pattern))],
                    ),
                    (Operator::Like, _) => return None,
                    (Operator::ILike, value) => (format!("{} LIKE ?", field), vec![value.clone()]),
                    (op, value) => (format!("{} {} ?", field, op.symbol()), vec![value.clone()]),
                };
                Some(rendered)
            }
            Condition::Between { field, low, high } => {
                if !is_identifier(field) {
                    return None;
                }
                Some((
                    format!("{} BETWEEN ? AND ?", field),
                    vec![low.clone(), high.clone()],
                ))
            }
            Condition::Fragment(fragment) => {
                Some((format!("({})", fragment.sql), fragment.params.clone()))
            }
            Condition::Unsupported { .. } => None,
        }
    }
}

impl Operator {
    fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Like => "GLOB",
            Operator::ILike => "LIKE",
        }
    }
}

/// Whether `name` is a plain SQL identifier: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Translate a LIKE pattern into an equivalent GLOB pattern.
///
/// GLOB is case-sensitive in SQLite, LIKE is not.
pub fn like_to_glob(pattern: &str) -> String {
    let mut glob = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '%' => glob.push('*'),
            '_' => glob.push('?'),
            '*' => glob.push_str("[*]"),
            '?' => glob.push_str("[?]"),
            '[' => glob.push_str("[[]"),
            other => glob.push(other),
        }
    }
    glob
}
