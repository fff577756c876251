//! Query descriptors.
//!
//! A [`Query`] is plain data: it crosses from the tick thread to a worker
//! and says what to do, never how. Backends interpret it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Values and rows
// ---------------------------------------------------------------------------

/// One column value.
///
/// `#[serde(untagged)]` lets fixtures use bare JSON values:
/// `{"ID": 1, "Username": "mira", "Banned": null}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Str(String),
    Null,
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "'{s}'"),
            Value::Null => f.write_str("NULL"),
        }
    }
}

/// A row: column name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, Value>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copies every column of `other` into this row.
    pub fn merge(&mut self, other: &Row) {
        for (column, value) in &other.0 {
            self.0.insert(column.clone(), value.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryKind {
    Select,
    Insert,
    Update,
}

/// Which rows a query touches.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Predicate {
    /// Every row.
    #[default]
    All,
    /// Rows whose column equals the value.
    Eq(String, Value),
    /// Rows matching every inner predicate.
    And(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Eq(column.into(), value.into())
    }

    /// Does `row` satisfy this predicate?
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Eq(column, value) => row.get(column) == Some(value),
            Predicate::And(all) => all.iter().all(|p| p.matches(row)),
        }
    }

    fn and(self, other: Predicate) -> Predicate {
        match self {
            Predicate::All => other,
            Predicate::And(mut all) => {
                all.push(other);
                Predicate::And(all)
            }
            single => Predicate::And(vec![single, other]),
        }
    }
}

/// A storage request.
///
/// ```
/// use tickward_persist::{Query, QueryKind};
///
/// let q = Query::update("tw_accounts")
///     .set("Level", 4)
///     .filter("ID", 7);
/// assert_eq!(q.kind, QueryKind::Update);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub kind: QueryKind,
    pub table: String,
    pub predicate: Predicate,
    /// Columns to write (INSERT/UPDATE). Ignored by SELECT.
    pub values: Row,
}

impl Query {
    fn new(kind: QueryKind, table: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.into(),
            predicate: Predicate::All,
            values: Row::new(),
        }
    }

    pub fn select(table: impl Into<String>) -> Self {
        Self::new(QueryKind::Select, table)
    }

    pub fn insert(table: impl Into<String>) -> Self {
        Self::new(QueryKind::Insert, table)
    }

    pub fn update(table: impl Into<String>) -> Self {
        Self::new(QueryKind::Update, table)
    }

    /// Adds an equality condition (ANDed with any existing ones).
    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicate = std::mem::take(&mut self.predicate).and(Predicate::eq(column, value));
        self
    }

    /// Adds a column to write.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.set(column, value);
        self
    }

    /// Writes every column of `row`.
    pub fn set_row(mut self, row: &Row) -> Self {
        self.values.merge(row);
        self
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.kind {
            QueryKind::Select => "SELECT",
            QueryKind::Insert => "INSERT",
            QueryKind::Update => "UPDATE",
        };
        write!(f, "{verb} {}", self.table)
    }
}
