//! Forward-only result cursor.

use crate::{PersistError, Row, Value};

/// Rows returned by a query, read one at a time.
///
/// The cursor starts *before* the first row; call [`next`](Self::next)
/// to move onto it. `NULL` reads as `0` or `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    rows: Vec<Row>,
    position: Option<usize>,
    affected: u64,
}

impl ResultSet {
    /// A result holding `rows` (SELECT).
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            position: None,
            affected: 0,
        }
    }

    /// A result with no rows that touched `affected` rows (INSERT/UPDATE).
    pub fn affected(affected: u64) -> Self {
        Self {
            rows: Vec::new(),
            position: None,
            affected,
        }
    }

    /// Advances to the next row. Returns `false` once exhausted.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        let next = self.position.map_or(0, |p| p + 1);
        if next < self.rows.len() {
            self.position = Some(next);
            true
        } else {
            self.position = Some(self.rows.len());
            false
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn affected_rows(&self) -> u64 {
        self.affected
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The row under the cursor.
    pub fn current(&self) -> Option<&Row> {
        self.position.and_then(|p| self.rows.get(p))
    }

    fn value(&self, column: &str) -> Result<&Value, PersistError> {
        let row = self.current().ok_or(PersistError::NoCurrentRow)?;
        row.get(column)
            .ok_or_else(|| PersistError::MissingColumn(column.to_owned()))
    }

    /// Reads a 32-bit integer column.
    pub fn get_int(&self, column: &str) -> Result<i32, PersistError> {
        let v = self.get_int64(column)?;
        i32::try_from(v).map_err(|_| PersistError::TypeMismatch {
            column: column.to_owned(),
            expected: "a 32-bit integer",
        })
    }

    /// Reads a 64-bit integer column.
    pub fn get_int64(&self, column: &str) -> Result<i64, PersistError> {
        match self.value(column)? {
            Value::Int(v) => Ok(*v),
            Value::Null => Ok(0),
            Value::Str(_) => Err(PersistError::TypeMismatch {
                column: column.to_owned(),
                expected: "an integer",
            }),
        }
    }

    /// Reads a string column.
    pub fn get_string(&self, column: &str) -> Result<String, PersistError> {
        match self.value(column)? {
            Value::Str(s) => Ok(s.clone()),
            Value::Null => Ok(String::new()),
            Value::Int(_) => Err(PersistError::TypeMismatch {
                column: column.to_owned(),
                expected: "a string",
            }),
        }
    }
}
