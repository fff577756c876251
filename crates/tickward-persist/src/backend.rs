//! Storage backends.
//!
//! A [`Backend`] executes one [`Query`] at a time and is shared by every
//! gateway worker, so implementations must be `Send + Sync`. The bundled
//! [`MemoryBackend`] keeps tables in memory and is what the demo and the
//! tests run against.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::{PersistError, Query, QueryKind, ResultSet, Row, Value};

/// Something that can run queries.
pub trait Backend: Send + Sync + 'static {
    /// Executes `query`. Called from worker tasks, never from the tick thread.
    fn execute(&self, query: Query) -> impl Future<Output = Result<ResultSet, PersistError>> + Send;
}

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Row>,
    next_id: i64,
}

/// In-memory tables with equality filters.
///
/// INSERT assigns an auto-increment `ID` column when the row has none.
/// Latency can be injected globally or per table, and [`set_offline`]
/// makes every query fail with [`PersistError::Unavailable`].
///
/// [`set_offline`]: MemoryBackend::set_offline
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: Mutex<HashMap<String, Table>>,
    latency: Duration,
    table_latency: HashMap<String, Duration>,
    offline: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every query sleeps `latency` before running.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queries on `table` sleep `latency` instead of the global latency.
    pub fn with_table_latency(mut self, table: impl Into<String>, latency: Duration) -> Self {
        self.table_latency.insert(table.into(), latency);
        self
    }

    /// Simulates losing the connection.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Creates an empty table if it does not exist yet.
    pub async fn create_table(&self, name: &str) {
        let mut tables = self.tables.lock().await;
        tables.entry(name.to_owned()).or_insert_with(|| Table {
            rows: Vec::new(),
            next_id: 1,
        });
    }

    /// Inserts rows directly, bypassing latency and the offline switch.
    pub async fn seed(&self, table: &str, rows: impl IntoIterator<Item = Row>) {
        let mut tables = self.tables.lock().await;
        let table = tables.entry(table.to_owned()).or_insert_with(|| Table {
            rows: Vec::new(),
            next_id: 1,
        });
        for row in rows {
            insert_row(table, row);
        }
    }

    /// Loads fixtures shaped as `{"table": [{"col": value, ...}, ...], ...}`.
    pub async fn load_json(&self, json: &str) -> Result<usize, PersistError> {
        let fixtures: HashMap<String, Vec<Row>> =
            serde_json::from_str(json).map_err(|e| PersistError::Fixture(e.to_string()))?;
        let mut total = 0;
        for (table, rows) in fixtures {
            total += rows.len();
            self.seed(&table, rows).await;
        }
        debug!(rows = total, "fixtures loaded");
        Ok(total)
    }

    /// Snapshot of a table's rows, for inspection in tests and tools.
    pub async fn rows(&self, table: &str) -> Option<Vec<Row>> {
        let tables = self.tables.lock().await;
        tables.get(table).map(|t| t.rows.clone())
    }

    fn latency_for(&self, table: &str) -> Duration {
        self.table_latency
            .get(table)
            .copied()
            .unwrap_or(self.latency)
    }

    async fn run(&self, query: Query) -> Result<ResultSet, PersistError> {
        let mut tables = self.tables.lock().await;

        match query.kind {
            QueryKind::Select => {
                let table = tables
                    .get(&query.table)
                    .ok_or_else(|| PersistError::UnknownTable(query.table.clone()))?;
                let rows = table
                    .rows
                    .iter()
                    .filter(|row| query.predicate.matches(row))
                    .cloned()
                    .collect();
                Ok(ResultSet::from_rows(rows))
            }
            QueryKind::Insert => {
                let table = tables
                    .get_mut(&query.table)
                    .ok_or_else(|| PersistError::UnknownTable(query.table.clone()))?;
                insert_row(table, query.values);
                Ok(ResultSet::affected(1))
            }
            QueryKind::Update => {
                let table = tables
                    .get_mut(&query.table)
                    .ok_or_else(|| PersistError::UnknownTable(query.table.clone()))?;
                let mut affected = 0;
                for row in table
                    .rows
                    .iter_mut()
                    .filter(|row| query.predicate.matches(row))
                {
                    row.merge(&query.values);
                    affected += 1;
                }
                Ok(ResultSet::affected(affected))
            }
        }
    }
}

fn insert_row(table: &mut Table, mut row: Row) {
    match row.get("ID") {
        Some(Value::Int(id)) => table.next_id = table.next_id.max(id + 1),
        _ => {
            row.set("ID", table.next_id.max(1));
            table.next_id = table.next_id.max(1) + 1;
        }
    }
    table.rows.push(row);
}

impl Backend for MemoryBackend {
    async fn execute(&self, query: Query) -> Result<ResultSet, PersistError> {
        let latency = self.latency_for(&query.table);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.is_offline() {
            return Err(PersistError::Unavailable);
        }
        trace!(%query, "executing");
        self.run(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_assigns_incrementing_ids() {
        let db = MemoryBackend::new();
        db.create_table("tw_houses").await;
        db.execute(Query::insert("tw_houses").set("Owner", 5))
            .await
            .unwrap();
        db.execute(Query::insert("tw_houses").set("Owner", 6))
            .await
            .unwrap();

        let rows = db.rows("tw_houses").await.unwrap();
        assert_eq!(rows[0].get("ID"), Some(&Value::Int(1)));
        assert_eq!(rows[1].get("ID"), Some(&Value::Int(2)));
    }

    #[tokio::test]
    async fn test_seed_with_explicit_ids_advances_counter() {
        let db = MemoryBackend::new();
        db.seed("tw_guilds", [Row::new().with("ID", 10)]).await;
        db.execute(Query::insert("tw_guilds")).await.unwrap();
        let rows = db.rows("tw_guilds").await.unwrap();
        assert_eq!(rows[1].get("ID"), Some(&Value::Int(11)));
    }

    #[tokio::test]
    async fn test_update_touches_matching_rows_only() {
        let db = MemoryBackend::new();
        db.seed(
            "tw_accounts",
            [
                Row::new().with("ID", 1).with("Level", 1),
                Row::new().with("ID", 2).with("Level", 1),
            ],
        )
        .await;

        let rs = db
            .execute(Query::update("tw_accounts").set("Level", 9).filter("ID", 2))
            .await
            .unwrap();
        assert_eq!(rs.affected_rows(), 1);

        let mut rs = db
            .execute(Query::select("tw_accounts").filter("ID", 2))
            .await
            .unwrap();
        assert!(rs.next());
        assert_eq!(rs.get_int("Level").unwrap(), 9);
    }

    #[tokio::test]
    async fn test_select_unknown_table_errors() {
        let db = MemoryBackend::new();
        let err = db.execute(Query::select("nope")).await.unwrap_err();
        assert_eq!(err, PersistError::UnknownTable("nope".into()));
    }

    #[tokio::test]
    async fn test_offline_fails_every_query() {
        let db = MemoryBackend::new();
        db.create_table("t").await;
        db.set_offline(true);
        assert_eq!(
            db.execute(Query::select("t")).await.unwrap_err(),
            PersistError::Unavailable
        );
        db.set_offline(false);
        assert!(db.execute(Query::select("t")).await.is_ok());
    }

    #[tokio::test]
    async fn test_load_json_seeds_tables() {
        let db = MemoryBackend::new();
        let n = db
            .load_json(r#"{"tw_accounts": [{"ID": 1, "Username": "mira"}], "tw_groups": []}"#)
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert!(db.rows("tw_groups").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_json_rejects_malformed_input() {
        let db = MemoryBackend::new();
        assert!(matches!(
            db.load_json("[1, 2").await,
            Err(PersistError::Fixture(_))
        ));
    }
}
