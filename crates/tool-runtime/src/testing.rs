//! In-memory `Database` for exercising the SQL tools without a server.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::database::{Database, DatabaseError, QueryOutput};

/// A scripted database: known tables with their `DESCRIBE` output, and
/// canned results keyed by exact statement text. Every statement that
/// reaches it is recorded.
#[derive(Default)]
pub struct MemoryDatabase {
    tables: Vec<(String, QueryOutput)>,
    canned: Vec<(String, QueryOutput)>,
    unreachable: bool,
    executed: Mutex<Vec<String>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a server that refuses connections.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn with_table(mut self, name: &str, schema: QueryOutput) -> Self {
        self.tables.push((name.to_string(), schema));
        self
    }

    pub fn with_query_result(mut self, sql: &str, output: QueryOutput) -> Self {
        self.canned.push((sql.to_string(), output));
        self
    }

    /// Statements received so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().map(|e| e.clone()).unwrap_or_default()
    }

    fn record(&self, statement: String) -> Result<(), DatabaseError> {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(statement);
        }
        if self.unreachable {
            return Err(DatabaseError::Connect("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn list_tables(&self) -> Result<Vec<String>, DatabaseError> {
        self.record("SHOW TABLES".to_string())?;
        Ok(self.tables.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn describe_table(&self, table: &str) -> Result<QueryOutput, DatabaseError> {
        self.record(format!("DESCRIBE {table}"))?;
        self.tables
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, schema)| schema.clone())
            .ok_or_else(|| DatabaseError::Query(format!("Table '{table}' doesn't exist")))
    }

    async fn query(&self, sql: &str) -> Result<QueryOutput, DatabaseError> {
        self.record(sql.to_string())?;
        self.canned
            .iter()
            .find(|(text, _)| text == sql)
            .map(|(_, output)| output.clone())
            .ok_or_else(|| DatabaseError::Query(format!("no result scripted for `{sql}`")))
    }
}

/// Build a `DESCRIBE`-shaped schema from `(field, type, null, key, default, extra)` rows.
pub fn describe_rows(rows: &[[Option<&str>; 6]]) -> QueryOutput {
    QueryOutput::new(
        ["Field", "Type", "Null", "Key", "Default", "Extra"]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        rows.iter()
            .map(|row| row.iter().map(|cell| cell.map(str::to_string)).collect())
            .collect(),
    )
}
