//! Database access used by the SQL tools.
//!
//! Tools talk to the `Database` trait; `MySqlDatabase` is the production
//! backend built on a lazily connecting `sqlx` pool.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Row, ValueRef};
use tracing::debug;

use sqlpipe_core::DatabaseConfig;

/// Tabular output of a statement: column names plus rows of optional text
/// cells (`None` is SQL `NULL`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl QueryOutput {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// No connection could be established.
    #[error("connection failed: {0}")]
    Connect(String),
    /// The server rejected or failed the statement.
    #[error("{0}")]
    Query(String),
}

/// The three operations the SQL tools need from a relational database.
#[async_trait]
pub trait Database: Send + Sync {
    async fn list_tables(&self) -> Result<Vec<String>, DatabaseError>;

    /// Column metadata in `DESCRIBE` shape: Field, Type, Null, Key, Default, Extra.
    async fn describe_table(&self, table: &str) -> Result<QueryOutput, DatabaseError>;

    /// Run a single statement that has already passed read-only validation.
    async fn query(&self, sql: &str) -> Result<QueryOutput, DatabaseError>;
}

/// Quote a MySQL identifier with backticks, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// MySQL backend.
///
/// The pool connects lazily so the server starts even when the database is
/// down; every call then reports the failure on its own.
pub struct MySqlDatabase {
    pool: MySqlPool,
}

impl MySqlDatabase {
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password);
        if config.has_database() {
            options = options.database(&config.database);
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy_with(options);

        Self { pool }
    }

    /// Executes over the text protocol so every cell arrives as text,
    /// whatever its column type.
    async fn fetch(&self, sql: &str) -> Result<Vec<MySqlRow>, DatabaseError> {
        debug!(sql = %sql, "executing statement");
        sqlx::raw_sql(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(classify_error)
    }
}

/// Split driver errors into "could not reach the server" and "the server
/// rejected the statement".
fn classify_error(err: sqlx::Error) -> DatabaseError {
    match err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => DatabaseError::Connect(err.to_string()),
        other => DatabaseError::Query(other.to_string()),
    }
}

#[async_trait]
impl Database for MySqlDatabase {
    async fn list_tables(&self) -> Result<Vec<String>, DatabaseError> {
        let rows = self.fetch("SHOW TABLES").await?;
        Ok(rows
            .iter()
            .filter_map(|row| cell_text(row, 0))
            .collect())
    }

    async fn describe_table(&self, table: &str) -> Result<QueryOutput, DatabaseError> {
        let sql = format!("DESCRIBE {}", quote_identifier(table));
        let rows = self.fetch(&sql).await?;
        Ok(to_output(&rows))
    }

    async fn query(&self, sql: &str) -> Result<QueryOutput, DatabaseError> {
        let rows = self.fetch(sql).await?;
        Ok(to_output(&rows))
    }
}

fn to_output(rows: &[MySqlRow]) -> QueryOutput {
    let columns = rows
        .first()
        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();

    let rows = rows
        .iter()
        .map(|row| (0..row.len()).map(|idx| cell_text(row, idx)).collect())
        .collect();

    QueryOutput { columns, rows }
}

fn cell_text(row: &MySqlRow, idx: usize) -> Option<String> {
    let raw = row.try_get_raw(idx).ok()?;
    if raw.is_null() {
        return None;
    }
    match row.try_get_unchecked::<String, _>(idx) {
        Ok(text) => Some(text),
        // Binary columns that are not valid UTF-8.
        Err(_) => row
            .try_get_unchecked::<Vec<u8>, _>(idx)
            .ok()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("users"), "`users`");
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
        assert_eq!(
            quote_identifier("x`; DROP TABLE t; --"),
            "`x``; DROP TABLE t; --`"
        );
    }

    #[test]
    fn test_query_output_is_empty() {
        assert!(QueryOutput::default().is_empty());
        let out = QueryOutput::new(vec!["n".into()], vec![vec![Some("1".into())]]);
        assert!(!out.is_empty());
    }

    #[test]
    fn test_classify_error() {
        assert!(matches!(classify_error(sqlx::Error::PoolTimedOut), DatabaseError::Connect(_)));
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(classify_error(sqlx::Error::Io(refused)), DatabaseError::Connect(_)));
        assert!(matches!(classify_error(sqlx::Error::RowNotFound), DatabaseError::Query(_)));
        assert!(matches!(
            classify_error(sqlx::Error::Protocol("unexpected packet".into())),
            DatabaseError::Query(ref m) if m.contains("unexpected packet")
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_connect_error() {
        let config = DatabaseConfig {
            host: "127.0.0.1".to_string(),
            // Port 1 is reserved and closed on any sane test host.
            port: 1,
            ..DatabaseConfig::default()
        };
        let db = MySqlDatabase::connect_lazy(&config);
        let err = db.list_tables().await.unwrap_err();
        assert!(matches!(err, DatabaseError::Connect(_)));
    }
}
