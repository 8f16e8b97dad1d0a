//! Database tools served over MCP.
//!
//! - `list_tables`: names of the tables in the configured database
//! - `describe_table`: column layout of one table
//! - `read_only_query`: a single validated `SELECT`
//!
//! Failures are reported as error results carrying `Error…` text rather
//! than as protocol errors, so clients can show them verbatim.

pub mod describe_table;
pub mod list_tables;
pub mod read_only_query;

use std::sync::Arc;

use tracing::warn;

pub use describe_table::DescribeTableTool;
pub use list_tables::ListTablesTool;
pub use read_only_query::ReadOnlyQueryTool;

use crate::database::{Database, DatabaseError};
use crate::registry::{RegistryError, ToolRegistry};
use crate::tool::ToolResult;

pub const CONNECT_FAILED: &str = "Error: Could not connect to the database.";

/// Register `list_tables`, `describe_table` and `read_only_query` against
/// one shared database handle.
pub fn register_database_tools(
    registry: &mut ToolRegistry,
    db: Arc<dyn Database>,
) -> Result<(), RegistryError> {
    registry.register(ListTablesTool::new(Arc::clone(&db)))?;
    registry.register(DescribeTableTool::new(Arc::clone(&db)))?;
    registry.register(ReadOnlyQueryTool::new(db))?;
    Ok(())
}

/// Render a header plus rows as ` | `-separated lines, `NULL` for null cells.
pub(crate) fn format_table<S: AsRef<str>>(header: &[S], rows: &[Vec<Option<String>>]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(
        header
            .iter()
            .map(|h| h.as_ref())
            .collect::<Vec<_>>()
            .join(" | "),
    );
    for row in rows {
        lines.push(
            row.iter()
                .map(|cell| cell.as_deref().unwrap_or("NULL"))
                .collect::<Vec<_>>()
                .join(" | "),
        );
    }
    lines.join("\n")
}

/// Map a database failure to the tool-level error text for `action`.
pub(crate) fn database_failure(err: DatabaseError, action: &str) -> ToolResult {
    match err {
        DatabaseError::Connect(reason) => {
            warn!(reason = %reason, "database connection failed");
            ToolResult::error(CONNECT_FAILED)
        }
        DatabaseError::Query(reason) => ToolResult::error(format!("Error executing {action}: {reason}")),
    }
}
