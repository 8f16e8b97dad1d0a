use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::database::Database;
use crate::tool::{Tool, ToolContext, ToolDefinition, ToolError, ToolResult};
use crate::tools::database_failure;

/// Returns the list of tables in the database, one per line.
pub struct ListTablesTool {
    db: Arc<dyn Database>,
}

impl ListTablesTool {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Tool for ListTablesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "list_tables".to_string(),
            description: "Returns the list of tables in the database".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    async fn execute(&self, _input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        debug!(request = %context.request_id, "listing tables");

        match self.db.list_tables().await {
            Ok(tables) if tables.is_empty() => Ok(ToolResult::text("(no tables found)")),
            Ok(tables) => Ok(ToolResult::text(tables.join("\n"))),
            Err(e) => Ok(database_failure(e, "SHOW TABLES")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{describe_rows, MemoryDatabase};
    use crate::tools::CONNECT_FAILED;

    async fn run(db: MemoryDatabase) -> ToolResult {
        ListTablesTool::new(Arc::new(db))
            .execute(serde_json::json!({}), &ToolContext::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_lists_tables_one_per_line() {
        let db = MemoryDatabase::new()
            .with_table("customers", describe_rows(&[]))
            .with_table("orders", describe_rows(&[]));
        assert_eq!(run(db).await, ToolResult::text("customers\norders"));
    }

    #[tokio::test]
    async fn test_no_tables() {
        assert_eq!(run(MemoryDatabase::new()).await, ToolResult::text("(no tables found)"));
    }

    #[tokio::test]
    async fn test_unreachable_database() {
        assert_eq!(run(MemoryDatabase::unreachable()).await, ToolResult::error(CONNECT_FAILED));
    }
}
