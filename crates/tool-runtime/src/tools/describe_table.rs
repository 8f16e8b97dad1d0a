use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::database::Database;
use crate::tool::{required_str, Tool, ToolContext, ToolDefinition, ToolError, ToolResult};
use crate::tools::{database_failure, format_table};

const HEADER: [&str; 6] = ["Field", "Type", "Null", "Key", "Default", "Extra"];

/// Returns the schema (`DESCRIBE`) of one table.
pub struct DescribeTableTool {
    db: Arc<dyn Database>,
}

impl DescribeTableTool {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Tool for DescribeTableTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "describe_table".to_string(),
            description: "Returns the schema (DESCRIBE) of the specified table".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "table_name": {
                        "type": "string",
                        "description": "Name of the table to describe"
                    }
                },
                "required": ["table_name"]
            }),
        }
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        let table = required_str(&input, "table_name")?;
        debug!(request = %context.request_id, table = %table, "describing table");

        match self.db.describe_table(table).await {
            Ok(schema) if schema.is_empty() => Ok(ToolResult::text(format!(
                "No description found for table '{table}'."
            ))),
            Ok(schema) => Ok(ToolResult::text(format_table(&HEADER[..], &schema.rows))),
            Err(e) => Ok(database_failure(e, "DESCRIBE")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{describe_rows, MemoryDatabase};

    fn shop() -> Arc<MemoryDatabase> {
        Arc::new(
            MemoryDatabase::new()
                .with_table(
                    "users",
                    describe_rows(&[
                        [Some("id"), Some("int"), Some("NO"), Some("PRI"), None, Some("auto_increment")],
                        [Some("email"), Some("varchar(255)"), Some("YES"), Some(""), None, Some("")],
                    ]),
                )
                .with_table("empty", describe_rows(&[])),
        )
    }

    #[tokio::test]
    async fn test_describe_formats_columns() {
        let result = DescribeTableTool::new(shop())
            .execute(serde_json::json!({"table_name": "users"}), &ToolContext::default())
            .await
            .unwrap();

        assert!(!result.is_error);
        assert_eq!(
            result.content,
            "Field | Type | Null | Key | Default | Extra\n\
             id | int | NO | PRI | NULL | auto_increment\n\
             email | varchar(255) | YES |  | NULL | "
        );
    }

    #[tokio::test]
    async fn test_describe_without_columns() {
        let result = DescribeTableTool::new(shop())
            .execute(serde_json::json!({"table_name": "empty"}), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(result, ToolResult::text("No description found for table 'empty'."));
    }

    #[tokio::test]
    async fn test_describe_unknown_table() {
        let result = DescribeTableTool::new(shop())
            .execute(serde_json::json!({"table_name": "ghost"}), &ToolContext::default())
            .await
            .unwrap();
        assert!(result.is_error);
        assert_eq!(result.content, "Error executing DESCRIBE: Table 'ghost' doesn't exist");
    }

    #[tokio::test]
    async fn test_describe_requires_table_name() {
        let err = DescribeTableTool::new(shop())
            .execute(serde_json::json!({}), &ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
