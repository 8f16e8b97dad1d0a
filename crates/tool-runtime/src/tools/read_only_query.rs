use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::database::Database;
use crate::tool::{required_str, Tool, ToolContext, ToolDefinition, ToolError, ToolResult};
use crate::tools::{database_failure, format_table};

pub const ONLY_SELECT: &str = "Error: Only SELECT queries are allowed.";
pub const SINGLE_STATEMENT: &str = "Error: Only a single SELECT statement is allowed.";

/// Runs a read-only `SELECT` query.
pub struct ReadOnlyQueryTool {
    db: Arc<dyn Database>,
}

impl ReadOnlyQueryTool {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

/// Accept only text that starts with `SELECT` (case-insensitive, ignoring
/// surrounding whitespace) and holds a single statement. Returns the
/// statement with trailing terminators stripped.
///
/// A `;` only separates statements outside quoted text, so literals and
/// quoted identifiers may contain one.
pub fn validate_select(query: &str) -> Result<&str, &'static str> {
    let trimmed = query.trim();
    if !trimmed.to_uppercase().starts_with("SELECT") {
        return Err(ONLY_SELECT);
    }
    let statement = trimmed.trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    if has_unquoted_semicolon(statement) {
        return Err(SINGLE_STATEMENT);
    }
    Ok(statement)
}

/// Scan for a `;` outside `'…'`, `"…"` and `` `…` `` spans. Backslash
/// escapes apply inside string literals, as in MySQL's default mode.
fn has_unquoted_semicolon(sql: &str) -> bool {
    let mut quote: Option<char> = None;
    let mut chars = sql.chars();
    while let Some(c) = chars.next() {
        match quote {
            Some('`') if c == '`' => quote = None,
            Some(q) if q != '`' && c == '\\' => {
                chars.next();
            }
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                ';' => return true,
                _ => {}
            },
        }
    }
    false
}

#[async_trait]
impl Tool for ReadOnlyQueryTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "read_only_query".to_string(),
            description: "Runs a read-only SELECT query safely. Only SELECT queries are allowed."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "A single SELECT statement"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolResult, ToolError> {
        let query = required_str(&input, "query")?;

        let statement = match validate_select(query) {
            Ok(statement) => statement,
            Err(rejection) => {
                warn!(request = %context.request_id, query = %query, "rejected non-SELECT query");
                return Ok(ToolResult::error(rejection));
            }
        };

        debug!(request = %context.request_id, "running read-only query");
        match self.db.query(statement).await {
            Ok(output) if output.is_empty() => Ok(ToolResult::text("(no rows returned)")),
            Ok(output) => Ok(ToolResult::text(format_table(&output.columns[..], &output.rows))),
            Err(e) => Ok(database_failure(e, "query")),
        }
    }
}
