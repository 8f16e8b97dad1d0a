pub mod tool;
pub mod tools;
pub mod registry;
pub mod database;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use tool::{FnTool, Tool, ToolContext, ToolDefinition, ToolError, ToolResult};
pub use registry::{RegistryError, ToolRegistry};
pub use database::{Database, DatabaseError, MySqlDatabase, QueryOutput};
pub use tools::{register_database_tools, DescribeTableTool, ListTablesTool, ReadOnlyQueryTool};
