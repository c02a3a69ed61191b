//! Servidor MCP do Presage.
//!
//! Expõe o gatilho de análise e as consultas de patterns/insights como
//! ferramentas MCP, via JSON-RPC 2.0 delimitado por newline em stdin/stdout.
//!
//! ## Ferramentas
//!
//! - `presage_run_analysis`
//! - `presage_record_pattern`
//! - `presage_patterns_by_type`
//! - `presage_high_confidence_patterns`
//! - `presage_recent_insights`
//! - `presage_status`

pub mod protocol;
pub mod server;
pub mod tools;
pub mod transport;

pub use protocol::{
    CallToolParams, InitializeResult, JsonRpcError, JsonRpcId, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, ToolContent, ToolDescription, ToolResult, PROTOCOL_VERSION,
};
pub use server::McpServer;
pub use tools::ToolHandler;
pub use transport::{Incoming, LineTransport, StdioTransport};
