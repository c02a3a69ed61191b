//! Loop do servidor MCP.

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncWrite};

use crate::pipeline::Services;
use crate::PresageResult;

use super::protocol::{
    CallToolParams, InitializeResult, JsonRpcError, JsonRpcId, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult,
};
use super::tools::ToolHandler;
use super::transport::{Incoming, LineTransport, StdioTransport};

/// Servidor MCP sobre um transporte de linhas.
pub struct McpServer<R, W> {
    transport: LineTransport<R, W>,
    tools: ToolHandler,
    initialized: bool,
}

impl McpServer<tokio::io::BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    /// Servidor em stdin/stdout.
    pub fn stdio(services: Services) -> Self {
        Self::new(StdioTransport::stdio(), services)
    }
}

impl<R, W> McpServer<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(transport: LineTransport<R, W>, services: Services) -> Self {
        Self {
            transport,
            tools: ToolHandler::new(services),
            initialized: false,
        }
    }

    /// Processa mensagens até o cliente fechar o stream.
    pub async fn run(&mut self) -> PresageResult<()> {
        tracing::info!("Presage MCP server starting");

        loop {
            let line = match self.transport.next_line().await? {
                Incoming::Line(line) => line,
                Incoming::Closed => {
                    tracing::info!("Client disconnected");
                    break;
                }
            };

            let request: JsonRpcRequest = match serde_json::from_str(&line) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!(error = %e, "Malformed JSON-RPC message");
                    self.transport
                        .send(&JsonRpcResponse::failure(None, JsonRpcError::parse_error(e)))
                        .await?;
                    continue;
                }
            };

            let is_notification = request.is_notification();
            let response = self.handle_request(request).await;
            if !is_notification {
                self.transport.send(&response).await?;
            }
        }

        tracing::info!("Presage MCP server stopped");
        Ok(())
    }

    /// Devolve os serviços (para o shutdown do chamador).
    pub fn into_parts(self) -> (Services, W) {
        (self.tools.into_services(), self.transport.into_writer())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    async fn handle_request(&mut self, request: JsonRpcRequest) -> JsonRpcResponse {
        tracing::debug!(method = %request.method, id = ?request.id, "Handling request");

        if request.jsonrpc != "2.0" {
            return JsonRpcResponse::failure(
                request.id,
                JsonRpcError::invalid_request("jsonrpc must be \"2.0\""),
            );
        }

        match request.method.as_str() {
            "initialize" => {
                self.initialized = true;
                tracing::info!("Client initialized");
                respond(request.id, &InitializeResult::default())
            }
            "initialized" | "notifications/initialized" => {
                JsonRpcResponse::success(request.id, json!({}))
            }
            "shutdown" => {
                self.initialized = false;
                tracing::info!("Client requested shutdown");
                JsonRpcResponse::success(request.id, Value::Null)
            }
            "ping" => JsonRpcResponse::success(request.id, json!({})),
            "tools/list" => respond(
                request.id,
                &ListToolsResult {
                    tools: ToolHandler::list_tools(),
                },
            ),
            "tools/call" => self.handle_tools_call(request).await,
            other => JsonRpcResponse::failure(request.id, JsonRpcError::method_not_found(other)),
        }
    }

    async fn handle_tools_call(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let params: CallToolParams = match request.params.map(serde_json::from_value) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return JsonRpcResponse::failure(
                    request.id,
                    JsonRpcError::invalid_params(format!("Invalid params: {}", e)),
                )
            }
            None => {
                return JsonRpcResponse::failure(
                    request.id,
                    JsonRpcError::invalid_params("Missing params"),
                )
            }
        };

        tracing::info!(tool = %params.name, "Calling tool");
        let result = self.tools.handle_tool_call(&params.name, params.arguments).await;
        if result.is_error {
            tracing::warn!(tool = %params.name, detail = %result.text(), "Tool returned an error");
        }
        respond(request.id, &result)
    }
}

fn respond<T: serde::Serialize>(id: Option<JsonRpcId>, body: &T) -> JsonRpcResponse {
    match serde_json::to_value(body) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::failure(id, JsonRpcError::internal(e.to_string())),
    }
}
