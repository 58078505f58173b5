//! Tool server side: the provider trait and JSON-RPC dispatch.

use std::future::Future;

use serde_json::Value;
use tracing::{debug, warn};

use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, LATEST_PROTOCOL_VERSION, ListToolsResult,
    SUPPORTED_PROTOCOL_VERSIONS, ServerCapabilities, ServerInfo, Tool, ToolsCapability,
};

/// Something that publishes tools and executes calls against them.
///
/// `call` never fails at the protocol level: execution problems are encoded
/// in the returned [`CallToolResult`].
pub trait ToolProvider: Send + Sync + 'static {
    /// Tool definitions published by `tools/list`.
    fn tools(&self) -> Vec<Tool>;

    /// Execute a tool call.
    fn call(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> impl Future<Output = CallToolResult> + Send;
}

/// Maps JSON-RPC requests onto a [`ToolProvider`].
pub struct Dispatcher<P> {
    provider: P,
    info: ServerInfo,
}

impl<P: ToolProvider> Dispatcher<P> {
    pub fn new(provider: P, info: ServerInfo) -> Self {
        Self { provider, info }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Handle one incoming message.
    ///
    /// Returns `None` for notifications, which must not be answered.
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!(method = %request.method, id = ?request.id, "dispatching");

        if request.is_notification() {
            if request.method != "notifications/initialized" {
                debug!(method = %request.method, "ignoring notification");
            }
            return None;
        }

        let id = request.id.clone();
        let outcome = match request.method.as_str() {
            "initialize" => self.initialize(request.params),
            "ping" => Ok(Value::Object(Default::default())),
            "tools/list" => to_value(ListToolsResult {
                tools: self.provider.tools(),
            }),
            "tools/call" => self.call_tool(request.params).await,
            other => Err(JsonRpcError::method_not_found(other)),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => {
                warn!(method = %request.method, %error, "request failed");
                JsonRpcResponse::failure(id, error)
            }
        })
    }

    fn initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: InitializeParams = parse_params(params)?;
        let protocol_version = if SUPPORTED_PROTOCOL_VERSIONS.contains(&params.protocol_version.as_str()) {
            params.protocol_version
        } else {
            LATEST_PROTOCOL_VERSION.to_string()
        };

        to_value(InitializeResult {
            protocol_version,
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
            },
            server_info: self.info.clone(),
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = parse_params(params)?;
        let result = self.provider.call(&params.name, params.arguments).await;
        to_value(result)
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> Result<T, JsonRpcError> {
    serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|e| JsonRpcError::invalid_params(e.to_string()))
}

fn to_value(value: impl serde::Serialize) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value)
        .map_err(|e| JsonRpcError::new(JsonRpcError::INTERNAL_ERROR, e.to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Echoes the `text` argument back.
    pub(crate) struct Echo;

    impl ToolProvider for Echo {
        fn tools(&self) -> Vec<Tool> {
            vec![Tool {
                name: "echo".to_string(),
                description: Some("Echo text".to_string()),
                input_schema: json!({"type": "object"}),
            }]
        }

        async fn call(&self, name: &str, arguments: Option<Value>) -> CallToolResult {
            if name != "echo" {
                return CallToolResult::error(format!("unknown tool: {name}"));
            }
            let text = arguments
                .as_ref()
                .and_then(|a| a.get("text"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            CallToolResult::text(text)
        }
    }

    pub(crate) fn dispatcher() -> Dispatcher<Echo> {
        Dispatcher::new(
            Echo,
            ServerInfo {
                name: "echo".to_string(),
                version: None,
            },
        )
    }

    #[tokio::test]
    async fn initialize_echoes_supported_version() {
        let d = dispatcher();
        let req = JsonRpcRequest::new(1i64, "initialize").with_params(json!({
            "protocolVersion": "2025-03-26",
            "capabilities": {},
            "clientInfo": {"name": "test"}
        }));
        let resp = d.handle(req).await.unwrap();
        let result = resp.into_result().unwrap();
        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"]["name"], "echo");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn initialize_falls_back_for_unknown_version() {
        let d = dispatcher();
        let req = JsonRpcRequest::new(1i64, "initialize")
            .with_params(json!({"protocolVersion": "1999-01-01"}));
        let result = d.handle(req).await.unwrap().into_result().unwrap();
        assert_eq!(result["protocolVersion"], LATEST_PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let d = dispatcher();
        let note = JsonRpcRequest::notification("notifications/initialized");
        assert!(d.handle(note).await.is_none());
    }

    #[tokio::test]
    async fn list_and_call_tools() {
        let d = dispatcher();
        let list = d
            .handle(JsonRpcRequest::new(2i64, "tools/list"))
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(list["tools"][0]["name"], "echo");

        let call = JsonRpcRequest::new(3i64, "tools/call")
            .with_params(json!({"name": "echo", "arguments": {"text": "hi"}}));
        let result = d.handle(call).await.unwrap().into_result().unwrap();
        let result: CallToolResult = serde_json::from_value(result).unwrap();
        assert_eq!(result.joined_text(), "hi");
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn unknown_method_and_bad_params() {
        let d = dispatcher();
        let err = d
            .handle(JsonRpcRequest::new(4i64, "resources/list"))
            .await
            .unwrap()
            .into_result()
            .unwrap_err();
        assert_eq!(err.code, JsonRpcError::METHOD_NOT_FOUND);

        let err = d
            .handle(JsonRpcRequest::new(5i64, "tools/call").with_params(json!({"arguments": {}})))
            .await
            .unwrap()
            .into_result()
            .unwrap_err();
        assert_eq!(err.code, JsonRpcError::INVALID_PARAMS);
    }
}
