//! MCP client over the HTTP + SSE transport.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde_json::Value;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::MAX_OUTPUT_SIZE;
use crate::error::{Error, Result};
use crate::event::EventStream;
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, RequestId, Tool,
};
use crate::sse::SSE_PATH;

/// Channel settings. Fixed in code; [`ChannelOptions::default`] holds the
/// values the agent runs with.
#[derive(Debug, Clone, Copy)]
pub struct ChannelOptions {
    /// TCP connect timeout, also bounds the wait for the `endpoint` event.
    pub connect_timeout: Duration,
    /// How long a request waits for its response event.
    pub read_timeout: Duration,
    /// How long posting a request may take.
    pub write_timeout: Duration,
    /// Retry opening the event stream when it fails.
    pub retry_connect: bool,
    /// Extra attempts made when `retry_connect` is set.
    pub max_retries: u32,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            retry_connect: true,
            max_retries: 2,
        }
    }
}

/// Timeout used by [`probe`] in the agent's startup check.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

type Pending = Arc<Mutex<HashMap<RequestId, oneshot::Sender<Result<JsonRpcResponse>>>>>;

/// Handle to a tool server reached over SSE.
pub struct SseClient {
    http: reqwest::Client,
    endpoint: reqwest::Url,
    options: ChannelOptions,
    next_id: AtomicI64,
    pending: Pending,
    reader: JoinHandle<()>,
    initialized: Mutex<bool>,
    server_info: Mutex<Option<InitializeResult>>,
    tools: Mutex<Vec<Tool>>,
}

/// URL of the handshake endpoint for a server base URL.
pub fn handshake_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let base = base.strip_suffix(SSE_PATH).unwrap_or(base);
    format!("{base}{SSE_PATH}")
}

/// Check whether a tool server answers on its handshake endpoint.
///
/// Reachable means a `200` status, or a read that timed out after the
/// connection was made (the event stream never ends on its own).
pub async fn probe(base_url: &str, limit: Duration) -> bool {
    let url = handshake_url(base_url);
    let client = match reqwest::Client::builder()
        .connect_timeout(limit)
        .timeout(limit)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            warn!("failed to build probe client: {e}");
            return false;
        }
    };

    match client.get(&url).header(ACCEPT, "text/event-stream").send().await {
        Ok(response) => {
            debug!(%url, status = %response.status(), "probe answered");
            response.status() == StatusCode::OK
        }
        Err(e) if e.is_timeout() && !e.is_connect() => true,
        Err(e) => {
            debug!(%url, "probe failed: {e}");
            false
        }
    }
}

impl SseClient {
    /// Open the event stream and learn the message endpoint.
    ///
    /// The stream is retried up to `max_retries` more times when
    /// `retry_connect` is set.
    pub async fn connect(base_url: &str, options: ChannelOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout)
            .build()?;
        let url = handshake_url(base_url);
        let attempts = if options.retry_connect {
            options.max_retries + 1
        } else {
            1
        };

        let mut last_error = Error::ServerExited;
        for attempt in 1..=attempts {
            match Self::open(&http, &url, options).await {
                Ok(client) => return Ok(client),
                Err(e) => {
                    warn!(attempt, attempts, %url, "failed to open event stream: {e}");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    async fn open(http: &reqwest::Client, url: &str, options: ChannelOptions) -> Result<Self> {
        let response = http
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Status(response.status().as_u16()));
        }
        let stream_url = response.url().clone();
        let mut events = EventStream::new(Box::pin(response.bytes_stream()));

        let endpoint = timeout(options.connect_timeout, async {
            while let Some(event) = events.next_event().await {
                let event = event?;
                if event.event == "endpoint" {
                    return stream_url
                        .join(event.data.trim())
                        .map_err(|e| Error::InvalidResponse(format!("bad endpoint: {e}")));
                }
            }
            Err(Error::ServerExited)
        })
        .await
        .map_err(|_| Error::Timeout)??;
        info!(%endpoint, "event stream open");

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let reader = tokio::spawn(route_responses(events, pending.clone()));

        Ok(Self {
            http: http.clone(),
            endpoint,
            options,
            next_id: AtomicI64::new(1),
            pending,
            reader,
            initialized: Mutex::new(false),
            server_info: Mutex::new(None),
            tools: Mutex::new(Vec::new()),
        })
    }

    /// Run the MCP handshake and fetch the tool list.
    pub async fn initialize(&self) -> Result<&Self> {
        let result: InitializeResult = self
            .request("initialize", Some(InitializeParams::default()))
            .await?;

        self.notify("notifications/initialized").await?;

        info!(server = %result.server_info.name, version = %result.protocol_version, "initialized");
        *self.server_info.lock().await = Some(result);
        *self.initialized.lock().await = true;

        self.refresh_tools().await?;
        Ok(self)
    }

    /// Get server info (after initialization).
    pub async fn server_info(&self) -> Option<InitializeResult> {
        self.server_info.lock().await.clone()
    }

    /// Refresh the list of available tools.
    pub async fn refresh_tools(&self) -> Result<()> {
        let result: ListToolsResult = self.request("tools/list", None::<()>).await?;
        *self.tools.lock().await = result.tools;
        Ok(())
    }

    /// Get the list of available tools.
    pub async fn tools(&self) -> Vec<Tool> {
        self.tools.lock().await.clone()
    }

    /// Call a tool by name.
    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
        if !*self.initialized.lock().await {
            return Err(Error::NotInitialized);
        }

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        let result: CallToolResult = self.request("tools/call", Some(params)).await?;

        if result.is_error {
            return Err(Error::ToolCallFailed(result.joined_text()));
        }
        Ok(result)
    }

    /// Whether the event stream is still being read.
    pub fn is_connected(&self) -> bool {
        !self.reader.is_finished()
    }

    // --- Internal methods ---

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn request<P, R>(&self, method: &str, params: Option<P>) -> Result<R>
    where
        P: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let id = self.next_request_id();
        let mut request = JsonRpcRequest::new(id.clone(), method);
        if let Some(p) = params {
            request = request.with_params(p);
        }

        // Register before posting: the response may beat the POST reply.
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        if let Err(e) = self.post(&request).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let response = match timeout(self.options.read_timeout, rx).await {
            Ok(Ok(Ok(response))) => response,
            Ok(Ok(Err(e))) => return Err(e),
            Ok(Err(_)) => return Err(Error::ServerExited),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(Error::Timeout);
            }
        };

        let result = response.into_result()?;
        Ok(serde_json::from_value(result)?)
    }

    async fn notify(&self, method: &str) -> Result<()> {
        self.post(&JsonRpcRequest::notification(method)).await
    }

    async fn post(&self, request: &JsonRpcRequest) -> Result<()> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .timeout(self.options.write_timeout)
            .json(request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

impl Drop for SseClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn route_responses<S, B>(mut events: EventStream<S>, pending: Pending)
where
    S: futures::Stream<Item = reqwest::Result<B>> + Unpin,
    B: AsRef<[u8]>,
{
    while let Some(event) = events.next_event().await {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                warn!("event stream failed: {e}");
                break;
            }
        };
        if event.event != "message" {
            debug!(event = %event.event, "ignoring event");
            continue;
        }
        if let Some(size) = event.oversized {
            reject_oversized(&pending, &event.data, size).await;
            continue;
        }

        let response: JsonRpcResponse = match serde_json::from_str(&event.data) {
            Ok(response) => response,
            Err(e) => {
                warn!("invalid JSON-RPC response: {e}");
                continue;
            }
        };
        let Some(id) = response.id.clone() else {
            warn!(error = ?response.error, "response without id");
            continue;
        };
        match pending.lock().await.remove(&id) {
            Some(tx) => {
                let _ = tx.send(Ok(response));
            }
            None => debug!(?id, "response for unknown request"),
        }
    }

    // Wake every waiter; their receivers now fail with ServerExited.
    pending.lock().await.clear();
}

/// Fail the request an oversized response belonged to.
///
/// Only the head of the event is kept, so the id is read from there.
async fn reject_oversized(pending: &Pending, head: &str, size: usize) {
    let Some(id) = leading_id(head) else {
        warn!(size, "oversized event without a readable id");
        return;
    };
    warn!(?id, size, max = MAX_OUTPUT_SIZE, "response too large");
    if let Some(tx) = pending.lock().await.remove(&id) {
        let _ = tx.send(Err(Error::OutputTooLarge {
            size,
            max: MAX_OUTPUT_SIZE,
        }));
    }
}

/// First `"id"` member of a (possibly cut off) JSON-RPC message.
fn leading_id(head: &str) -> Option<RequestId> {
    let (_, rest) = head.split_once("\"id\"")?;
    let rest = rest.trim_start().strip_prefix(':')?.trim_start();
    if let Some(quoted) = rest.strip_prefix('"') {
        let (id, _) = quoted.split_once('"')?;
        return Some(RequestId::String(id.to_string()));
    }
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '-'))
        .unwrap_or(rest.len());
    rest[..end].parse().ok().map(RequestId::Number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_url_variants() {
        assert_eq!(handshake_url("http://127.0.0.1:8000"), "http://127.0.0.1:8000/sse");
        assert_eq!(handshake_url("http://127.0.0.1:8000/"), "http://127.0.0.1:8000/sse");
        assert_eq!(handshake_url("http://127.0.0.1:8000/sse"), "http://127.0.0.1:8000/sse");
    }

    #[test]
    fn default_channel_options() {
        let options = ChannelOptions::default();
        assert_eq!(options.connect_timeout, Duration::from_secs(10));
        assert_eq!(options.read_timeout, Duration::from_secs(5));
        assert_eq!(options.write_timeout, Duration::from_secs(5));
        assert!(options.retry_connect);
        assert_eq!(options.max_retries, 2);
    }

    #[test]
    fn leading_id_reads_cut_off_messages() {
        assert_eq!(
            leading_id(r#"{"jsonrpc":"2.0","id":42,"result":{"content":[{"te"#),
            Some(RequestId::Number(42))
        );
        assert_eq!(
            leading_id(r#"{"jsonrpc":"2.0","id": "abc","res"#),
            Some(RequestId::String("abc".into()))
        );
        assert_eq!(leading_id(r#"{"jsonrpc":"2.0","#), None);
    }

    #[tokio::test]
    async fn probe_reports_unreachable_host() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(!probe(&format!("http://{addr}"), Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn connect_to_unreachable_host_fails() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let options = ChannelOptions {
            max_retries: 0,
            ..ChannelOptions::default()
        };
        let result = SseClient::connect(&format!("http://{addr}"), options).await;
        assert!(matches!(result, Err(Error::Http(_))));
    }

    #[tokio::test]
    async fn round_trip_over_sse() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = crate::sse::sse_router(Arc::new(crate::server::tests::dispatcher()));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let base = format!("http://{addr}");
        assert!(probe(&base, PROBE_TIMEOUT).await);

        let client = SseClient::connect(&base, ChannelOptions::default()).await.unwrap();
        assert!(matches!(
            client.call_tool("echo", None).await,
            Err(Error::NotInitialized)
        ));

        client.initialize().await.unwrap();
        assert_eq!(client.server_info().await.unwrap().server_info.name, "echo");
        assert_eq!(client.tools().await[0].name, "echo");

        let result = client
            .call_tool("echo", Some(serde_json::json!({"text": "over the wire"})))
            .await
            .unwrap();
        assert_eq!(result.joined_text(), "over the wire");

        let err = client.call_tool("missing", None).await.unwrap_err();
        assert!(matches!(err, Error::ToolCallFailed(msg) if msg.contains("missing")));
        assert!(client.is_connected());
    }

    /// Answers every call after a delay.
    struct Slow(Duration);

    impl crate::server::ToolProvider for Slow {
        fn tools(&self) -> Vec<Tool> {
            vec![Tool {
                name: "slow".to_string(),
                description: None,
                input_schema: serde_json::json!({"type": "object"}),
            }]
        }

        async fn call(&self, _name: &str, _arguments: Option<Value>) -> CallToolResult {
            tokio::time::sleep(self.0).await;
            CallToolResult::text("done")
        }
    }

    #[tokio::test]
    async fn slow_tool_is_bounded_by_read_timeout_only() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let dispatcher = crate::server::Dispatcher::new(
            Slow(Duration::from_millis(400)),
            crate::protocol::ServerInfo {
                name: "slow".to_string(),
                version: None,
            },
        );
        let router = crate::sse::sse_router(Arc::new(dispatcher));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        // The POST must come back long before the tool finishes.
        let options = ChannelOptions {
            write_timeout: Duration::from_millis(100),
            read_timeout: Duration::from_secs(3),
            ..ChannelOptions::default()
        };
        let client = SseClient::connect(&format!("http://{addr}"), options).await.unwrap();
        client.initialize().await.unwrap();

        let result = client.call_tool("slow", None).await.unwrap();
        assert_eq!(result.joined_text(), "done");
    }
}
