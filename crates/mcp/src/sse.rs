//! HTTP + server-sent events transport (server side).
//!
//! A client opens `GET /sse` and receives an `endpoint` event naming its
//! private `POST /messages?session_id=...` URL. Requests posted there are
//! answered with `202 Accepted`; the JSON-RPC response travels back as a
//! `message` event on the client's stream.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use futures::Stream;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::protocol::JsonRpcRequest;
use crate::server::{Dispatcher, ToolProvider};

/// Path of the event stream (the handshake endpoint).
pub const SSE_PATH: &str = "/sse";

/// Path clients post JSON-RPC messages to.
pub const MESSAGES_PATH: &str = "/messages";

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

type Sessions = Mutex<HashMap<Uuid, mpsc::UnboundedSender<String>>>;

struct SseState<P> {
    dispatcher: Arc<Dispatcher<P>>,
    sessions: Sessions,
}

impl<P> SseState<P> {
    fn sessions(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, mpsc::UnboundedSender<String>>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Removes a session once its event stream is dropped.
struct SessionGuard<P> {
    id: Uuid,
    state: Arc<SseState<P>>,
}

impl<P> Drop for SessionGuard<P> {
    fn drop(&mut self) {
        self.state.sessions().remove(&self.id);
        info!(session_id = %self.id, "SSE stream closed");
    }
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    session_id: Uuid,
}

/// Build the axum router for the SSE transport.
pub fn sse_router<P: ToolProvider>(dispatcher: Arc<Dispatcher<P>>) -> Router {
    let state = Arc::new(SseState {
        dispatcher,
        sessions: Mutex::new(HashMap::new()),
    });

    Router::new()
        .route(SSE_PATH, get(open_stream::<P>))
        .route(MESSAGES_PATH, post(post_message::<P>))
        .route("/messages/", post(post_message::<P>))
        .with_state(state)
}

/// Bind `addr` and serve the SSE transport until the process exits.
pub async fn serve_sse<P: ToolProvider>(dispatcher: Arc<Dispatcher<P>>, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("SSE transport listening on http://{}{SSE_PATH}", listener.local_addr()?);
    axum::serve(listener, sse_router(dispatcher)).await?;
    Ok(())
}

async fn open_stream<P: ToolProvider>(
    State(state): State<Arc<SseState<P>>>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.sessions().insert(id, tx);
    info!(session_id = %id, "SSE stream opened");

    let guard = SessionGuard { id, state };
    let endpoint = format!("{MESSAGES_PATH}?session_id={id}");

    let stream = async_stream::stream! {
        let _guard = guard;
        yield Ok::<_, Infallible>(Event::default().event("endpoint").data(endpoint));
        while let Some(message) = rx.recv().await {
            yield Ok(Event::default().event("message").data(message));
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keepalive"),
    )
}

async fn post_message<P: ToolProvider>(
    State(state): State<Arc<SseState<P>>>,
    Query(query): Query<SessionQuery>,
    body: String,
) -> StatusCode {
    let Some(tx) = state.sessions().get(&query.session_id).cloned() else {
        warn!(session_id = %query.session_id, "message for unknown session");
        return StatusCode::NOT_FOUND;
    };

    let request: JsonRpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(session_id = %query.session_id, "invalid JSON-RPC: {e}");
            return StatusCode::BAD_REQUEST;
        }
    };

    // Answer the POST now; the response goes out on the event stream.
    let session_id = query.session_id;
    tokio::spawn(async move {
        let Some(response) = state.dispatcher.handle(request).await else {
            return;
        };
        let json = match serde_json::to_string(&response) {
            Ok(json) => json,
            Err(e) => {
                warn!(%session_id, "failed to serialize response: {e}");
                return;
            }
        };
        if tx.send(json).is_err() {
            debug!(%session_id, "stream closed before the response was ready");
            state.sessions().remove(&session_id);
        }
    });

    StatusCode::ACCEPTED
}
