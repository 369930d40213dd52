//! HTTP listener serving forwarded tool calls.
//!
//! Exposes the same JSON-RPC `tools/call` surface the forwarding
//! [`ProxyClient`](crate::proxy::ProxyClient) speaks, so one parley process
//! can act as the remote end for others. Runs alongside the stdio transport
//! when `PARLEY_PORT` is set; inbound requests must carry the configured
//! bearer token.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::server::ParleyServer;

struct ListenerState {
    server: ParleyServer,
    api_token: Option<String>,
}

/// Build the listener router over a server, requiring `api_token` on every
/// request when one is given.
pub fn router(server: ParleyServer, api_token: Option<String>) -> Router {
    let state = Arc::new(ListenerState { server, api_token });
    Router::new().route("/", post(handle)).with_state(state)
}

/// Bind the listener on `port` and serve until the process exits.
pub async fn serve(
    server: ParleyServer,
    port: u16,
    api_token: Option<String>,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Parley MCP HTTP server listening");
    axum::serve(listener, router(server, api_token)).await?;
    Ok(())
}

async fn handle(
    State(state): State<Arc<ListenerState>>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers, state.api_token.as_deref()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized" })),
        );
    }

    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let method = request
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if method != "tools/call" {
        return (
            StatusCode::OK,
            Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": format!("Method not found: {method}") },
            })),
        );
    }

    let name = request
        .pointer("/params/name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let arguments = request
        .pointer("/params/arguments")
        .cloned()
        .unwrap_or_else(|| json!({}));

    tracing::debug!(tool = %name, "Handling inbound tool call");
    let (text, is_error) = match state.server.dispatch_tool(&name, arguments).await {
        Ok(text) => (text, false),
        Err(text) => (text, true),
    };
    (
        StatusCode::OK,
        Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "content": [{ "type": "text", "text": text }],
                "isError": is_error,
            },
        })),
    )
}

fn authorized(headers: &HeaderMap, expected: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    let Some(auth) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    else {
        return false;
    };
    match auth.split_once(' ') {
        Some(("Bearer", token)) => token == expected,
        _ => false,
    }
}
