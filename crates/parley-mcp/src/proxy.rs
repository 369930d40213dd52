//! HTTP client for forwarding tool calls to a remote parley MCP server.
//!
//! Forwarded calls are JSON-RPC `tools/call` requests over plain HTTP POST,
//! authenticated with a bearer token when one is configured. The remote
//! server's semantics are identical to local execution, so forwarding is
//! transparent to callers.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, bail, Context};
use serde_json::{json, Value};

pub struct ProxyClient {
    http: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
    next_id: AtomicU64,
}

impl ProxyClient {
    pub fn new(base_url: String, api_token: Option<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            base_url,
            api_token,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Forward one tool call and return the remote result's text content.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> anyhow::Result<String> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments },
        });

        tracing::debug!(tool = name, %id, url = %self.base_url, "Forwarding tool call");

        let mut request = self.http.post(&self.base_url).json(&body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }
        let response: Value = request
            .send()
            .await
            .with_context(|| format!("Failed to reach remote server at {}", self.base_url))?
            .error_for_status()
            .context("Remote server returned an HTTP error")?
            .json()
            .await
            .context("Failed to parse remote response")?;

        if let Some(error) = response.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown remote error");
            bail!("Remote call failed: {message}");
        }

        let result = response
            .get("result")
            .ok_or_else(|| anyhow!("Remote response has no result"))?;
        let text = first_text_content(result)
            .ok_or_else(|| anyhow!("No text content in response"))?;

        if result.get("isError").and_then(Value::as_bool) == Some(true) {
            bail!("{text}");
        }
        Ok(text.to_string())
    }
}

fn first_text_content(result: &Value) -> Option<&str> {
    result
        .get("content")?
        .as_array()?
        .iter()
        .find(|c| c.get("type").and_then(Value::as_str) == Some("text"))?
        .get("text")?
        .as_str()
}
