//! Parley MCP server over stdio.
//!
//! Set `PARLEY_BASE_URL` (and optionally `PARLEY_API_TOKEN`) to forward all
//! tool calls to a remote parley instance instead of executing locally. Set
//! `PARLEY_PORT` to also serve inbound tool calls over HTTP, making this
//! process the remote end for other instances.

use anyhow::Result;
use parley_engine::DeliberationStore;
use parley_mcp::{http, ParleyServer, ProxyClient, ProxyConfig};
use rmcp::ServiceExt;
use tokio::io::{stdin, stdout};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("parley_mcp=info".parse()?)
                .add_directive("parley_engine=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ProxyConfig::from_env()?;
    let proxy = |role: &str| -> Result<Option<ProxyClient>> {
        match &config.base_url {
            Some(base_url) => {
                tracing::info!(url = %base_url, role, "Forwarding tool calls to remote server");
                Ok(Some(ProxyClient::new(
                    base_url.clone(),
                    config.api_token.clone(),
                )?))
            }
            None => Ok(None),
        }
    };

    let store = DeliberationStore::new().shared();

    if let Some(port) = config.port {
        let listener = ParleyServer::new(store.clone(), proxy("http")?);
        let api_token = config.api_token.clone();
        tokio::spawn(async move {
            if let Err(error) = http::serve(listener, port, api_token).await {
                tracing::error!(%error, "HTTP listener failed");
            }
        });
    }

    let server = ParleyServer::new(store, proxy("stdio")?);
    let transport = (stdin(), stdout());
    let service = server.serve(transport).await?;
    tracing::info!("Parley MCP server running on stdio");

    service.waiting().await?;

    Ok(())
}
