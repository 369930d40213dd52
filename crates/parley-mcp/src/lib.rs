//! Plumbing around the parley decision-cycle engine:
//! - MCP tool front-end over stdio ([`server`])
//! - remote forwarding of tool calls with bearer-token auth ([`proxy`])
//! - HTTP listener serving those forwarded calls ([`http`])
//! - machine definition file loading ([`loader`])
//! - environment-driven proxy configuration ([`config`])

pub mod config;
pub mod http;
pub mod loader;
pub mod proxy;
pub mod server;

pub use config::ProxyConfig;
pub use loader::load_machine;
pub use proxy::ProxyClient;
pub use server::ParleyServer;
