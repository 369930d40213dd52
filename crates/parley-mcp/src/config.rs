//! Environment-driven configuration for proxy and listener modes.

use anyhow::bail;

/// Remote-forwarding and HTTP-listener configuration.
///
/// When `base_url` is set the MCP server forwards every tool call to a
/// remote parley instance instead of executing locally. When `port` is set
/// an HTTP listener serves inbound tool calls alongside stdio.
#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    /// Forward all tool calls to the remote MCP server at this URL.
    pub base_url: Option<String>,
    /// Serve tool calls over HTTP on this port, alongside stdio.
    pub port: Option<u16>,
    /// Auth token, sent as a bearer token on forwarded calls and required
    /// on inbound listener calls.
    pub api_token: Option<String>,
}

impl ProxyConfig {
    /// Read configuration from `PARLEY_BASE_URL`, `PARLEY_PORT`, and
    /// `PARLEY_API_TOKEN`.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            base_url: std::env::var("PARLEY_BASE_URL").ok(),
            port: parse_port(std::env::var("PARLEY_PORT").ok())?,
            api_token: std::env::var("PARLEY_API_TOKEN").ok(),
        })
    }
}

fn parse_port(raw: Option<String>) -> anyhow::Result<Option<u16>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.parse::<u16>() {
        Ok(port) if port >= 1 => Ok(Some(port)),
        _ => bail!("Invalid PARLEY_PORT: {raw} (must be 1-65535)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_port_absent() {
        assert_eq!(parse_port(None).unwrap(), None);
    }

    #[test]
    fn test_parse_port_in_range() {
        assert_eq!(parse_port(Some("8080".into())).unwrap(), Some(8080));
        assert_eq!(parse_port(Some("65535".into())).unwrap(), Some(65535));
    }

    #[test]
    fn test_parse_port_rejects_out_of_range() {
        for raw in ["0", "65536", "-1", "http", ""] {
            let err = parse_port(Some(raw.into())).unwrap_err();
            assert!(err.to_string().contains("Invalid PARLEY_PORT"), "{raw}");
        }
    }
}
