//! Built-in proxy that knows its server address and nothing about its protocol.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::net::TcpStream;

use super::{Proxy, ProxyHealth, ProxyMapping, ProxyParser};
use crate::error::{Error, Result};

/// An upstream endpoint described by `name`, `type`, `server` and `port`.
#[derive(Debug)]
pub struct Endpoint {
    name: String,
    proxy_type: String,
    server: String,
    port: u16,
    health: ProxyHealth,
}

impl Endpoint {
    pub fn new(
        name: impl Into<String>,
        proxy_type: impl Into<String>,
        server: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            name: name.into(),
            proxy_type: proxy_type.into(),
            server: server.into(),
            port,
            health: ProxyHealth::default(),
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

#[async_trait]
impl Proxy for Endpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn proxy_type(&self) -> &str {
        &self.proxy_type
    }

    fn health(&self) -> &ProxyHealth {
        &self.health
    }

    /// Measures connection setup to the upstream server. The target URL is
    /// only meaningful to protocol-aware proxies.
    async fn url_test(&self, _url: &str) -> std::io::Result<Duration> {
        let start = Instant::now();
        let stream = TcpStream::connect((self.server.as_str(), self.port)).await?;
        let elapsed = start.elapsed();
        drop(stream);
        Ok(elapsed)
    }
}

/// Default `ProxyParser`: builds an `Endpoint` from each mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct EndpointParser;

impl ProxyParser for EndpointParser {
    fn parse_proxy(&self, index: usize, mapping: &ProxyMapping) -> Result<Arc<dyn Proxy>> {
        let location = format!("proxy {index}");

        let name = required_str(mapping, "name").map_err(|e| Error::parse(&location, e))?;
        let proxy_type = required_str(mapping, "type").map_err(|e| Error::parse(&location, e))?;
        let server = required_str(mapping, "server").map_err(|e| Error::parse(&location, e))?;
        let port = port_field(mapping).map_err(|e| Error::parse(&location, e))?;

        Ok(Arc::new(Endpoint::new(name, proxy_type, server, port)))
    }
}

fn required_str<'a>(mapping: &'a ProxyMapping, key: &str) -> std::result::Result<&'a str, String> {
    match mapping.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim()),
        Some(_) => Err(format!("`{key}` must be a non-empty string")),
        None => Err(format!("missing `{key}`")),
    }
}

fn port_field(mapping: &ProxyMapping) -> std::result::Result<u16, String> {
    let port = match mapping.get("port") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        Some(_) => None,
        None => return Err("missing `port`".to_string()),
    };

    port.filter(|p| (1..=u64::from(u16::MAX)).contains(p))
        .map(|p| p as u16)
        .ok_or_else(|| "`port` must be between 1 and 65535".to_string())
}
