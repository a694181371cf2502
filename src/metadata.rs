//! Connection metadata consumed by rule matching.

use std::net::IpAddr;

/// What the dispatcher knows about one connection when it asks for a route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Destination host name, empty when the client dialled an IP.
    pub host: String,
    /// Destination IP, either dialled directly or filled in by a resolver.
    pub dst_ip: Option<IpAddr>,
    pub dst_port: u16,
    pub src_ip: Option<IpAddr>,
    pub src_port: u16,
}

impl Metadata {
    /// Metadata for a connection to a named host.
    pub fn for_host(host: impl Into<String>, dst_port: u16) -> Self {
        Self {
            host: host.into(),
            dst_port,
            ..Default::default()
        }
    }

    /// Metadata for a connection dialled straight at an address.
    pub fn for_ip(dst_ip: IpAddr, dst_port: u16) -> Self {
        Self {
            dst_ip: Some(dst_ip),
            dst_port,
            ..Default::default()
        }
    }

    pub fn with_source(mut self, src_ip: IpAddr, src_port: u16) -> Self {
        self.src_ip = Some(src_ip);
        self.src_port = src_port;
        self
    }

    /// The destination address used by IP and GeoIP rules.
    pub fn resolved_ip(&self) -> Option<IpAddr> {
        self.dst_ip
    }
}
