//! IP-CIDR and SRC-IP-CIDR rules.

use std::net::IpAddr;

use ipnet::IpNet;

use super::{Rule, RuleType};
use crate::error::{Error, Result};
use crate::metadata::Metadata;

/// Matches when the destination (or source) address falls inside a network.
#[derive(Debug, Clone)]
pub struct IpCidr {
    net: IpNet,
    payload: String,
    adapter: String,
    source: bool,
    no_resolve: bool,
}

impl IpCidr {
    /// Destination-scoped rule.
    pub fn new(cidr: &str, adapter: impl Into<String>, no_resolve: bool) -> Result<Self> {
        let net: IpNet = cidr
            .parse()
            .map_err(|e| Error::parse("", format!("invalid CIDR `{cidr}`: {e}")))?;

        Ok(Self {
            net,
            payload: cidr.to_string(),
            adapter: adapter.into(),
            source: false,
            no_resolve,
        })
    }

    /// Source-scoped rule. The source address is always known, so it never
    /// needs the destination resolved.
    pub fn source(cidr: &str, adapter: impl Into<String>) -> Result<Self> {
        let mut rule = Self::new(cidr, adapter, true)?;
        rule.source = true;
        Ok(rule)
    }

    pub fn net(&self) -> IpNet {
        self.net
    }

    fn address(&self, metadata: &Metadata) -> Option<IpAddr> {
        if self.source {
            metadata.src_ip
        } else {
            metadata.resolved_ip()
        }
    }
}

impl Rule for IpCidr {
    fn rule_type(&self) -> RuleType {
        if self.source {
            RuleType::SrcIpCidr
        } else {
            RuleType::IpCidr
        }
    }

    fn matches(&self, metadata: &Metadata) -> bool {
        self.address(metadata)
            .is_some_and(|ip| self.net.contains(&ip))
    }

    fn adapter(&self) -> &str {
        &self.adapter
    }

    fn payload(&self) -> &str {
        &self.payload
    }

    fn no_resolve_ip(&self) -> bool {
        self.no_resolve
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn dst(ip: IpAddr) -> Metadata {
        Metadata::for_ip(ip, 443)
    }

    #[test]
    fn test_v4_contains() {
        let rule = IpCidr::new("10.0.0.0/8", "Proxy", true).unwrap();
        assert!(rule.matches(&dst(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)))));
        assert!(!rule.matches(&dst(IpAddr::V4(Ipv4Addr::new(11, 0, 0, 1)))));
        assert!(!rule.matches(&Metadata::for_host("example.com", 80)));
        assert!(rule.no_resolve_ip());
        assert_eq!(rule.rule_type(), RuleType::IpCidr);
    }

    #[test]
    fn test_v6_contains() {
        let rule = IpCidr::new("2001:db8::/32", "Proxy", false).unwrap();
        assert!(rule.matches(&dst(IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)))));
        assert!(!rule.matches(&dst(IpAddr::V6(Ipv6Addr::LOCALHOST))));
        assert!(!rule.no_resolve_ip());
    }

    #[test]
    fn test_source_scope() {
        let rule = IpCidr::source("192.168.0.0/16", "LAN").unwrap();
        let lan = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20));
        let wan = IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8));

        assert!(rule.matches(&dst(wan).with_source(lan, 50000)));
        assert!(!rule.matches(&dst(lan).with_source(wan, 50000)));
        assert_eq!(rule.rule_type(), RuleType::SrcIpCidr);
        assert!(rule.no_resolve_ip());
    }

    #[test]
    fn test_invalid_cidr() {
        let err = IpCidr::new("10.0.0.0/33", "Proxy", false).unwrap_err();
        assert!(err.is_parse());
    }
}
