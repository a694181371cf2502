//! GEOIP rule and the country lookup it depends on.
//!
//! # Design Decisions
//! - Lookup sits behind `GeoIpLookup` so a database reader can be plugged in
//!   without touching the rule; `CidrGeoIp` is the built-in table form
//! - Country codes compare case-insensitively and are stored uppercase
//! - `LAN` is a pseudo-country covering private, loopback and link-local space

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use ipnet::IpNet;

use super::{Rule, RuleType};
use crate::error::{Error, Result};
use crate::metadata::Metadata;

/// Pseudo-code matching non-routable addresses.
pub const LAN: &str = "LAN";

/// Maps an address to an ISO country code.
pub trait GeoIpLookup: Send + Sync + fmt::Debug {
    fn country_code(&self, ip: IpAddr) -> Option<String>;
}

/// Country table built from `(cidr, code)` entries. First containing network wins.
#[derive(Debug, Clone, Default)]
pub struct CidrGeoIp {
    entries: Vec<(IpNet, String)>,
}

impl CidrGeoIp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, cidr: &str, code: &str) -> Result<()> {
        let net: IpNet = cidr
            .parse()
            .map_err(|e| Error::parse(format!("geoip {cidr}"), e))?;
        self.entries.push((net, code.to_ascii_uppercase()));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl GeoIpLookup for CidrGeoIp {
    fn country_code(&self, ip: IpAddr) -> Option<String> {
        self.entries
            .iter()
            .find(|(net, _)| net.contains(&ip))
            .map(|(_, code)| code.clone())
    }
}

fn is_lan(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            let seg = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (seg & 0xfe00) == 0xfc00 // unique local
                || (seg & 0xffc0) == 0xfe80 // link local
        }
    }
}

/// Matches destinations located in one country.
#[derive(Debug, Clone)]
pub struct GeoIp {
    country: String,
    adapter: String,
    no_resolve: bool,
    lookup: Option<Arc<dyn GeoIpLookup>>,
}

impl GeoIp {
    pub fn new(
        country: &str,
        adapter: impl Into<String>,
        no_resolve: bool,
        lookup: Option<Arc<dyn GeoIpLookup>>,
    ) -> Self {
        Self {
            country: country.to_ascii_uppercase(),
            adapter: adapter.into(),
            no_resolve,
            lookup,
        }
    }
}

impl Rule for GeoIp {
    fn rule_type(&self) -> RuleType {
        RuleType::GeoIp
    }

    fn matches(&self, metadata: &Metadata) -> bool {
        let Some(ip) = metadata.resolved_ip() else {
            return false;
        };

        if self.country == LAN {
            return is_lan(ip);
        }

        self.lookup
            .as_ref()
            .and_then(|lookup| lookup.country_code(ip))
            .is_some_and(|code| code.eq_ignore_ascii_case(&self.country))
    }

    fn adapter(&self) -> &str {
        &self.adapter
    }

    fn payload(&self) -> &str {
        &self.country
    }

    fn no_resolve_ip(&self) -> bool {
        self.no_resolve
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn table() -> Arc<dyn GeoIpLookup> {
        let mut db = CidrGeoIp::new();
        db.insert("1.0.1.0/24", "cn").unwrap();
        db.insert("8.8.8.0/24", "US").unwrap();
        Arc::new(db)
    }

    fn to(a: u8, b: u8, c: u8, d: u8) -> Metadata {
        Metadata::for_ip(IpAddr::V4(Ipv4Addr::new(a, b, c, d)), 443)
    }

    #[test]
    fn test_country_match() {
        let rule = GeoIp::new("CN", "Direct", false, Some(table()));
        assert!(rule.matches(&to(1, 0, 1, 7)));
        assert!(!rule.matches(&to(8, 8, 8, 8)));
        assert!(!rule.matches(&Metadata::for_host("example.cn", 443)));
    }

    #[test]
    fn test_lowercase_country_in_rule() {
        let rule = GeoIp::new("us", "Proxy", true, Some(table()));
        assert_eq!(rule.payload(), "US");
        assert!(rule.matches(&to(8, 8, 8, 8)));
        assert!(rule.no_resolve_ip());
    }

    #[test]
    fn test_lan_without_database() {
        let rule = GeoIp::new("LAN", "Direct", false, None);
        assert!(rule.matches(&to(192, 168, 1, 1)));
        assert!(rule.matches(&to(127, 0, 0, 1)));
        assert!(!rule.matches(&to(8, 8, 8, 8)));
    }

    #[test]
    fn test_no_database_never_matches() {
        let rule = GeoIp::new("CN", "Direct", false, None);
        assert!(!rule.matches(&to(1, 0, 1, 7)));
    }
}
