//! Rule engine: typed matchers built from textual rule definitions.
//!
//! # Data Flow
//! ```text
//! "DOMAIN-SUFFIX,example.com,Proxy"
//!     → parser.rs (split, trim, dispatch on keyword)
//!     → one of domain.rs / ip.rs / port.rs / geoip.rs / fallback.rs / rule_set.rs
//!     → Arc<dyn Rule> (immutable)
//!
//! Per connection:
//!     routing::Router walks the ordered list, first `matches()` wins
//! ```
//!
//! # Design Decisions
//! - Rules never change after construction; providers swap whole lists
//! - Keywords are case-sensitive, payload fields are trimmed
//! - `no_resolve_ip()` is answered per rule, never blended per list

pub mod domain;
pub mod fallback;
pub mod geoip;
pub mod ip;
pub mod parser;
pub mod port;
pub mod rule_set;

pub use domain::{Domain, DomainKeyword, DomainSuffix};
pub use fallback::Match;
pub use geoip::{CidrGeoIp, GeoIp, GeoIpLookup};
pub use ip::IpCidr;
pub use parser::RuleParser;
pub use port::Port;
pub use rule_set::RuleSet;

use std::fmt;

use serde::Serialize;

use crate::metadata::Metadata;

/// Rule variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleType {
    Domain,
    DomainSuffix,
    DomainKeyword,
    GeoIp,
    IpCidr,
    RuleSet,
    SrcIpCidr,
    SrcPort,
    DstPort,
    Match,
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleType::Domain => "Domain",
            RuleType::DomainSuffix => "DomainSuffix",
            RuleType::DomainKeyword => "DomainKeyword",
            RuleType::GeoIp => "GeoIP",
            RuleType::IpCidr => "IPCIDR",
            RuleType::RuleSet => "RuleSet",
            RuleType::SrcIpCidr => "SrcIPCIDR",
            RuleType::SrcPort => "SrcPort",
            RuleType::DstPort => "DstPort",
            RuleType::Match => "Match",
        };
        f.write_str(name)
    }
}

impl Serialize for RuleType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A single routing rule.
pub trait Rule: Send + Sync + fmt::Debug {
    fn rule_type(&self) -> RuleType;

    /// Returns true if the connection matches this rule.
    fn matches(&self, metadata: &Metadata) -> bool;

    /// Policy the connection is routed to on match.
    fn adapter(&self) -> &str;

    fn payload(&self) -> &str;

    /// True when the rule can be evaluated without resolving the destination host.
    fn no_resolve_ip(&self) -> bool;

    /// Downcast hook for rules backed by a live provider.
    fn as_rule_set(&self) -> Option<&RuleSet> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_type_names() {
        assert_eq!(RuleType::GeoIp.to_string(), "GeoIP");
        assert_eq!(RuleType::IpCidr.to_string(), "IPCIDR");
        assert_eq!(
            serde_json::to_string(&RuleType::SrcPort).unwrap(),
            "\"SrcPort\""
        );
    }
}
