//! Host name rules: exact, suffix and keyword.
//!
//! Hosts are compared ASCII case-insensitively; payloads are lowered once at
//! construction.

use super::{Rule, RuleType};
use crate::metadata::Metadata;

/// DOMAIN: exact host match.
#[derive(Debug, Clone)]
pub struct Domain {
    domain: String,
    adapter: String,
}

impl Domain {
    pub fn new(domain: &str, adapter: impl Into<String>) -> Self {
        Self {
            domain: domain.to_ascii_lowercase(),
            adapter: adapter.into(),
        }
    }
}

impl Rule for Domain {
    fn rule_type(&self) -> RuleType {
        RuleType::Domain
    }

    fn matches(&self, metadata: &Metadata) -> bool {
        metadata.host.eq_ignore_ascii_case(&self.domain)
    }

    fn adapter(&self) -> &str {
        &self.adapter
    }

    fn payload(&self) -> &str {
        &self.domain
    }

    fn no_resolve_ip(&self) -> bool {
        true
    }
}

/// DOMAIN-SUFFIX: the host itself or any subdomain of it.
#[derive(Debug, Clone)]
pub struct DomainSuffix {
    suffix: String,
    adapter: String,
}

impl DomainSuffix {
    pub fn new(suffix: &str, adapter: impl Into<String>) -> Self {
        Self {
            suffix: suffix.trim_start_matches('.').to_ascii_lowercase(),
            adapter: adapter.into(),
        }
    }
}

impl Rule for DomainSuffix {
    fn rule_type(&self) -> RuleType {
        RuleType::DomainSuffix
    }

    fn matches(&self, metadata: &Metadata) -> bool {
        let host = metadata.host.as_bytes();
        let suffix = self.suffix.as_bytes();

        if host.len() < suffix.len() || suffix.is_empty() {
            return false;
        }
        let split = host.len() - suffix.len();
        if !host[split..].eq_ignore_ascii_case(suffix) {
            return false;
        }
        // Label boundary: "notexample.com" must not match "example.com".
        split == 0 || host[split - 1] == b'.'
    }

    fn adapter(&self) -> &str {
        &self.adapter
    }

    fn payload(&self) -> &str {
        &self.suffix
    }

    fn no_resolve_ip(&self) -> bool {
        true
    }
}

/// DOMAIN-KEYWORD: substring of the host.
#[derive(Debug, Clone)]
pub struct DomainKeyword {
    keyword: String,
    adapter: String,
}

impl DomainKeyword {
    pub fn new(keyword: &str, adapter: impl Into<String>) -> Self {
        Self {
            keyword: keyword.to_ascii_lowercase(),
            adapter: adapter.into(),
        }
    }
}

impl Rule for DomainKeyword {
    fn rule_type(&self) -> RuleType {
        RuleType::DomainKeyword
    }

    fn matches(&self, metadata: &Metadata) -> bool {
        !metadata.host.is_empty() && metadata.host.to_ascii_lowercase().contains(&self.keyword)
    }

    fn adapter(&self) -> &str {
        &self.adapter
    }

    fn payload(&self) -> &str {
        &self.keyword
    }

    fn no_resolve_ip(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(h: &str) -> Metadata {
        Metadata::for_host(h, 443)
    }

    #[test]
    fn test_domain_exact() {
        let rule = Domain::new("API.example.com", "Proxy");
        assert!(rule.matches(&host("api.example.com")));
        assert!(rule.matches(&host("API.EXAMPLE.COM")));
        assert!(!rule.matches(&host("example.com")));
        assert!(!rule.matches(&host("x.api.example.com")));
        assert_eq!(rule.payload(), "api.example.com");
    }

    #[test]
    fn test_domain_suffix_boundaries() {
        let rule = DomainSuffix::new("example.com", "A");
        assert!(rule.matches(&host("example.com")));
        assert!(rule.matches(&host("foo.example.com")));
        assert!(rule.matches(&host("a.b.EXAMPLE.com")));
        assert!(!rule.matches(&host("notexample.com")));
        assert!(!rule.matches(&host("com")));
        assert!(!rule.matches(&host("")));
    }

    #[test]
    fn test_domain_suffix_leading_dot() {
        let rule = DomainSuffix::new(".apple.com", "A");
        assert_eq!(rule.payload(), "apple.com");
        assert!(rule.matches(&host("store.apple.com")));
    }

    #[test]
    fn test_domain_keyword() {
        let rule = DomainKeyword::new("google", "A");
        assert!(rule.matches(&host("www.google.com")));
        assert!(rule.matches(&host("GOOGLE.co.jp")));
        assert!(!rule.matches(&host("www.apple.com")));
        assert!(!rule.matches(&Metadata::default()));
    }
}
