//! SRC-PORT and DST-PORT rules.

use std::ops::RangeInclusive;

use super::{Rule, RuleType};
use crate::error::{Error, Result};
use crate::metadata::Metadata;

/// Matches a single port or an inclusive `lo-hi` range.
#[derive(Debug, Clone)]
pub struct Port {
    range: RangeInclusive<u16>,
    payload: String,
    adapter: String,
    source: bool,
}

impl Port {
    pub fn new(payload: &str, adapter: impl Into<String>, source: bool) -> Result<Self> {
        let range = parse_range(payload)
            .ok_or_else(|| Error::parse("", format!("invalid port `{payload}`")))?;

        Ok(Self {
            range,
            payload: payload.to_string(),
            adapter: adapter.into(),
            source,
        })
    }
}

fn parse_range(payload: &str) -> Option<RangeInclusive<u16>> {
    match payload.split_once('-') {
        Some((lo, hi)) => {
            let lo: u16 = lo.trim().parse().ok()?;
            let hi: u16 = hi.trim().parse().ok()?;
            (lo <= hi).then_some(lo..=hi)
        }
        None => {
            let port: u16 = payload.parse().ok()?;
            Some(port..=port)
        }
    }
}

impl Rule for Port {
    fn rule_type(&self) -> RuleType {
        if self.source {
            RuleType::SrcPort
        } else {
            RuleType::DstPort
        }
    }

    fn matches(&self, metadata: &Metadata) -> bool {
        let port = if self.source {
            metadata.src_port
        } else {
            metadata.dst_port
        };
        self.range.contains(&port)
    }

    fn adapter(&self) -> &str {
        &self.adapter
    }

    fn payload(&self) -> &str {
        &self.payload
    }

    fn no_resolve_ip(&self) -> bool {
        true
    }
}
