//! Vehicles: where raw provider bytes come from.
//!
//! # Data Flow
//! ```text
//! FileVehicle  → tokio::fs::read(path)
//! HttpVehicle  → GET url (bounded by timeout)
//!                └→ path() names the local cache copy
//! ```
//!
//! # Design Decisions
//! - A vehicle's identity (kind + location) never changes after construction
//! - `path()` is always meaningful: the source file, or the cache file for HTTP
//! - Vehicles do not parse; they only hand bytes to the fetcher

mod file;
mod http;

pub use file::FileVehicle;
pub use http::{HttpVehicle, DEFAULT_TIMEOUT};

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Transport kind behind a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VehicleType {
    File,
    #[serde(rename = "HTTP")]
    Http,
    Compatible,
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VehicleType::File => write!(f, "File"),
            VehicleType::Http => write!(f, "HTTP"),
            VehicleType::Compatible => write!(f, "Compatible"),
        }
    }
}

/// A source of raw provider bytes.
#[async_trait]
pub trait Vehicle: Send + Sync + fmt::Debug {
    fn kind(&self) -> VehicleType;

    /// Local path of the payload: the file itself, or the cache for remote sources.
    fn path(&self) -> &Path;

    /// Fetch the current payload.
    async fn read(&self) -> Result<Vec<u8>>;
}

/// Write a payload next to its final location and rename it into place,
/// so a crash mid-write never leaves a truncated cache behind.
pub(crate) async fn write_cache(path: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    tokio::fs::write(&tmp, content).await?;
    tokio::fs::rename(&tmp, path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_type_names() {
        assert_eq!(VehicleType::File.to_string(), "File");
        assert_eq!(VehicleType::Http.to_string(), "HTTP");
        assert_eq!(
            serde_json::to_string(&VehicleType::Http).unwrap(),
            "\"HTTP\""
        );
    }

    #[tokio::test]
    async fn test_write_cache_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("hk.yaml");

        write_cache(&path, b"proxies: []").await.unwrap();
        write_cache(&path, b"proxies: [1]").await.unwrap();

        let content = tokio::fs::read(&path).await.unwrap();
        assert_eq!(content, b"proxies: [1]");
    }
}
