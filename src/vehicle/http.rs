//! Remote HTTP(S) vehicle.
//!
//! Downloads are bounded by the client timeout; the fetcher decides when the
//! bytes are persisted to `path()`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use super::{Vehicle, VehicleType};
use crate::error::{Error, Result};

/// Default download timeout for provider payloads.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpVehicle {
    url: String,
    path: PathBuf,
    client: reqwest::Client,
}

impl HttpVehicle {
    /// Create a vehicle for `url`, caching payloads at `path`.
    pub fn new(url: impl Into<String>, path: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Fetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            path: path.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Vehicle for HttpVehicle {
    fn kind(&self) -> VehicleType {
        VehicleType::Http
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Vec<u8>> {
        tracing::debug!(url = %self.url, "Fetching remote provider");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("GET {}: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("GET {}: HTTP {}", self.url, status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Fetch(format!("reading body of {}: {e}", self.url)))?;

        tracing::debug!(url = %self.url, bytes = body.len(), "Fetched remote provider");
        Ok(body.to_vec())
    }
}
