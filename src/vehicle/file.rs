//! Local file vehicle.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{Vehicle, VehicleType};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct FileVehicle {
    path: PathBuf,
}

impl FileVehicle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Vehicle for FileVehicle {
    fn kind(&self) -> VehicleType {
        VehicleType::File
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Vec<u8>> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|e| Error::Fetch(format!("read {}: {e}", self.path.display())))
    }
}
