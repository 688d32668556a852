use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{PersistenceError, PersistenceResult};
use crate::types::ImageAsset;

/// Representation of a catalogued asset row (`image_assets`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAsset {
    /// ID in the database
    pub id: Option<i64>,

    /// File name as uploaded
    pub file_name: String,

    /// Path inside the bucket
    pub file_path: String,

    /// Public URL
    pub cdn_url: String,

    /// Content hash recorded at upload
    pub hash: Option<String>,

    /// Size in bytes
    pub size: Option<u64>,

    /// Upload timestamp (stored as unix timestamp)
    pub created: Option<i64>,
}

impl StoredAsset {
    /// Create a row from an asset; the asset must know its bucket path
    pub fn from_asset(asset: &ImageAsset) -> PersistenceResult<Self> {
        let file_path = asset.path.clone().ok_or_else(|| {
            PersistenceError::Path(
                PathBuf::from(&asset.url),
                "asset has no bucket path".to_string(),
            )
        })?;

        Ok(Self {
            id: None,
            file_name: asset.display_name().to_string(),
            file_path,
            cdn_url: asset.url.clone(),
            hash: asset.hash.clone(),
            size: asset.size,
            created: asset.created_at.as_ref().map(DateTime::timestamp),
        })
    }

    /// Convert to an ImageAsset
    pub fn to_image_asset(&self) -> ImageAsset {
        let mut asset = ImageAsset::new(self.file_path.clone(), self.cdn_url.clone());
        asset.id = self.id.map(|id| id.to_string());
        asset.name = self.file_name.clone();
        asset.hash = self.hash.clone();
        asset.size = self.size;
        asset.created_at = self.created.and_then(unix_timestamp_to_datetime);
        asset
    }
}

// Helper function to convert a unix timestamp to a UTC datetime
fn unix_timestamp_to_datetime(timestamp: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
}
