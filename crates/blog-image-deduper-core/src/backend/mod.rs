//! Collaborators the deduplication pipeline talks to.
//!
//! The pipeline never reaches for a global client: each backend is built once
//! from [`Config`] and handed to [`crate::ImageDeduper`] as trait objects, so
//! tests can swap in their own implementations.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::{Backend, Config};
use crate::error::{Error, Result};
use crate::persistence::SqliteStore;
use crate::types::{BlogPost, ImageAsset};

mod local;
mod supabase;

pub use local::LocalObjectStore;
pub use supabase::SupabaseClient;

/// An object returned by a storage listing
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    /// Path inside the bucket
    pub path: String,
    /// Last path segment
    pub name: String,
    pub size: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Blog posts that may reference images
#[async_trait]
pub trait BlogStore: Send + Sync {
    /// Posts whose `featured_image` or `content` contains any of `terms`.
    /// Callers narrow the result down to actual references.
    async fn find_mentioning(&self, terms: &[String]) -> Result<Vec<BlogPost>>;
}

/// Bucket holding the image objects
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> &str;

    /// Public URL of an object
    fn public_url(&self, path: &str) -> String;

    /// Objects directly inside `prefix` (non-recursive), oldest first
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>>;

    async fn download(&self, path: &str) -> Result<Vec<u8>>;

    /// Remove objects and return the paths that were actually removed.
    /// Paths that no longer exist are not an error.
    async fn remove(&self, paths: &[String]) -> Result<Vec<String>>;
}

/// Metadata rows describing uploaded assets (`image_assets`)
#[async_trait]
pub trait AssetCatalog: Send + Sync {
    /// Catalogued assets under `prefix`, with their stored hashes
    async fn assets(&self, prefix: &str) -> Result<Vec<ImageAsset>>;

    /// Drop the rows of removed objects, returning how many were deleted
    async fn forget(&self, paths: &[String]) -> Result<usize>;
}

/// The set of collaborators built from a configuration
#[derive(Clone)]
pub struct Backends {
    pub blog: Arc<dyn BlogStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub catalog: Option<Arc<dyn AssetCatalog>>,
}

/// Build the backends selected by `config`
pub fn connect(config: &Config) -> Result<Backends> {
    config.validate()?;

    match config.backend {
        Backend::Supabase => {
            let client = Arc::new(SupabaseClient::new(config)?);
            Ok(Backends {
                blog: client.clone(),
                objects: client.clone(),
                catalog: Some(client),
            })
        }
        Backend::Local => {
            let root = config
                .local_root
                .clone()
                .ok_or_else(|| Error::Configuration("local_root is required".into()))?;
            let db_path = config
                .database_path
                .clone()
                .ok_or_else(|| Error::Configuration("database_path is required".into()))?;

            let store = Arc::new(SqliteStore::open(&db_path)?);
            let base_url = if config.supabase_url.is_empty() {
                "http://localhost".to_string()
            } else {
                config.supabase_url.clone()
            };
            let objects = Arc::new(LocalObjectStore::new(root, &base_url, &config.bucket));

            Ok(Backends {
                blog: store.clone(),
                objects,
                catalog: Some(store),
            })
        }
    }
}

/// Public URL layout shared by Supabase and the local backend
pub(crate) fn public_object_url(base_url: &str, bucket: &str, path: &str) -> String {
    let encoded: Vec<String> = path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!(
        "{}/storage/v1/object/public/{}/{}",
        base_url.trim_end_matches('/'),
        bucket,
        encoded.join("/")
    )
}
