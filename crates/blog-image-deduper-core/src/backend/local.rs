use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use super::{public_object_url, ObjectStore, StoredObject};
use crate::error::{Error, Result};

/// A bucket mirrored as a directory on disk
pub struct LocalObjectStore {
    root: PathBuf,
    base_url: String,
    bucket: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, base_url: &str, bucket: &str) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
        }
    }

    /// Resolve a bucket path below the root, refusing anything that escapes it
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(Error::InvalidRequest(format!(
                "path escapes the bucket: {}",
                path
            )));
        }
        Ok(self.root.join(relative))
    }
}

fn created_at(metadata: &std::fs::Metadata) -> Option<DateTime<Utc>> {
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn public_url(&self, path: &str) -> String {
        public_object_url(&self.base_url, &self.bucket, path)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>> {
        let prefix = prefix.trim_matches('/');
        let directory = if prefix.is_empty() {
            self.root.clone()
        } else {
            self.resolve(prefix)?
        };

        if !directory.exists() {
            return Err(Error::FileNotFound(directory));
        }

        let mut objects = Vec::new();
        for entry in WalkDir::new(&directory)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let metadata = entry.metadata().map_err(io::Error::from)?;
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };

            objects.push(StoredObject {
                path,
                name,
                size: Some(metadata.len()),
                created_at: created_at(&metadata),
            });
        }

        // Oldest first, like the storage listing
        objects.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.path.cmp(&b.path)));
        Ok(objects)
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.resolve(path)?;
        match tokio::fs::read(&full_path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::ObjectNotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, paths: &[String]) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for path in paths {
            let full_path = self.resolve(path)?;
            match tokio::fs::remove_file(&full_path).await {
                Ok(()) => removed.push(path.clone()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }
}
