//! In-memory collaborators for unit tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::backend::{public_object_url, AssetCatalog, BlogStore, ObjectStore, StoredObject};
use crate::error::{Error, Result};
use crate::types::{parse_timestamp, BlogPost, ImageAsset};

pub const TEST_BASE_URL: &str = "https://test.supabase.co";
pub const TEST_BUCKET: &str = "blog-images";

/// Public URL of a path in the test bucket
pub fn public_url(path: &str) -> String {
    public_object_url(TEST_BASE_URL, TEST_BUCKET, path)
}

/// An asset stored in the test bucket, created on `created` (any supported layout)
pub fn image(path: &str, created: &str) -> ImageAsset {
    let mut asset = ImageAsset::new(path, public_url(path));
    asset.created_at = parse_timestamp(created);
    asset
}

/// A blog post with a featured image and content
pub fn post(id: &str, featured_image: Option<&str>, content: &str) -> BlogPost {
    BlogPost {
        id: id.to_string(),
        title: Some(format!("Post {}", id)),
        slug: Some(format!("post-{}", id)),
        featured_image: featured_image.map(str::to_string),
        content: Some(content.to_string()),
    }
}

#[derive(Clone)]
struct MemoryObject {
    bytes: Vec<u8>,
    created_at: Option<DateTime<Utc>>,
}

/// Object store keeping objects in a map and recording removals
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, MemoryObject>>,
    remove_calls: Mutex<Vec<Vec<String>>>,
    failing_removals: HashSet<String>,
    failing_downloads: HashSet<String>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, path: &str, bytes: &[u8], created: &str) -> Self {
        self.objects.lock().unwrap().insert(
            path.to_string(),
            MemoryObject {
                bytes: bytes.to_vec(),
                created_at: parse_timestamp(created),
            },
        );
        self
    }

    /// Make any removal touching `path` fail
    pub fn with_failing_removal(mut self, path: &str) -> Self {
        self.failing_removals.insert(path.to_string());
        self
    }

    /// Make downloads of `path` fail
    pub fn with_failing_download(mut self, path: &str) -> Self {
        self.failing_downloads.insert(path.to_string());
        self
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.lock().unwrap().contains_key(path)
    }

    pub fn remove_calls(&self) -> Vec<Vec<String>> {
        self.remove_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn bucket(&self) -> &str {
        TEST_BUCKET
    }

    fn public_url(&self, path: &str) -> String {
        public_url(path)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>> {
        let prefix = prefix.trim_matches('/');
        let mut objects: Vec<StoredObject> = self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(path, _)| {
                let parent = path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
                parent == prefix
            })
            .map(|(path, object)| StoredObject {
                path: path.clone(),
                name: path.rsplit('/').next().unwrap_or_default().to_string(),
                size: Some(object.bytes.len() as u64),
                created_at: object.created_at,
            })
            .collect();
        objects.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.path.cmp(&b.path)));
        Ok(objects)
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        if self.failing_downloads.contains(path) {
            return Err(Error::Storage {
                status: 500,
                message: "download failed".into(),
            });
        }
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .map(|object| object.bytes.clone())
            .ok_or_else(|| Error::ObjectNotFound(path.to_string()))
    }

    async fn remove(&self, paths: &[String]) -> Result<Vec<String>> {
        self.remove_calls.lock().unwrap().push(paths.to_vec());
        if let Some(path) = paths.iter().find(|p| self.failing_removals.contains(*p)) {
            return Err(Error::Storage {
                status: 500,
                message: format!("cannot remove {}", path),
            });
        }

        let mut objects = self.objects.lock().unwrap();
        Ok(paths
            .iter()
            .filter(|path| objects.remove(path.as_str()).is_some())
            .cloned()
            .collect())
    }
}

/// Blog store answering from a fixed list of posts
#[derive(Default)]
pub struct MemoryBlogStore {
    posts: Vec<BlogPost>,
    failing_urls: HashSet<String>,
    lookups: Mutex<Vec<Vec<String>>>,
}

impl MemoryBlogStore {
    pub fn new(posts: Vec<BlogPost>) -> Self {
        Self {
            posts,
            ..Default::default()
        }
    }

    /// Make lookups that search for `url` fail
    pub fn with_failing_url(mut self, url: &str) -> Self {
        self.failing_urls.insert(url.to_string());
        self
    }

    /// Search terms of every lookup, in call order
    pub fn lookups(&self) -> Vec<Vec<String>> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlogStore for MemoryBlogStore {
    async fn find_mentioning(&self, terms: &[String]) -> Result<Vec<BlogPost>> {
        self.lookups.lock().unwrap().push(terms.to_vec());
        if terms.iter().any(|term| self.failing_urls.contains(term)) {
            return Err(Error::BlogStore("connection reset by peer".into()));
        }
        let mentions = |field: Option<&str>| {
            field.is_some_and(|text| terms.iter().any(|term| text.contains(term.as_str())))
        };
        Ok(self
            .posts
            .iter()
            .filter(|post| {
                mentions(post.featured_image.as_deref()) || mentions(post.content.as_deref())
            })
            .cloned()
            .collect())
    }
}

/// Asset catalog recording forgotten paths
#[derive(Default)]
pub struct MemoryCatalog {
    assets: Vec<ImageAsset>,
    forgotten: Mutex<Vec<String>>,
    fail_forget: bool,
}

impl MemoryCatalog {
    pub fn new(assets: Vec<ImageAsset>) -> Self {
        Self {
            assets,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_forget: true,
            ..Default::default()
        }
    }

    pub fn forgotten(&self) -> Vec<String> {
        self.forgotten.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetCatalog for MemoryCatalog {
    async fn assets(&self, prefix: &str) -> Result<Vec<ImageAsset>> {
        let prefix = format!("{}/", prefix.trim_matches('/'));
        Ok(self
            .assets
            .iter()
            .filter(|a| prefix == "/" || a.path.as_deref().is_some_and(|p| p.starts_with(&prefix)))
            .cloned()
            .collect())
    }

    async fn forget(&self, paths: &[String]) -> Result<usize> {
        if self.fail_forget {
            return Err(Error::Database("catalog offline".into()));
        }
        self.forgotten.lock().unwrap().extend(paths.iter().cloned());
        Ok(paths.len())
    }
}
