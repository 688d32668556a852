#![allow(dead_code)]

use std::path::PathBuf;

use blog_image_deduper_core::persistence::SqliteStore;
use blog_image_deduper_core::{Backend, BlogPost, Config, ImageDeduper};
use tempfile::TempDir;

pub const BASE_URL: &str = "http://localhost";

/// A local bucket directory plus blog database in a temporary directory
pub struct LocalSite {
    _dir: TempDir,
    pub bucket: PathBuf,
    pub db_path: PathBuf,
}

impl LocalSite {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let bucket = dir.path().join("bucket");
        let db_path = dir.path().join("blog.db");
        std::fs::create_dir_all(&bucket).unwrap();
        Self {
            _dir: dir,
            bucket,
            db_path,
        }
    }

    pub fn write(&self, path: &str, bytes: &[u8]) -> &Self {
        let full = self.bucket.join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, bytes).unwrap();
        self
    }

    pub fn exists(&self, path: &str) -> bool {
        self.bucket.join(path).exists()
    }

    pub fn store(&self) -> SqliteStore {
        SqliteStore::open(&self.db_path).unwrap()
    }

    pub fn add_post(&self, id: &str, featured_image: Option<String>, content: &str) {
        self.store()
            .upsert_post(&BlogPost {
                id: id.to_string(),
                title: Some(format!("Post {}", id)),
                slug: Some(format!("post-{}", id)),
                featured_image,
                content: Some(content.to_string()),
            })
            .unwrap();
    }

    pub fn config(&self) -> Config {
        Config {
            backend: Backend::Local,
            supabase_url: BASE_URL.to_string(),
            local_root: Some(self.bucket.clone()),
            database_path: Some(self.db_path.clone()),
            group_pause_ms: 0,
            ..Config::default()
        }
    }

    pub fn deduper(&self) -> ImageDeduper {
        ImageDeduper::from_config(self.config()).unwrap()
    }
}

/// Public URL of a path in the local bucket
pub fn url(path: &str) -> String {
    format!("{}/storage/v1/object/public/blog-images/{}", BASE_URL, path)
}
