use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use log::info;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::error::{PersistenceError, PersistenceResult};
use super::models::StoredAsset;
use crate::backend::{AssetCatalog, BlogStore};
use crate::error::Result;
use crate::types::{BlogPost, ImageAsset};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS blog_posts (
        id TEXT PRIMARY KEY,
        title TEXT,
        slug TEXT,
        featured_image TEXT,
        content TEXT
    );

    CREATE TABLE IF NOT EXISTS image_assets (
        id INTEGER PRIMARY KEY,
        file_name TEXT NOT NULL,
        file_path TEXT NOT NULL UNIQUE,
        cdn_url TEXT NOT NULL,
        hash TEXT,
        size INTEGER,
        created_at INTEGER
    );

    CREATE INDEX IF NOT EXISTS idx_blog_posts_featured_image ON blog_posts(featured_image);
    CREATE INDEX IF NOT EXISTS idx_image_assets_hash ON image_assets(hash);";

/// Blog posts and asset catalog kept in a SQLite database
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`
    pub fn open(path: &Path) -> PersistenceResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| PersistenceError::Path(parent.to_path_buf(), e.to_string()))?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 10000;",
        )
        .map_err(|e| PersistenceError::Initialization(format!("Failed to set pragmas: {}", e)))?;

        let store = Self::with_connection(conn)?;
        info!("SQLite store initialized at {}", path.display());
        Ok(store)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> PersistenceResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> PersistenceResult<Self> {
        conn.execute_batch(SCHEMA).map_err(|e| {
            PersistenceError::Initialization(format!("Failed to create schema: {}", e))
        })?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> PersistenceResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| PersistenceError::Poisoned)
    }

    /// Insert or replace a blog post
    pub fn upsert_post(&self, post: &BlogPost) -> PersistenceResult<()> {
        self.lock()?.execute(
            "INSERT OR REPLACE INTO blog_posts (id, title, slug, featured_image, content)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![post.id, post.title, post.slug, post.featured_image, post.content],
        )?;
        Ok(())
    }

    /// Posts whose featured image or content contains any of `terms`
    pub fn posts_mentioning(&self, terms: &[String]) -> PersistenceResult<Vec<BlogPost>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let conditions: Vec<String> = (1..=terms.len())
            .map(|i| format!("instr(featured_image, ?{i}) > 0 OR instr(content, ?{i}) > 0"))
            .collect();
        let sql = format!(
            "SELECT id, title, slug, featured_image, content FROM blog_posts
             WHERE {}
             ORDER BY id",
            conditions.join(" OR ")
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let posts = stmt
            .query_map(params_from_iter(terms.iter()), |row| {
                Ok(BlogPost {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    slug: row.get(2)?,
                    featured_image: row.get(3)?,
                    content: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(posts)
    }

    /// Insert or replace a catalog row, returning its id
    pub fn add_asset(&self, asset: &StoredAsset) -> PersistenceResult<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO image_assets (file_name, file_path, cdn_url, hash, size, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(file_path) DO UPDATE SET
                file_name = excluded.file_name,
                cdn_url = excluded.cdn_url,
                hash = excluded.hash,
                size = excluded.size,
                created_at = excluded.created_at",
            params![
                asset.file_name,
                asset.file_path,
                asset.cdn_url,
                asset.hash,
                asset.size.map(|s| s as i64),
                asset.created,
            ],
        )?;
        let id = conn.query_row(
            "SELECT id FROM image_assets WHERE file_path = ?1",
            params![asset.file_path],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Look up a catalog row by bucket path
    pub fn get_asset_by_path(&self, file_path: &str) -> PersistenceResult<Option<StoredAsset>> {
        let conn = self.lock()?;
        let asset = conn
            .query_row(
                "SELECT id, file_name, file_path, cdn_url, hash, size, created_at
                 FROM image_assets WHERE file_path = ?1",
                params![file_path],
                asset_from_row,
            )
            .optional()?;
        Ok(asset)
    }

    /// Catalog rows directly or indirectly below `prefix`, oldest first
    pub fn assets_under(&self, prefix: &str) -> PersistenceResult<Vec<StoredAsset>> {
        let prefix = prefix.trim_matches('/');
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, file_name, file_path, cdn_url, hash, size, created_at
             FROM image_assets
             WHERE ?1 = '' OR substr(file_path, 1, length(?1) + 1) = ?1 || '/'
             ORDER BY created_at, id",
        )?;
        let assets = stmt
            .query_map(params![prefix], asset_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(assets)
    }

    /// Delete catalog rows by bucket path, returning how many were deleted
    pub fn remove_assets(&self, paths: &[String]) -> PersistenceResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM image_assets WHERE file_path = ?1")?;
            for path in paths {
                removed += stmt.execute(params![path])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }
}

fn asset_from_row(row: &Row<'_>) -> rusqlite::Result<StoredAsset> {
    let size: Option<i64> = row.get(5)?;
    Ok(StoredAsset {
        id: row.get(0)?,
        file_name: row.get(1)?,
        file_path: row.get(2)?,
        cdn_url: row.get(3)?,
        hash: row.get(4)?,
        size: size.map(|s| s.max(0) as u64),
        created: row.get(6)?,
    })
}

#[async_trait]
impl BlogStore for SqliteStore {
    async fn find_mentioning(&self, terms: &[String]) -> Result<Vec<BlogPost>> {
        Ok(self.posts_mentioning(terms)?)
    }
}

#[async_trait]
impl AssetCatalog for SqliteStore {
    async fn assets(&self, prefix: &str) -> Result<Vec<ImageAsset>> {
        Ok(self
            .assets_under(prefix)?
            .iter()
            .map(StoredAsset::to_image_asset)
            .collect())
    }

    async fn forget(&self, paths: &[String]) -> Result<usize> {
        Ok(self.remove_assets(paths)?)
    }
}
