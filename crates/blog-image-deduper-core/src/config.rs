use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Where assets, blog posts and catalog rows live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Supabase Storage plus PostgREST tables
    Supabase,

    /// A bucket directory on disk plus a SQLite database
    Local,
}

/// What to do with an asset whose blog usage could not be looked up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageLookupFailure {
    /// Treat the asset as blog-connected so it is never removed on a failed lookup
    AssumeUsed,

    /// Treat the asset as unused, matching the legacy admin endpoint
    AssumeUnused,
}

/// How blog content is matched against an asset URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceMatching {
    /// Compare normalized storage paths of the image references found in content
    ExactPath,

    /// Raw substring search of the URL in content
    Substring,
}

/// Key used by the hash grouper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingKey {
    /// blake3 digest of the object bytes
    ContentHash,

    /// Normalized file name without extension and UUID prefix
    FileName,
}

/// Log level for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Configuration for duplicate detection and removal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend holding the bucket and the blog tables
    pub backend: Backend,

    /// Supabase project URL
    pub supabase_url: String,

    /// Supabase service role key
    pub service_role_key: String,

    /// Storage bucket holding blog images
    pub bucket: String,

    /// Bucket directory for the local backend
    pub local_root: Option<PathBuf>,

    /// SQLite database for the local backend
    pub database_path: Option<PathBuf>,

    /// Address the admin HTTP server binds to
    pub listen_addr: String,

    /// Default for requests that do not say whether to protect blog images
    pub keep_blog_connected: bool,

    /// Default for requests that do not say whether to dry run
    pub dry_run: bool,

    /// Pause between two duplicate groups, in milliseconds
    pub group_pause_ms: u64,

    /// Handling of failed blog usage lookups
    pub usage_lookup_failure: UsageLookupFailure,

    /// Matching of blog content against asset URLs
    pub reference_matching: ReferenceMatching,

    /// Key used when scanning folders
    pub grouping: GroupingKey,

    /// Extensions considered when scanning folders
    pub image_extensions: Vec<String>,

    /// Page size of storage listings
    pub list_page_size: usize,

    /// Directory for rotated log files; console only when unset
    pub log_dir: Option<PathBuf>,

    /// Log level
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::Supabase,
            supabase_url: String::new(),
            service_role_key: String::new(),
            bucket: "blog-images".to_string(),
            local_root: None,
            database_path: None,
            listen_addr: "127.0.0.1:3000".to_string(),
            keep_blog_connected: true,
            dry_run: false,
            group_pause_ms: 500,
            usage_lookup_failure: UsageLookupFailure::AssumeUsed,
            reference_matching: ReferenceMatching::ExactPath,
            grouping: GroupingKey::ContentHash,
            image_extensions: ["jpg", "jpeg", "png", "gif", "webp", "mp4"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            list_page_size: 1000,
            log_dir: None,
            log_level: LogLevel::Info,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Configuration(format!("Failed to open config file: {}", e)))?;

        let config: Config = serde_json::from_reader(file)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .map_err(|e| Error::Configuration(format!("Failed to create config file: {}", e)))?;

        serde_json::to_writer_pretty(file, self)
            .map_err(|e| Error::Configuration(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Override Supabase settings from `.env` and the process environment
    pub fn apply_env(&mut self) {
        dotenv::dotenv().ok();
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| var(key))
                .find(|value| !value.trim().is_empty())
        };

        if let Some(url) = first(&["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"]) {
            self.supabase_url = url;
        }
        if let Some(key) = first(&["SUPABASE_SERVICE_ROLE_KEY"]) {
            self.service_role_key = key;
        }
        if let Some(bucket) = first(&[
            "SUPABASE_STORAGE_BUCKET",
            "NEXT_PUBLIC_SUPABASE_STORAGE_BUCKET",
        ]) {
            self.bucket = bucket;
        }
    }

    /// Check the configuration is usable for the selected backend
    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(Error::Configuration("bucket must not be empty".into()));
        }
        if self.list_page_size == 0 {
            return Err(Error::Configuration(
                "list_page_size must be greater than zero".into(),
            ));
        }
        if self.image_extensions.is_empty() {
            return Err(Error::Configuration(
                "image_extensions must list at least one extension".into(),
            ));
        }

        match self.backend {
            Backend::Supabase => {
                if self.supabase_url.trim().is_empty() {
                    return Err(Error::Configuration(
                        "supabase_url is required (or set SUPABASE_URL)".into(),
                    ));
                }
                if self.service_role_key.trim().is_empty() {
                    return Err(Error::Configuration(
                        "service_role_key is required (or set SUPABASE_SERVICE_ROLE_KEY)".into(),
                    ));
                }
            }
            Backend::Local => {
                if self.local_root.is_none() {
                    return Err(Error::Configuration(
                        "local_root is required for the local backend".into(),
                    ));
                }
                if self.database_path.is_none() {
                    return Err(Error::Configuration(
                        "database_path is required for the local backend".into(),
                    ));
                }
            }
        }

        Ok(())
    }
}
