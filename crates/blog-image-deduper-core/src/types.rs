use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// An image (or video) object stored in the bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAsset {
    /// Catalog identifier, if the asset is tracked in `image_assets`
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub id: Option<String>,

    /// File name as shown to operators
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub name: String,

    /// Path of the object inside the bucket
    #[serde(default, alias = "file_path")]
    pub path: Option<String>,

    /// Public URL of the object
    pub url: String,

    /// Content hash or filename signature used for grouping
    #[serde(default, alias = "hash_md5")]
    pub hash: Option<String>,

    /// Object size in bytes
    #[serde(default)]
    pub size: Option<u64>,

    /// Upload timestamp
    #[serde(default, deserialize_with = "de::opt_timestamp")]
    pub created_at: Option<DateTime<Utc>>,

    /// Caller-side hint that the image is referenced by a blog post
    #[serde(default, deserialize_with = "de::bool_or_null")]
    pub has_blog_connection: bool,
}

impl ImageAsset {
    /// Create an asset from its bucket path and public URL
    pub fn new(path: impl Into<String>, url: impl Into<String>) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            id: None,
            name,
            path: Some(path),
            url: url.into(),
            hash: None,
            size: None,
            created_at: None,
            has_blog_connection: false,
        }
    }

    /// Name to report: explicit name, else the last path or URL segment
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            return &self.name;
        }
        let source = self.path.as_deref().unwrap_or(&self.url);
        source
            .split('?')
            .next()
            .and_then(|s| s.rsplit('/').next())
            .unwrap_or(source)
    }
}

/// A set of stored assets sharing the same grouping key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    #[serde(alias = "hash_md5")]
    pub hash: String,

    #[serde(default)]
    pub images: Vec<ImageAsset>,
}

/// A row of the blog store as returned by reference lookups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogPost {
    #[serde(deserialize_with = "de::string_or_number")]
    pub id: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub slug: Option<String>,

    #[serde(default)]
    pub featured_image: Option<String>,

    #[serde(default)]
    pub content: Option<String>,
}

/// One blog post referencing an asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogUsageRecord {
    pub id: String,
    pub title: Option<String>,
    pub slug: Option<String>,
    pub is_featured: bool,
    pub is_in_content: bool,
}

/// Blog usage of a single asset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogUsage {
    pub is_used: bool,
    pub posts: Vec<BlogUsageRecord>,
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BlogUsage {
    pub fn from_posts(posts: Vec<BlogUsageRecord>) -> Self {
        Self {
            is_used: !posts.is_empty(),
            count: posts.len(),
            posts,
            error: None,
        }
    }

    /// Usage of an asset whose lookup failed
    pub fn lookup_failed(message: impl Into<String>, assume_used: bool) -> Self {
        Self {
            is_used: assume_used,
            posts: Vec::new(),
            count: 0,
            error: Some(message.into()),
        }
    }
}

/// Why an asset is kept or removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionReason {
    /// Kept because a blog post references it
    BlogConnected,

    /// Kept as the most recent copy
    MostRecent,

    /// Removed as a plain duplicate
    Duplicate,

    /// Removed although referenced, because blog protection was turned off
    BlogConnectedButSuperseded,
}

impl RetentionReason {
    pub fn is_kept(&self) -> bool {
        matches!(self, Self::BlogConnected | Self::MostRecent)
    }
}

/// Decision for one member of a duplicate group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetentionDecision {
    pub asset: ImageAsset,
    pub usage: BlogUsage,
    pub reason: RetentionReason,
}

impl RetentionDecision {
    /// Blog usage as resolved, or as hinted by the caller
    pub fn is_blog_connected(&self) -> bool {
        self.usage.is_used || self.asset.has_blog_connection
    }
}

/// Partition of a duplicate group into kept and removed members
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPlan {
    pub hash: String,
    pub to_keep: Vec<RetentionDecision>,
    pub to_remove: Vec<RetentionDecision>,
}

impl RetentionPlan {
    pub fn total(&self) -> usize {
        self.to_keep.len() + self.to_remove.len()
    }
}

/// Options of one removal run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovalOptions {
    /// Keep every blog-connected copy
    pub keep_blog_connected: bool,

    /// Report removals without performing them
    pub dry_run: bool,
}

impl Default for RemovalOptions {
    fn default() -> Self {
        Self {
            keep_blog_connected: true,
            dry_run: false,
        }
    }
}

/// Outcome of executing one retention plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Success,
    Error,
    Skipped,
    DryRun,
}

/// A removed (or, in dry run, to-be-removed) image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedImage {
    pub name: String,
    pub url: String,
    pub has_blog_connection: bool,
    pub reason: RetentionReason,
}

/// Per-group entry of a removal report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupResult {
    pub hash: String,
    pub status: GroupStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images_removed: Option<Vec<RemovedImage>>,
    pub total_images: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GroupResult {
    pub fn skipped(hash: &str, total_images: usize) -> Self {
        Self {
            hash: hash.to_string(),
            status: GroupStatus::Skipped,
            removed: None,
            skipped: Some(true),
            images_removed: None,
            total_images,
            error: None,
        }
    }

    pub fn failed(hash: &str, total_images: usize, error: impl Into<String>) -> Self {
        Self {
            hash: hash.to_string(),
            status: GroupStatus::Error,
            removed: None,
            skipped: None,
            images_removed: None,
            total_images,
            error: Some(error.into()),
        }
    }
}

/// Totals over a removal report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_groups: usize,
    pub removed: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Result of a removal run over many groups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupReport {
    pub success: bool,
    pub results: Vec<GroupResult>,
    pub summary: Summary,
    pub dry_run: bool,
}

impl DedupReport {
    pub fn from_results(results: Vec<GroupResult>, dry_run: bool) -> Self {
        let mut summary = Summary {
            total_groups: results.len(),
            ..Default::default()
        };
        for result in &results {
            match result.status {
                GroupStatus::Success | GroupStatus::DryRun => {
                    summary.removed += result.removed.unwrap_or(0)
                }
                GroupStatus::Skipped => summary.skipped += 1,
                GroupStatus::Error => summary.errors += 1,
            }
        }
        Self {
            success: true,
            results,
            summary,
            dry_run,
        }
    }
}

/// What a folder scan does with the duplicates it finds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanAction {
    /// Report groups and retention plans only
    Check,
    /// Also execute the retention plans
    Remove,
}

/// Result of scanning one storage folder for duplicates
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderReport {
    pub folder_path: String,
    pub total_files: usize,
    pub files_with_hash: usize,
    pub duplicate_groups: Vec<DuplicateGroup>,
    pub plans: Vec<RetentionPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removal: Option<DedupReport>,
}

/// Parse the timestamp layouts seen in storage listings and admin requests
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    for layout in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, layout) {
            return Some(ts.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|ts| ts.and_utc());
    }
    // Month precision, e.g. "2024-03"
    NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

mod de {
    use super::*;
    use serde::de::Error as _;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Int(i64),
        Float(f64),
    }

    impl StringOrNumber {
        fn into_string(self) -> String {
            match self {
                Self::String(s) => s,
                Self::Int(n) => n.to_string(),
                Self::Float(n) => n.to_string(),
            }
        }
    }

    pub fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        StringOrNumber::deserialize(d).map(StringOrNumber::into_string)
    }

    pub fn opt_string_or_number<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(Option::<StringOrNumber>::deserialize(d)?.map(StringOrNumber::into_string))
    }

    pub fn string_or_null<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
    }

    pub fn bool_or_null<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(Option::<bool>::deserialize(d)?.unwrap_or(false))
    }

    pub fn opt_timestamp<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(d)? {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => parse_timestamp(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}"))),
        }
    }
}
