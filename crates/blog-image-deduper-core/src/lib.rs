//! Core functionality for finding and safely removing duplicate blog images.
//!
//! This library provides the components of the removal pipeline:
//! - Storage discovery and content hashing
//! - Duplicate grouping
//! - Blog usage resolution
//! - Retention selection and deletion

// -- External Dependencies --
use log::{info, warn};

// -- Standard Library --
use std::collections::HashMap;
use std::time::Duration;

// -- Internal Modules --
mod error;

// -- Public Re-exports --
pub use action::DeletionExecutor;
pub use backend::{connect, AssetCatalog, Backends, BlogStore, ObjectStore};
pub use config::*;
pub use error::{Error, Result};
pub use types::*;
pub use usage::UsageResolver;

// -- Public Modules --
pub mod action;
pub mod backend;
pub mod config;
pub mod deduplication;
pub mod discovery;
pub mod logging;
pub mod persistence;
pub mod processing;
pub mod retention;
pub mod types;
pub mod usage;

// -- Test Modules --
#[cfg(test)]
pub mod test_utils;

/// Main entry point for the deduplication process
pub struct ImageDeduper {
    config: Config,
    backends: Backends,
    usage: UsageResolver,
    executor: DeletionExecutor,
}

impl ImageDeduper {
    /// Create a new ImageDeduper from a configuration and its backends
    pub fn new(config: Config, backends: Backends) -> Self {
        let usage = UsageResolver::new(
            backends.blog.clone(),
            config.usage_lookup_failure,
            config.reference_matching,
        );
        let executor = DeletionExecutor::new(
            backends.objects.clone(),
            backends.catalog.clone(),
            Duration::from_millis(config.group_pause_ms),
        );

        Self {
            config,
            backends,
            usage,
            executor,
        }
    }

    /// Connect the backends selected by `config`
    pub fn from_config(config: Config) -> Result<Self> {
        let backends = backend::connect(&config)?;
        Ok(Self::new(config, backends))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve blog usage for every member and pick the survivors
    pub async fn plan_group(&self, group: DuplicateGroup, keep_blog_connected: bool) -> RetentionPlan {
        let mut usages = Vec::with_capacity(group.images.len());
        for image in &group.images {
            usages.push(self.usage.resolve(image).await);
        }
        retention::select_retention(group, usages, keep_blog_connected)
    }

    /// Plan every group, in order
    pub async fn plan_groups(
        &self,
        groups: Vec<DuplicateGroup>,
        keep_blog_connected: bool,
    ) -> Vec<RetentionPlan> {
        let mut plans = Vec::with_capacity(groups.len());
        for group in groups {
            plans.push(self.plan_group(group, keep_blog_connected).await);
        }
        plans
    }

    /// Run the full removal pipeline over caller-supplied duplicate groups.
    ///
    /// Per-group failures end up in the report; this never fails as a whole.
    pub async fn remove_duplicates(
        &self,
        groups: Vec<DuplicateGroup>,
        options: RemovalOptions,
    ) -> DedupReport {
        info!(
            "Processing {} duplicate groups (keep blog connected: {}, dry run: {})",
            groups.len(),
            options.keep_blog_connected,
            options.dry_run
        );

        let plans = self.plan_groups(groups, options.keep_blog_connected).await;
        let results = self.executor.execute_all(&plans, options.dry_run).await;
        let report = DedupReport::from_results(results, options.dry_run);

        info!(
            "Removed {} images, skipped {} groups, {} errors",
            report.summary.removed, report.summary.skipped, report.summary.errors
        );
        report
    }

    /// Images stored directly in `folder`, carrying their content hashes
    /// when grouping by content.
    ///
    /// Catalogued hashes are used when every listed image has one; otherwise
    /// each object is downloaded and hashed. `on_progress` is called once per
    /// downloaded object.
    pub async fn discover_assets(
        &self,
        folder: &str,
        on_progress: impl FnMut(&ImageAsset) + Send,
    ) -> Result<Vec<ImageAsset>> {
        let folder = folder.trim_matches('/');
        let mut assets =
            discovery::discover_images(self.backends.objects.as_ref(), folder, &self.config)
                .await?;
        info!("Found {} images in '{}'", assets.len(), folder);

        if self.config.grouping != GroupingKey::ContentHash || assets.is_empty() {
            return Ok(assets);
        }

        if let Some(hashes) = self.catalog_hashes(folder).await {
            let complete = assets.iter().all(|a| {
                a.path
                    .as_ref()
                    .is_some_and(|path| hashes.contains_key(path.as_str()))
            });
            if complete {
                info!("Using catalogued hashes for '{}'", folder);
                for asset in &mut assets {
                    if let Some(path) = &asset.path {
                        asset.hash = hashes.get(path.as_str()).cloned();
                    }
                }
                return Ok(assets);
            }
        }

        Ok(deduplication::assign_content_hashes(
            self.backends.objects.as_ref(),
            assets,
            on_progress,
        )
        .await)
    }

    async fn catalog_hashes(&self, folder: &str) -> Option<HashMap<String, String>> {
        let catalog = self.backends.catalog.as_ref()?;
        match catalog.assets(folder).await {
            Ok(assets) => Some(
                assets
                    .into_iter()
                    .filter_map(|a| Some((a.path?, a.hash?)))
                    .collect(),
            ),
            Err(e) => {
                warn!("Failed to read asset catalog for '{}': {}", folder, e);
                None
            }
        }
    }

    /// Find duplicates in a storage folder and optionally remove them
    pub async fn scan_folder(
        &self,
        folder: &str,
        action: ScanAction,
        options: RemovalOptions,
        on_progress: impl FnMut(&ImageAsset) + Send,
    ) -> Result<FolderReport> {
        let assets = self.discover_assets(folder, on_progress).await?;
        let total_files = assets.len();
        let files_with_hash = assets
            .iter()
            .filter(|a| deduplication::grouping_key(a, self.config.grouping).is_some())
            .count();

        let duplicate_groups = deduplication::find_duplicate_groups(assets, self.config.grouping);
        info!(
            "{} of {} images grouped into {} duplicate groups",
            files_with_hash,
            total_files,
            duplicate_groups.len()
        );

        let plans = self
            .plan_groups(duplicate_groups.clone(), options.keep_blog_connected)
            .await;

        let removal = match action {
            ScanAction::Check => None,
            ScanAction::Remove => {
                let results = self.executor.execute_all(&plans, options.dry_run).await;
                Some(DedupReport::from_results(results, options.dry_run))
            }
        };

        Ok(FolderReport {
            folder_path: folder.trim_matches('/').to_string(),
            total_files,
            files_with_hash,
            duplicate_groups,
            plans,
            removal,
        })
    }
}
