use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::backend::{AssetCatalog, ObjectStore};
use crate::error::{Error, Result};
use crate::logging;
use crate::types::{
    GroupResult, GroupStatus, ImageAsset, RemovedImage, RetentionDecision, RetentionPlan,
};
use crate::usage::storage_path_from_url;

/// Carries out retention plans against the object store
pub struct DeletionExecutor {
    objects: Arc<dyn ObjectStore>,
    catalog: Option<Arc<dyn AssetCatalog>>,
    group_pause: Duration,
}

impl DeletionExecutor {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        catalog: Option<Arc<dyn AssetCatalog>>,
        group_pause: Duration,
    ) -> Self {
        Self {
            objects,
            catalog,
            group_pause,
        }
    }

    /// Execute every plan in order.
    ///
    /// A failing group is reported in its result and the remaining groups
    /// still run. Between groups that touch storage the executor pauses for
    /// the configured interval.
    pub async fn execute_all(&self, plans: &[RetentionPlan], dry_run: bool) -> Vec<GroupResult> {
        let mut results = Vec::with_capacity(plans.len());

        for (i, plan) in plans.iter().enumerate() {
            results.push(self.execute(plan, dry_run).await);

            let is_last = i + 1 == plans.len();
            if !dry_run && !is_last && !self.group_pause.is_zero() {
                tokio::time::sleep(self.group_pause).await;
            }
        }

        results
    }

    /// Execute a single plan
    pub async fn execute(&self, plan: &RetentionPlan, dry_run: bool) -> GroupResult {
        let total = plan.total();

        if plan.to_remove.is_empty() {
            debug!("Group {}: nothing to remove", plan.hash);
            return GroupResult::skipped(&plan.hash, total);
        }

        let paths = match plan
            .to_remove
            .iter()
            .map(|d| self.object_path(&d.asset))
            .collect::<Result<Vec<String>>>()
        {
            Ok(paths) => paths,
            Err(e) => {
                warn!("Group {}: {}", plan.hash, e);
                return GroupResult::failed(&plan.hash, total, e.to_string());
            }
        };

        if dry_run {
            info!(
                "Group {}: dry run, would remove {} of {} images",
                plan.hash,
                paths.len(),
                total
            );
            let images = plan.to_remove.iter().map(removed_image).collect::<Vec<_>>();
            return GroupResult {
                hash: plan.hash.clone(),
                status: GroupStatus::DryRun,
                removed: Some(images.len()),
                skipped: None,
                images_removed: Some(images),
                total_images: total,
                error: None,
            };
        }

        let removed = match self.objects.remove(&paths).await {
            Ok(removed) => removed,
            Err(e) => {
                logging::log_storage_error("remove", &paths, &e);
                return GroupResult::failed(&plan.hash, total, e.to_string());
            }
        };

        if removed.is_empty() {
            info!("Group {}: objects already gone, skipping", plan.hash);
            return GroupResult::skipped(&plan.hash, total);
        }

        let mut images = Vec::with_capacity(removed.len());
        for (decision, path) in plan.to_remove.iter().zip(&paths) {
            if !removed.contains(path) {
                continue;
            }
            let details = format!("group {}, reason {:?}", plan.hash, decision.reason);
            logging::log_storage_removal(self.objects.bucket(), path, Some(&details));
            images.push(removed_image(decision));
        }

        self.forget(&removed).await;

        GroupResult {
            hash: plan.hash.clone(),
            status: GroupStatus::Success,
            removed: Some(images.len()),
            skipped: None,
            images_removed: Some(images),
            total_images: total,
            error: None,
        }
    }

    /// Bucket path of an asset, from its recorded path or its public URL
    fn object_path(&self, asset: &ImageAsset) -> Result<String> {
        if let Some(path) = asset.path.as_deref().map(|p| p.trim_start_matches('/')) {
            if !path.is_empty() {
                return Ok(path.to_string());
            }
        }

        match storage_path_from_url(&asset.url) {
            Some((bucket, path)) if bucket == self.objects.bucket() => Ok(path),
            Some((bucket, _)) => Err(Error::InvalidRequest(format!(
                "{} belongs to bucket {}, not {}",
                asset.url,
                bucket,
                self.objects.bucket()
            ))),
            None => Err(Error::InvalidRequest(format!(
                "cannot resolve a storage path for {}",
                asset.url
            ))),
        }
    }

    /// Drop catalog rows of removed objects. Failures only get logged.
    async fn forget(&self, removed: &[String]) {
        let Some(catalog) = &self.catalog else {
            return;
        };
        match catalog.forget(removed).await {
            Ok(rows) => debug!("Removed {} catalog rows", rows),
            Err(e) => warn!("Failed to remove catalog rows for {:?}: {}", removed, e),
        }
    }
}

fn removed_image(decision: &RetentionDecision) -> RemovedImage {
    RemovedImage {
        name: decision.asset.display_name().to_string(),
        url: decision.asset.url.clone(),
        has_blog_connection: decision.is_blog_connected(),
        reason: decision.reason,
    }
}
