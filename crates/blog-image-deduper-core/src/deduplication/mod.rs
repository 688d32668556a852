use std::collections::HashMap;

use log::{debug, warn};

use crate::backend::ObjectStore;
use crate::config::GroupingKey;
use crate::processing::{content_hash, file_name_signature};
use crate::types::{DuplicateGroup, ImageAsset};

/// Finds duplicate images by grouping them on the selected key.
///
/// Only groups with 2 or more images are returned. Groups keep the order in
/// which their key was first seen; members are ordered by creation time
/// ascending, stable with respect to the input order. Assets without a key
/// (no content hash, or a name that normalizes to nothing) are never grouped.
pub fn find_duplicate_groups(assets: Vec<ImageAsset>, key: GroupingKey) -> Vec<DuplicateGroup> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<DuplicateGroup> = Vec::new();

    for asset in assets {
        let Some(group_key) = grouping_key(&asset, key) else {
            debug!("No grouping key for {}, skipping", asset.url);
            continue;
        };

        match index.get(&group_key) {
            Some(&position) => groups[position].images.push(asset),
            None => {
                index.insert(group_key.clone(), groups.len());
                groups.push(DuplicateGroup {
                    hash: group_key,
                    images: vec![asset],
                });
            }
        }
    }

    groups
        .into_iter()
        .filter(|group| group.images.len() > 1)
        .map(|mut group| {
            group.images.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            group
        })
        .collect()
}

/// Key an asset is grouped on, if it has one
pub fn grouping_key(asset: &ImageAsset, key: GroupingKey) -> Option<String> {
    let value = match key {
        GroupingKey::ContentHash => asset.hash.clone()?,
        GroupingKey::FileName => file_name_signature(asset.display_name()),
    };
    (!value.is_empty()).then_some(value)
}

/// Download every asset and record its content hash.
///
/// Assets that cannot be downloaded are logged and left out, so a flaky
/// object never ends up in a group. `on_progress` is called once per asset.
pub async fn assign_content_hashes(
    store: &dyn ObjectStore,
    assets: Vec<ImageAsset>,
    mut on_progress: impl FnMut(&ImageAsset) + Send,
) -> Vec<ImageAsset> {
    let mut hashed = Vec::with_capacity(assets.len());

    for mut asset in assets {
        on_progress(&asset);
        let Some(path) = asset.path.clone() else {
            warn!("Asset {} has no bucket path, cannot hash it", asset.url);
            continue;
        };

        match store.download(&path).await {
            Ok(bytes) => {
                asset.size.get_or_insert(bytes.len() as u64);
                asset.hash = Some(content_hash(&bytes));
                hashed.push(asset);
            }
            Err(e) => warn!("Failed to download {} for hashing: {}", path, e),
        }
    }

    hashed
}
