use log::debug;

use crate::backend::{ObjectStore, StoredObject};
use crate::config::Config;
use crate::error::Result;
use crate::types::ImageAsset;

/// Placeholder objects the admin UI drops into empty folders
const PLACEHOLDER_NAMES: &[&str] = &[".keep.png", ".emptyFolderPlaceholder"];

/// Check whether a file name carries one of the configured extensions
pub fn has_image_extension(name: &str, extensions: &[String]) -> bool {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext)),
        _ => false,
    }
}

/// Check whether an object is a folder placeholder rather than an upload
pub fn is_placeholder(name: &str) -> bool {
    PLACEHOLDER_NAMES.contains(&name)
}

/// Turn a storage listing into image assets, dropping non-images and placeholders
pub fn assets_from_listing(
    objects: Vec<StoredObject>,
    store: &dyn ObjectStore,
    config: &Config,
) -> Vec<ImageAsset> {
    objects
        .into_iter()
        .filter(|object| {
            let keep =
                !is_placeholder(&object.name) && has_image_extension(&object.name, &config.image_extensions);
            if !keep {
                debug!("Skipping non-image object {}", object.path);
            }
            keep
        })
        .map(|object| {
            let mut asset = ImageAsset::new(object.path.clone(), store.public_url(&object.path));
            asset.name = object.name;
            asset.size = object.size;
            asset.created_at = object.created_at;
            asset
        })
        .collect()
}

/// Discover the image assets stored directly inside `folder`
pub async fn discover_images(
    store: &dyn ObjectStore,
    folder: &str,
    config: &Config,
) -> Result<Vec<ImageAsset>> {
    let objects = store.list(folder).await?;
    Ok(assets_from_listing(objects, store, config))
}
