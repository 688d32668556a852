//! Blog usage of stored images.

use std::sync::Arc;

use crate::backend::BlogStore;
use crate::config::{ReferenceMatching, UsageLookupFailure};
use crate::logging;
use crate::types::{BlogPost, BlogUsage, BlogUsageRecord, ImageAsset};

pub mod references;

pub use references::{
    extract_image_references, normalize_reference, references_match, storage_path_from_url,
    ImageTarget,
};

/// Looks up which blog posts reference a stored image
#[derive(Clone)]
pub struct UsageResolver {
    blog: Arc<dyn BlogStore>,
    on_failure: UsageLookupFailure,
    matching: ReferenceMatching,
}

impl UsageResolver {
    pub fn new(
        blog: Arc<dyn BlogStore>,
        on_failure: UsageLookupFailure,
        matching: ReferenceMatching,
    ) -> Self {
        Self {
            blog,
            on_failure,
            matching,
        }
    }

    /// Resolve the blog usage of `image`.
    ///
    /// Never fails: a lookup error is reported in `BlogUsage::error`, and the
    /// asset counts as used or unused according to the failure policy.
    pub async fn resolve(&self, image: &ImageAsset) -> BlogUsage {
        let target = ImageTarget::new(&image.url, image.path.as_deref());
        match self.blog.find_mentioning(&target.search_terms()).await {
            Ok(posts) => BlogUsage::from_posts(
                posts
                    .iter()
                    .filter_map(|post| self.usage_record(post, &target))
                    .collect(),
            ),
            Err(e) => {
                logging::log_lookup_error(target.url(), &e);
                BlogUsage::lookup_failed(
                    e.to_string(),
                    self.on_failure == UsageLookupFailure::AssumeUsed,
                )
            }
        }
    }

    fn usage_record(&self, post: &BlogPost, target: &ImageTarget) -> Option<BlogUsageRecord> {
        let is_featured = post
            .featured_image
            .as_deref()
            .is_some_and(|featured| match self.matching {
                ReferenceMatching::ExactPath => target.is_referenced_by(featured),
                ReferenceMatching::Substring => featured == target.url(),
            });

        let is_in_content = post
            .content
            .as_deref()
            .is_some_and(|content| match self.matching {
                ReferenceMatching::ExactPath => extract_image_references(content)
                    .iter()
                    .any(|reference| target.is_referenced_by(reference)),
                ReferenceMatching::Substring => content.contains(target.url()),
            });

        (is_featured || is_in_content).then(|| BlogUsageRecord {
            id: post.id.clone(),
            title: post.title.clone(),
            slug: post.slug.clone(),
            is_featured,
            is_in_content,
        })
    }
}
