//! Choosing which members of a duplicate group survive.

use std::cmp::Ordering;

use log::debug;

use crate::types::{BlogUsage, DuplicateGroup, RetentionDecision, RetentionPlan, RetentionReason};

/// Split a duplicate group into members to keep and members to remove.
///
/// `usages[i]` is the blog usage of `group.images[i]`; missing entries count
/// as unused.
///
/// - with `keep_blog_connected` and at least one connected member, every
///   connected member is kept and the rest removed
/// - otherwise only the most recent member is kept, whether or not it is
///   connected
///
/// A non-empty group always keeps at least one member.
pub fn select_retention(
    group: DuplicateGroup,
    usages: Vec<BlogUsage>,
    keep_blog_connected: bool,
) -> RetentionPlan {
    let mut usages = usages.into_iter();
    let mut ranked: Vec<RetentionDecision> = group
        .images
        .into_iter()
        .map(|asset| RetentionDecision {
            asset,
            usage: usages.next().unwrap_or_default(),
            reason: RetentionReason::Duplicate,
        })
        .collect();

    let protect_connected =
        keep_blog_connected && ranked.iter().any(RetentionDecision::is_blog_connected);
    if protect_connected {
        ranked.sort_by(connected_first);
    } else {
        ranked.sort_by(newest_first);
    }

    let mut to_keep = Vec::new();
    let mut to_remove = Vec::new();

    for (position, mut decision) in ranked.into_iter().enumerate() {
        let connected = decision.is_blog_connected();
        decision.reason = match (protect_connected, connected, position) {
            (true, true, _) => RetentionReason::BlogConnected,
            (false, _, 0) => RetentionReason::MostRecent,
            (_, true, _) => RetentionReason::BlogConnectedButSuperseded,
            _ => RetentionReason::Duplicate,
        };

        debug!(
            "{} -> {:?} (connected: {})",
            decision.asset.display_name(),
            decision.reason,
            connected
        );

        if decision.reason.is_kept() {
            to_keep.push(decision);
        } else {
            to_remove.push(decision);
        }
    }

    RetentionPlan {
        hash: group.hash,
        to_keep,
        to_remove,
    }
}

/// Undated members sort last
fn newest_first(a: &RetentionDecision, b: &RetentionDecision) -> Ordering {
    b.asset.created_at.cmp(&a.asset.created_at)
}

fn connected_first(a: &RetentionDecision, b: &RetentionDecision) -> Ordering {
    b.is_blog_connected()
        .cmp(&a.is_blog_connected())
        .then_with(|| newest_first(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::image;
    use crate::types::{BlogUsageRecord, ImageAsset};

    fn used() -> BlogUsage {
        BlogUsage::from_posts(vec![BlogUsageRecord {
            id: "1".into(),
            title: Some("Driver review".into()),
            slug: Some("driver-review".into()),
            is_featured: true,
            is_in_content: false,
        }])
    }

    fn group(images: Vec<ImageAsset>) -> DuplicateGroup {
        DuplicateGroup {
            hash: "h".into(),
            images,
        }
    }

    fn names(decisions: &[RetentionDecision]) -> Vec<&str> {
        decisions.iter().map(|d| d.asset.display_name()).collect()
    }

    #[test]
    fn test_connected_image_kept_over_newer_copy() {
        let g = group(vec![image("a.jpg", "2024-01-01"), image("b.jpg", "2024-02-01")]);
        let usages = vec![used(), BlogUsage::default()];

        let plan = select_retention(g, usages, true);

        assert_eq!(names(&plan.to_keep), vec!["a.jpg"]);
        assert_eq!(plan.to_keep[0].reason, RetentionReason::BlogConnected);
        assert_eq!(names(&plan.to_remove), vec!["b.jpg"]);
        assert_eq!(plan.to_remove[0].reason, RetentionReason::Duplicate);
    }

    #[test]
    fn test_protection_off_keeps_most_recent() {
        let g = group(vec![image("a.jpg", "2024-01-01"), image("b.jpg", "2024-02-01")]);
        let usages = vec![used(), BlogUsage::default()];

        let plan = select_retention(g, usages, false);

        assert_eq!(names(&plan.to_keep), vec!["b.jpg"]);
        assert_eq!(plan.to_keep[0].reason, RetentionReason::MostRecent);
        assert_eq!(names(&plan.to_remove), vec!["a.jpg"]);
        assert_eq!(
            plan.to_remove[0].reason,
            RetentionReason::BlogConnectedButSuperseded
        );
    }

    #[test]
    fn test_protection_off_keeps_exactly_the_newest() {
        let g = group(vec![
            image("jan.jpg", "2024-01-01"),
            image("feb.jpg", "2024-02-01"),
            image("mar.jpg", "2024-03-01"),
            image("apr.jpg", "2024-04-01"),
        ]);
        let usages = vec![used(), BlogUsage::default(), used(), BlogUsage::default()];

        let plan = select_retention(g, usages, false);

        assert_eq!(names(&plan.to_keep), vec!["apr.jpg"]);
        assert_eq!(plan.to_keep[0].reason, RetentionReason::MostRecent);
        assert!(!plan.to_keep[0].is_blog_connected());
        assert_eq!(names(&plan.to_remove), vec!["mar.jpg", "feb.jpg", "jan.jpg"]);
        let reasons: Vec<_> = plan.to_remove.iter().map(|d| d.reason).collect();
        assert_eq!(
            reasons,
            vec![
                RetentionReason::BlogConnectedButSuperseded,
                RetentionReason::Duplicate,
                RetentionReason::BlogConnectedButSuperseded,
            ]
        );
    }

    #[test]
    fn test_protection_off_same_result_whatever_the_usage() {
        let members = || {
            vec![
                image("a.jpg", "2024-01-01"),
                image("b.jpg", "2024-03-01"),
                image("c.jpg", "2024-02-01"),
            ]
        };
        let usage_sets = [
            Vec::new(),
            vec![used(), BlogUsage::default(), BlogUsage::default()],
            vec![BlogUsage::default(), BlogUsage::default(), used()],
            vec![used(), used(), used()],
        ];

        for usages in usage_sets {
            let plan = select_retention(group(members()), usages, false);
            assert_eq!(names(&plan.to_keep), vec!["b.jpg"]);
            assert_eq!(plan.to_remove.len(), 2);
        }
    }

    #[test]
    fn test_unconnected_group_keeps_newest_only() {
        let g = group(vec![
            image("jan.jpg", "2024-01"),
            image("feb.jpg", "2024-02"),
            image("mar.jpg", "2024-03"),
        ]);

        let plan = select_retention(g, Vec::new(), true);

        assert_eq!(names(&plan.to_keep), vec!["mar.jpg"]);
        assert_eq!(names(&plan.to_remove), vec!["feb.jpg", "jan.jpg"]);
        assert!(plan
            .to_remove
            .iter()
            .all(|d| d.reason == RetentionReason::Duplicate));
    }

    #[test]
    fn test_every_connected_member_is_kept() {
        let g = group(vec![
            image("a.jpg", "2024-01-01"),
            image("b.jpg", "2024-02-01"),
            image("c.jpg", "2024-03-01"),
            image("d.jpg", "2024-04-01"),
        ]);
        let usages = vec![used(), BlogUsage::default(), used(), BlogUsage::default()];

        let plan = select_retention(g, usages, true);

        assert_eq!(names(&plan.to_keep), vec!["c.jpg", "a.jpg"]);
        assert!(plan.to_keep.iter().all(|d| d.is_blog_connected()));
        assert_eq!(names(&plan.to_remove), vec!["d.jpg", "b.jpg"]);
        assert_eq!(plan.total(), 4);
    }

    #[test]
    fn test_client_hint_counts_as_connected() {
        let mut hinted = image("a.jpg", "2024-01-01");
        hinted.has_blog_connection = true;
        let g = group(vec![hinted, image("b.jpg", "2024-02-01")]);

        let plan = select_retention(g, Vec::new(), true);

        assert_eq!(names(&plan.to_keep), vec!["a.jpg"]);
    }

    #[test]
    fn test_failed_lookup_assumed_used_is_protected() {
        let g = group(vec![image("a.jpg", "2024-01-01"), image("b.jpg", "2024-02-01")]);
        let usages = vec![
            BlogUsage::lookup_failed("timeout", true),
            BlogUsage::default(),
        ];

        let plan = select_retention(g, usages, true);

        assert_eq!(names(&plan.to_keep), vec!["a.jpg"]);
        assert_eq!(plan.to_keep[0].usage.error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_undated_members_rank_last() {
        let mut undated = image("undated.jpg", "2024-01-01");
        undated.created_at = None;
        let g = group(vec![undated, image("dated.jpg", "2023-01-01")]);

        let plan = select_retention(g, Vec::new(), true);

        assert_eq!(names(&plan.to_keep), vec!["dated.jpg"]);
    }

    #[test]
    fn test_empty_group_yields_empty_plan() {
        let plan = select_retention(group(Vec::new()), Vec::new(), true);
        assert_eq!(plan.total(), 0);
    }
}
