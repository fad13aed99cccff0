use std::collections::{BTreeSet, HashMap};

use crate::fetcher::CollectionItem;
use crate::profile::{OrganizationProfile, ProfileRecord};

pub struct ListingStats<'a> {
    pub total: usize,
    pub total_downloads: u64,
    pub total_likes: u64,
    pub avg_downloads: f64,
    pub avg_likes: f64,
    pub top_by_downloads: Vec<&'a CollectionItem>,
    pub top_by_likes: Vec<&'a CollectionItem>,
    pub by_pipeline_tag: Vec<(String, usize)>,
    pub by_library: Vec<(String, usize)>,
    pub by_author: Vec<(String, usize)>,
}

/// Linear-scan range filter over loaded records.
pub fn filter_min_downloads(items: &[CollectionItem], min: u64) -> Vec<&CollectionItem> {
    items.iter().filter(|i| i.downloads >= min).collect()
}

pub fn compute<'a>(items: &[&'a CollectionItem], top: usize) -> ListingStats<'a> {
    let total = items.len();
    let total_downloads: u64 = items.iter().map(|i| i.downloads).sum();
    let total_likes: u64 = items.iter().map(|i| i.likes).sum();
    let avg = |sum: u64| if total == 0 { 0.0 } else { sum as f64 / total as f64 };

    let mut top_by_downloads = items.to_vec();
    top_by_downloads.sort_by(|a, b| b.downloads.cmp(&a.downloads).then_with(|| a.id.cmp(&b.id)));
    top_by_downloads.truncate(top);

    let mut top_by_likes = items.to_vec();
    top_by_likes.sort_by(|a, b| b.likes.cmp(&a.likes).then_with(|| a.id.cmp(&b.id)));
    top_by_likes.truncate(top);

    ListingStats {
        total,
        total_downloads,
        total_likes,
        avg_downloads: avg(total_downloads),
        avg_likes: avg(total_likes),
        top_by_downloads,
        top_by_likes,
        by_pipeline_tag: count_by(items, top, |i| {
            Some(i.pipeline_tag.clone().unwrap_or_else(|| "unknown".into()))
        }),
        by_library: count_by(items, top, |i| {
            Some(i.library_name.clone().unwrap_or_else(|| "unknown".into()))
        }),
        by_author: count_by(items, top, |i| {
            i.id.split_once('/').map(|(author, _)| author.to_string())
        }),
    }
}

/// Distinct `author` prefixes of `author/name` ids, sorted.
pub fn authors_from_items(items: &[CollectionItem]) -> Vec<String> {
    items
        .iter()
        .filter_map(|i| i.id.split_once('/'))
        .map(|(author, _)| author)
        .filter(|author| !author.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub struct OrgStats<'a> {
    pub total: usize,
    pub valid: usize,
    pub failed: usize,
    pub total_models: usize,
    pub total_datasets: usize,
    pub total_spaces: usize,
    pub total_followers: u64,
    pub top_by_models: Vec<&'a OrganizationProfile>,
    pub top_by_downloads: Vec<&'a OrganizationProfile>,
    pub top_by_followers: Vec<&'a OrganizationProfile>,
    /// Every plan seen; a missing plan counts as "unknown".
    pub by_plan: Vec<(String, usize)>,
}

pub fn compute_orgs(records: &[ProfileRecord], top: usize) -> OrgStats<'_> {
    let valid: Vec<&OrganizationProfile> = records
        .iter()
        .filter_map(|r| match r {
            ProfileRecord::Profile(p) => Some(p.as_ref()),
            ProfileRecord::Failed(_) => None,
        })
        .collect();

    let followers = |p: &OrganizationProfile| p.follower_info.follower_count.unwrap_or(0);
    let ranked = |key: &dyn Fn(&OrganizationProfile) -> u64| {
        let mut sorted = valid.clone();
        sorted.sort_by(|a, b| {
            key(*b)
                .cmp(&key(*a))
                .then_with(|| a.organization.cmp(&b.organization))
        });
        sorted.truncate(top);
        sorted
    };

    OrgStats {
        total: records.len(),
        valid: valid.len(),
        failed: records.len() - valid.len(),
        total_models: valid.iter().map(|p| p.api_data.models.count).sum(),
        total_datasets: valid.iter().map(|p| p.api_data.datasets.count).sum(),
        total_spaces: valid.iter().map(|p| p.api_data.spaces.count).sum(),
        total_followers: valid.iter().copied().map(followers).sum(),
        top_by_models: ranked(&|p| p.api_data.models.count as u64),
        top_by_downloads: ranked(&|p| p.api_data.models.total_downloads),
        top_by_followers: ranked(&followers),
        by_plan: count_by(&valid, usize::MAX, |p| {
            Some(p.basic_info.plan.clone().unwrap_or_else(|| "unknown".into()))
        }),
    }
}

/// Most common keys first; ties broken by key for stable output.
fn count_by<T, F>(items: &[&T], top: usize, key: F) -> Vec<(String, usize)>
where
    F: Fn(&T) -> Option<String>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    for item in items {
        if let Some(k) = key(*item) {
            *counts.entry(k).or_default() += 1;
        }
    }
    let mut sorted: Vec<_> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(top);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::FailedProfile;
    use serde_json::json;

    fn item(id: &str, downloads: u64, likes: u64, tag: Option<&str>) -> CollectionItem {
        serde_json::from_value(json!({
            "id": id, "downloads": downloads, "likes": likes, "pipeline_tag": tag
        }))
        .unwrap()
    }

    #[test]
    fn stats_over_filtered_listing() {
        let items = vec![
            item("acme/a", 500, 3, Some("text-generation")),
            item("acme/b", 50, 9, Some("text-generation")),
            item("beta/c", 5, 1, None),
            item("beta/d", 1000, 0, Some("image-classification")),
        ];
        let kept = filter_min_downloads(&items, 50);
        let s = compute(&kept, 2);

        assert_eq!(s.total, 3);
        assert_eq!(s.total_downloads, 1550);
        assert_eq!(s.total_likes, 12);
        assert!((s.avg_likes - 4.0).abs() < f64::EPSILON);
        assert_eq!(s.top_by_downloads[0].id, "beta/d");
        assert_eq!(s.top_by_likes[0].id, "acme/b");
        assert_eq!(s.by_pipeline_tag[0], ("text-generation".to_string(), 2));
        assert_eq!(s.by_author, vec![("acme".to_string(), 2), ("beta".to_string(), 1)]);
    }

    #[test]
    fn authors_are_sorted_and_distinct() {
        let items = vec![
            item("zeta/a", 1, 0, None),
            item("acme/b", 1, 0, None),
            item("gpt2", 1, 0, None),
            item("acme/c", 1, 0, None),
        ];
        assert_eq!(authors_from_items(&items), vec!["acme", "zeta"]);
    }

    fn org(
        name: &str,
        models: usize,
        downloads: u64,
        followers: Option<u64>,
        plan: Option<&str>,
    ) -> ProfileRecord {
        let mut p = OrganizationProfile {
            organization: name.into(),
            ..Default::default()
        };
        p.api_data.models.count = models;
        p.api_data.models.total_downloads = downloads;
        p.api_data.datasets.count = 1;
        p.follower_info.follower_count = followers;
        p.basic_info.plan = plan.map(str::to_string);
        ProfileRecord::Profile(Box::new(p))
    }

    #[test]
    fn org_stats_skip_failures_and_rank() {
        let records = vec![
            org("acme", 30, 100, Some(5), Some("team")),
            org("beta", 2, 9000, None, None),
            ProfileRecord::Failed(FailedProfile {
                organization: "ghost".into(),
                error: "404".into(),
            }),
            org("gamma", 10, 50, Some(700), Some("team")),
        ];
        let s = compute_orgs(&records, 2);

        assert_eq!((s.total, s.valid, s.failed), (4, 3, 1));
        assert_eq!(s.total_models, 42);
        assert_eq!(s.total_datasets, 3);
        assert_eq!(s.total_followers, 705);
        let names = |v: &[&OrganizationProfile]| {
            v.iter().map(|p| p.organization.clone()).collect::<Vec<_>>()
        };
        assert_eq!(names(&s.top_by_models), vec!["acme", "gamma"]);
        assert_eq!(names(&s.top_by_downloads), vec!["beta", "acme"]);
        assert_eq!(names(&s.top_by_followers), vec!["gamma", "acme"]);
        assert_eq!(
            s.by_plan,
            vec![("team".to_string(), 2), ("unknown".to_string(), 1)]
        );
    }

    #[test]
    fn empty_listing_has_zero_averages() {
        let s = compute(&[], 10);
        assert_eq!(s.total, 0);
        assert_eq!(s.avg_downloads, 0.0);
        assert!(s.by_library.is_empty());
    }
}
