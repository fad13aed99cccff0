use serde::{Deserialize, Serialize};

use crate::fetcher::{CollectionItem, CollectionKind};

// ── Page-derived ──

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    pub name: Option<String>,
    pub fullname: Option<String>,
    pub plan: Option<String>,
    pub is_verified: Option<bool>,
    pub is_enterprise: Option<bool>,
    pub is_pro: Option<bool>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Follower {
    pub user: Option<String>,
    pub fullname: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FollowerInfo {
    pub follower_count: Option<u64>,
    pub sample_followers: Vec<Follower>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialLinks {
    pub twitter: Option<String>,
    pub github: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub card: Option<serde_json::Value>,
}

// ── API-derived ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: String,
    pub likes: u64,
    pub downloads: u64,
    pub pipeline_tag: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub count: usize,
    pub total_likes: u64,
    pub total_downloads: u64,
    pub incomplete: bool,
    pub error: Option<String>,
    pub items: Vec<ItemSummary>,
}

impl CollectionSummary {
    /// Totals are computed over exactly the items given.
    pub fn from_items(items: &[CollectionItem]) -> Self {
        CollectionSummary {
            count: items.len(),
            total_likes: items.iter().map(|i| i.likes).sum(),
            total_downloads: items.iter().map(|i| i.downloads).sum(),
            incomplete: false,
            error: None,
            items: items
                .iter()
                .map(|i| ItemSummary {
                    id: i.id.clone(),
                    likes: i.likes,
                    downloads: i.downloads,
                    pipeline_tag: i.pipeline_tag.clone(),
                    tags: i.tags.iter().cloned().collect(),
                })
                .collect(),
        }
    }

    pub fn mark_incomplete(mut self, reason: String) -> Self {
        self.incomplete = true;
        self.error = Some(reason);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiData {
    pub models: CollectionSummary,
    pub datasets: CollectionSummary,
    pub spaces: CollectionSummary,
}

impl ApiData {
    pub fn get(&self, kind: CollectionKind) -> &CollectionSummary {
        match kind {
            CollectionKind::Models => &self.models,
            CollectionKind::Datasets => &self.datasets,
            CollectionKind::Spaces => &self.spaces,
        }
    }

    pub fn set(&mut self, kind: CollectionKind, summary: CollectionSummary) {
        match kind {
            CollectionKind::Models => self.models = summary,
            CollectionKind::Datasets => self.datasets = summary,
            CollectionKind::Spaces => self.spaces = summary,
        }
    }
}

/// The output artifact for one organization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizationProfile {
    pub organization: String,
    pub basic_info: BasicInfo,
    pub follower_info: FollowerInfo,
    pub social_links: SocialLinks,
    pub content: PageContent,
    pub api_data: ApiData,
    pub incomplete_collections: Vec<CollectionKind>,
}

impl OrganizationProfile {
    pub fn is_complete(&self) -> bool {
        self.incomplete_collections.is_empty()
    }
}

/// Written in place of a profile when the organization could not be built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedProfile {
    pub organization: String,
    pub error: String,
}

/// One line of an organizations JSONL file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfileRecord {
    Failed(FailedProfile),
    Profile(Box<OrganizationProfile>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(id: &str, downloads: u64, likes: u64) -> CollectionItem {
        serde_json::from_value(json!({ "id": id, "downloads": downloads, "likes": likes }))
            .unwrap()
    }

    #[test]
    fn summary_totals_match_items() {
        let items = vec![item("a", 5, 1), item("b", 7, 0), item("c", 0, 4)];
        let s = CollectionSummary::from_items(&items);
        assert_eq!(s.count, 3);
        assert_eq!(s.total_downloads, 12);
        assert_eq!(s.total_likes, 5);
        assert!(!s.incomplete);
    }

    #[test]
    fn incomplete_collections_serialize_lowercase() {
        let profile = OrganizationProfile {
            organization: "acme".into(),
            incomplete_collections: vec![CollectionKind::Models],
            ..Default::default()
        };
        let v = serde_json::to_value(&profile).unwrap();
        assert_eq!(v["incomplete_collections"], json!(["models"]));
        assert_eq!(v["basic_info"]["plan"], json!(null));
    }

    #[test]
    fn records_tell_failures_from_profiles() {
        let ok = ProfileRecord::Profile(Box::new(OrganizationProfile {
            organization: "acme".into(),
            ..Default::default()
        }));
        let failed = ProfileRecord::Failed(FailedProfile {
            organization: "ghost".into(),
            error: "404 Not Found".into(),
        });

        for record in [ok, failed] {
            let line = serde_json::to_string(&record).unwrap();
            let back: ProfileRecord = serde_json::from_str(&line).unwrap();
            assert_eq!(back, record);
        }
    }
}
