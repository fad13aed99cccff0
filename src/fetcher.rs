use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::client::HubClient;
use crate::error::FetchError;

/// Remote API refuses `limit` above this.
pub const MAX_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Models,
    Datasets,
    Spaces,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 3] = [
        CollectionKind::Models,
        CollectionKind::Datasets,
        CollectionKind::Spaces,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CollectionKind::Models => "models",
            CollectionKind::Datasets => "datasets",
            CollectionKind::Spaces => "spaces",
        }
    }

    pub fn endpoint(self) -> String {
        format!("/api/{}", self.as_str())
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record of a collection listing. Unknown fields ride along in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionItem {
    pub id: String,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

/// Query parameters accepted by the listing endpoints.
#[derive(Debug, Clone, Default)]
pub struct CollectionFilter {
    pub author: Option<String>,
    pub search: Option<String>,
    pub filter: Option<String>,
    pub pipeline_tag: Option<String>,
    pub library: Option<String>,
    pub language: Option<String>,
    pub tags: Vec<String>,
    pub sort: Option<String>,
    pub direction: Option<i32>,
    pub full: bool,
}

impl CollectionFilter {
    pub fn author(name: &str) -> Self {
        CollectionFilter {
            author: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn to_query(&self) -> Vec<(String, String)> {
        let mut q = Vec::new();
        let mut push = |k: &str, v: &Option<String>| {
            if let Some(v) = v {
                q.push((k.to_string(), v.clone()));
            }
        };
        push("author", &self.author);
        push("search", &self.search);
        push("filter", &self.filter);
        push("pipeline_tag", &self.pipeline_tag);
        push("library", &self.library);
        push("language", &self.language);
        push("sort", &self.sort);
        if !self.tags.is_empty() {
            q.push(("tags".into(), self.tags.join(",")));
        }
        if let Some(d) = self.direction {
            q.push(("direction".into(), d.to_string()));
        }
        if self.full {
            q.push(("full".into(), "true".into()));
        }
        q
    }
}

/// Lazy limit/offset walk over one collection listing.
///
/// Each `next_page` call issues one request. The walk ends after a short or
/// empty page, or once `max_items` have been returned. A failed page leaves
/// `offset` untouched, so `resume_at(offset)` restarts exactly there.
/// A page that starts with the same id as the one before it means the server
/// ignored `offset`; the walk stops with a fatal error instead of looping.
pub struct PagedFetcher {
    client: HubClient,
    kind: CollectionKind,
    query: Vec<(String, String)>,
    page_size: usize,
    max_items: Option<usize>,
    offset: usize,
    last_first_id: Option<String>,
    done: bool,
}

/// Items gathered before the walk ended, and the error that ended it early.
pub struct PartialFetch {
    pub items: Vec<CollectionItem>,
    pub pages: usize,
    pub error: Option<FetchError>,
}

impl PagedFetcher {
    pub fn new(
        client: HubClient,
        kind: CollectionKind,
        filter: &CollectionFilter,
        page_size: usize,
    ) -> Self {
        PagedFetcher {
            client,
            kind,
            query: filter.to_query(),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            max_items: None,
            offset: 0,
            last_first_id: None,
            done: false,
        }
    }

    /// Stop after `n` items in total.
    pub fn with_max_items(mut self, n: usize) -> Self {
        self.max_items = Some(n);
        self.done = n == 0;
        self
    }

    /// Restart a walk at a previously reported `offset`.
    pub fn resume_at(mut self, offset: usize) -> Self {
        self.offset = offset;
        self.done = self.max_items.is_some_and(|max| offset >= max);
        self
    }

    /// Number of items returned by completed pages.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub async fn next_page(&mut self) -> Result<Option<Vec<CollectionItem>>, FetchError> {
        if self.done {
            return Ok(None);
        }

        let limit = match self.max_items {
            Some(max) => self.page_size.min(max.saturating_sub(self.offset)),
            None => self.page_size,
        };

        let mut query = self.query.clone();
        query.push(("limit".into(), limit.to_string()));
        query.push(("offset".into(), self.offset.to_string()));

        let page: Vec<CollectionItem> = self
            .client
            .get_json(&self.kind.endpoint(), &query)
            .await?;

        debug!(
            "{}: page at offset {} returned {} items",
            self.kind,
            self.offset,
            page.len()
        );

        if let Some(first) = page.first() {
            if self.last_first_id.as_deref() == Some(first.id.as_str()) {
                self.done = true;
                return Err(FetchError::fatal(
                    self.kind.endpoint(),
                    format!("offset {} repeated page starting at {}", self.offset, first.id),
                ));
            }
            self.last_first_id = Some(first.id.clone());
        }

        self.offset += page.len();
        let capped = self.max_items.is_some_and(|max| self.offset >= max);
        if page.len() < limit || capped {
            self.done = true;
        }
        if page.is_empty() {
            return Ok(None);
        }
        Ok(Some(page))
    }

    /// Drain the walk, keeping everything fetched before a failure.
    pub async fn collect_partial(&mut self) -> PartialFetch {
        let mut items = Vec::new();
        let mut pages = 0;
        loop {
            match self.next_page().await {
                Ok(Some(page)) => {
                    pages += 1;
                    items.extend(page);
                }
                Ok(None) => break,
                Err(e) => {
                    return PartialFetch {
                        items,
                        pages,
                        error: Some(e),
                    }
                }
            }
        }
        info!("{}: fetched {} items in {} pages", self.kind, items.len(), pages);
        PartialFetch {
            items,
            pages,
            error: None,
        }
    }
}
