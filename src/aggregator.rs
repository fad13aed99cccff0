use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::client::HubClient;
use crate::error::{FetchError, ProfileError, Stage};
use crate::fetcher::{CollectionFilter, CollectionKind, PagedFetcher, PartialFetch};
use crate::parser;
use crate::profile::{ApiData, CollectionSummary, OrganizationProfile};
use crate::settings::Settings;

/// Build one organization profile.
///
/// The page fetch and the three collection walks run concurrently, the walks
/// bounded by `settings.workers` permits. A failed page fetch or a fatal
/// collection error aborts the whole call. A transient collection error only
/// marks that collection incomplete.
pub async fn build_profile(
    org_name: &str,
    settings: &Settings,
) -> Result<OrganizationProfile, ProfileError> {
    let fail = |stage: Stage, source: FetchError| ProfileError {
        org: org_name.to_string(),
        stage,
        source,
    };

    let client = HubClient::new(settings).map_err(|e| fail(Stage::Transport, e))?;
    let semaphore = Arc::new(Semaphore::new(settings.workers.max(1)));

    info!("Building profile for {}", org_name);

    let tasks: Vec<(CollectionKind, JoinHandle<PartialFetch>)> = CollectionKind::ALL
        .into_iter()
        .map(|kind| {
            let client = client.clone();
            let sem = Arc::clone(&semaphore);
            let filter = CollectionFilter::author(org_name);
            let page_size = settings.page_size;
            let handle = tokio::spawn(async move {
                let Ok(_permit) = sem.acquire_owned().await else {
                    return PartialFetch {
                        items: Vec::new(),
                        pages: 0,
                        error: Some(FetchError::transient(kind.endpoint(), "worker pool closed")),
                    };
                };
                PagedFetcher::new(client, kind, &filter, page_size)
                    .collect_partial()
                    .await
            });
            (kind, handle)
        })
        .collect();

    let page = match client.get_page(org_name).await {
        Ok(html) => html,
        Err(e) => {
            for (_, handle) in &tasks {
                handle.abort();
            }
            return Err(fail(Stage::OrganizationPage, e));
        }
    };
    let page = parser::process_page(&page, hub_host(client.base_url()), settings.follower_sample);
    if !page.diagnostics.is_empty() {
        warn!(
            "{}: skipped {} malformed metadata block(s)",
            org_name,
            page.diagnostics.len()
        );
    }

    let mut api_data = ApiData::default();
    let mut incomplete = Vec::new();
    let mut fatal = None;

    for (kind, handle) in tasks {
        let fetched = match handle.await {
            Ok(fetched) => fetched,
            Err(e) => PartialFetch {
                items: Vec::new(),
                pages: 0,
                error: Some(FetchError::transient(kind.endpoint(), e.to_string())),
            },
        };

        let summary = CollectionSummary::from_items(&fetched.items);
        let summary = match fetched.error {
            None => summary,
            Some(e) if e.is_transient() => {
                warn!(
                    "{}: {} incomplete after {} items ({} pages): {}",
                    org_name, kind, summary.count, fetched.pages, e
                );
                incomplete.push(kind);
                summary.mark_incomplete(e.to_string())
            }
            Some(e) => {
                if fatal.is_none() {
                    fatal = Some((kind, e));
                }
                summary
            }
        };
        api_data.set(kind, summary);
    }

    if let Some((kind, e)) = fatal {
        return Err(fail(Stage::Collection(kind), e));
    }

    info!(
        "{}: {} models, {} datasets, {} spaces",
        org_name, api_data.models.count, api_data.datasets.count, api_data.spaces.count
    );

    Ok(OrganizationProfile {
        organization: org_name.to_string(),
        basic_info: page.basic_info,
        follower_info: page.follower_info,
        social_links: page.social_links,
        content: page.content,
        api_data,
        incomplete_collections: incomplete,
    })
}

/// Host part of the base URL, used to tell hub links from external ones.
fn hub_host(base_url: &str) -> &str {
    let rest = base_url.split_once("://").map_or(base_url, |(_, r)| r);
    rest.split('/').next().unwrap_or(rest)
}
