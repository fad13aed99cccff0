pub mod blocks;
pub mod extract;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::MalformedBlock;
use crate::profile::{BasicInfo, FollowerInfo, PageContent, SocialLinks};

/// Merged `data-props` mapping plus the blocks that had to be skipped.
#[derive(Debug, Default)]
pub struct ExtractedMetadata {
    pub metadata: Map<String, Value>,
    pub block_count: usize,
    pub diagnostics: Vec<MalformedBlock>,
}

/// Everything the organization page contributes to a profile.
#[derive(Debug, Default)]
pub struct PageData {
    pub basic_info: BasicInfo,
    pub follower_info: FollowerInfo,
    pub social_links: SocialLinks,
    pub content: PageContent,
    pub diagnostics: Vec<MalformedBlock>,
}

/// Locate, decode and merge all metadata blocks in document order.
pub fn extract_metadata(html: &str) -> ExtractedMetadata {
    let found = blocks::find_blocks(html);
    let mut out = ExtractedMetadata {
        block_count: found.len(),
        ..Default::default()
    };

    for block in &found {
        match blocks::decode_block(block) {
            Ok(map) => {
                debug!("block #{}: {} keys", block.index, map.len());
                blocks::merge_into(&mut out.metadata, map);
            }
            Err(e) => {
                warn!("{}", e);
                out.diagnostics.push(e);
            }
        }
    }

    out
}

/// Two-pass pipeline: attribute blocks → merged mapping → profile fields.
pub fn process_page(html: &str, hub_host: &str, follower_sample: usize) -> PageData {
    let extracted = extract_metadata(html);
    debug!(
        "{} metadata blocks, {} keys after merge",
        extracted.block_count,
        extracted.metadata.len()
    );
    let m = &extracted.metadata;

    PageData {
        basic_info: extract::identity::extract(m),
        follower_info: extract::followers::extract(m, follower_sample),
        social_links: extract::links::extract(html, hub_host),
        content: extract::identity::content(m),
        diagnostics: extracted.diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::escape::escape;
    use serde_json::json;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    fn embed(value: &Value) -> String {
        let json = value.to_string();
        format!(r#"<div data-props="{}"></div>"#, escape(&json))
    }

    #[test]
    fn entity_round_trip_restores_mapping() {
        let original = json!({
            "name": "R&D <lab>",
            "quote": "it's \"quoted\"",
            "nested": { "list": [1, 2, 3], "flag": true },
            "unicode": "caf\u{e9}"
        });
        let html = format!("<html><body>{}</body></html>", embed(&original));
        let out = extract_metadata(&html);
        assert!(out.diagnostics.is_empty());
        assert_eq!(Value::Object(out.metadata), original);
    }

    #[test]
    fn overlapping_keys_later_block_wins() {
        let html = format!(
            "{}{}",
            embed(&json!({ "a": 1, "shared": "first" })),
            embed(&json!({ "b": 2, "shared": "second" }))
        );
        let out = extract_metadata(&html);
        assert_eq!(out.block_count, 2);
        assert_eq!(
            Value::Object(out.metadata),
            json!({ "a": 1, "b": 2, "shared": "second" })
        );
    }

    #[test]
    fn no_blocks_yields_empty_mapping() {
        let out = extract_metadata("<html><body><p>nothing here</p></body></html>");
        assert_eq!(out.block_count, 0);
        assert!(out.metadata.is_empty());
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn malformed_block_is_skipped_not_fatal() {
        let html = format!(
            r#"{}<div data-props="{{not json"></div>{}"#,
            embed(&json!({ "a": 1 })),
            embed(&json!({ "c": 3 }))
        );
        let out = extract_metadata(&html);
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].index, 1);
        assert_eq!(Value::Object(out.metadata), json!({ "a": 1, "c": 3 }));
    }

    #[test]
    fn org_page_fixture() {
        let page = process_page(&fixture("org_page"), "huggingface.co", 10);
        assert_eq!(page.basic_info.name.as_deref(), Some("acme-ai"));
        assert_eq!(page.basic_info.fullname.as_deref(), Some("Acme AI"));
        assert_eq!(page.basic_info.plan.as_deref(), Some("team"));
        assert_eq!(page.basic_info.is_verified, Some(true));
        assert_eq!(page.follower_info.follower_count, Some(4821));
        assert_eq!(page.follower_info.sample_followers.len(), 2);
        assert_eq!(page.social_links.github.as_deref(), Some("https://github.com/acme-ai"));
        assert_eq!(page.social_links.website.as_deref(), Some("https://acme.ai"));
        assert!(page.content.card.is_some());
        assert_eq!(page.diagnostics.len(), 1);
    }
}
