use std::sync::LazyLock;

use regex::Regex;

use crate::profile::SocialLinks;

static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<a\s[^>]*>").unwrap());
static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap());
static EXTERNAL_REL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\brel\s*=\s*["']noopener nofollow["']"#).unwrap());

/// First twitter/x, github and external website link among the page's anchors.
pub fn extract(html: &str, hub_host: &str) -> SocialLinks {
    let mut links = SocialLinks::default();

    for anchor in ANCHOR_RE.find_iter(html).map(|m| m.as_str()) {
        let Some(href) = HREF_RE
            .captures(anchor)
            .and_then(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| m.as_str().replace("&amp;", "&"))
        else {
            continue;
        };

        match classify_link(&href) {
            Some("twitter") if links.twitter.is_none() => links.twitter = Some(href),
            Some("github") if links.github.is_none() => links.github = Some(href),
            None if links.website.is_none()
                && EXTERNAL_REL_RE.is_match(anchor)
                && href.starts_with("http")
                && !href.contains(hub_host) =>
            {
                links.website = Some(href)
            }
            _ => {}
        }
    }

    links
}

fn classify_link(url: &str) -> Option<&'static str> {
    let lower = url.to_lowercase();
    if lower.contains("twitter.com/") || lower.contains("://x.com/") {
        Some("twitter")
    } else if lower.contains("github.com/") {
        Some("github")
    } else {
        None
    }
}
