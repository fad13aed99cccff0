pub mod followers;
pub mod identity;
pub mod links;

use serde_json::{Map, Value};

fn get_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn get_bool(obj: &Map<String, Value>, key: &str) -> Option<bool> {
    obj.get(key).and_then(Value::as_bool)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn identity_prefers_org_block() {
        let m = map(json!({
            "org": { "name": "acme", "fullname": "Acme AI", "plan": "enterprise", "isVerified": true },
            "userProfile": { "name": "someone" }
        }));
        let b = identity::extract(&m);
        assert_eq!(b.name.as_deref(), Some("acme"));
        assert_eq!(b.plan.as_deref(), Some("enterprise"));
        assert_eq!(b.is_verified, Some(true));
        assert_eq!(b.is_pro, None);
    }

    #[test]
    fn identity_absent_when_no_block() {
        let b = identity::extract(&map(json!({ "other": 1 })));
        assert!(b.name.is_none());
        assert!(b.is_verified.is_none());
    }

    #[test]
    fn followers_object_form_is_sampled() {
        let list: Vec<_> = (0..15)
            .map(|i| json!({ "user": format!("u{}", i), "avatarUrl": "x" }))
            .collect();
        let m = map(json!({ "followers": { "count": 1234, "followers": list } }));
        let f = followers::extract(&m, 10);
        assert_eq!(f.follower_count, Some(1234));
        assert_eq!(f.sample_followers.len(), 10);
        assert_eq!(f.sample_followers[0].user.as_deref(), Some("u0"));
    }

    #[test]
    fn followers_list_form_uses_num_followers() {
        let m = map(json!({ "followers": [{ "user": "a" }], "numFollowers": 7 }));
        let f = followers::extract(&m, 10);
        assert_eq!(f.follower_count, Some(7));
        assert_eq!(f.sample_followers.len(), 1);
    }

    #[test]
    fn social_links_from_anchors() {
        let html = r#"
            <a href="https://huggingface.co/docs" rel="noopener nofollow">docs</a>
            <a class="x" href="https://twitter.com/acme">tw</a>
            <a href="https://github.com/acme">gh</a>
            <a href="https://github.com/other">gh2</a>
            <a rel="noopener nofollow" href="https://acme.ai">site</a>
        "#;
        let l = links::extract(html, "huggingface.co");
        assert_eq!(l.twitter.as_deref(), Some("https://twitter.com/acme"));
        assert_eq!(l.github.as_deref(), Some("https://github.com/acme"));
        assert_eq!(l.website.as_deref(), Some("https://acme.ai"));
    }
}
