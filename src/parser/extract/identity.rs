use serde_json::{Map, Value};

use super::{get_bool, get_str};
use crate::profile::{BasicInfo, PageContent};

/// Organization pages carry `org`; user-style pages carry `userProfile`.
const IDENTITY_KEYS: &[&str] = &["org", "userProfile"];

pub fn extract(metadata: &Map<String, Value>) -> BasicInfo {
    let Some(ident) = IDENTITY_KEYS
        .iter()
        .find_map(|k| metadata.get(*k).and_then(Value::as_object))
    else {
        return BasicInfo::default();
    };

    BasicInfo {
        name: get_str(ident, "name"),
        fullname: get_str(ident, "fullname"),
        plan: get_str(ident, "plan"),
        is_verified: get_bool(ident, "isVerified"),
        is_enterprise: get_bool(ident, "isEnterprise"),
        is_pro: get_bool(ident, "isPro"),
        created_at: get_str(ident, "createdAt"),
    }
}

pub fn content(metadata: &Map<String, Value>) -> PageContent {
    PageContent {
        card: metadata.get("cardData").filter(|v| !v.is_null()).cloned(),
    }
}
