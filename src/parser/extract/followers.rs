use serde_json::{Map, Value};

use super::get_str;
use crate::profile::{Follower, FollowerInfo};

pub fn extract(metadata: &Map<String, Value>, sample: usize) -> FollowerInfo {
    // Either {"count": n, "followers": [...]} or a bare list next to "numFollowers".
    let (count, list) = match metadata.get("followers") {
        Some(Value::Object(obj)) => (
            obj.get("count").and_then(Value::as_u64),
            obj.get("followers").and_then(Value::as_array),
        ),
        Some(Value::Array(list)) => (None, Some(list)),
        _ => (None, None),
    };
    let count = count.or_else(|| metadata.get("numFollowers").and_then(Value::as_u64));

    let sample_followers = list
        .map(|l| {
            l.iter()
                .filter_map(Value::as_object)
                .take(sample)
                .map(|f| Follower {
                    user: get_str(f, "user"),
                    fullname: get_str(f, "fullname"),
                    avatar_url: get_str(f, "avatarUrl"),
                })
                .collect()
        })
        .unwrap_or_default();

    FollowerInfo {
        follower_count: count,
        sample_followers,
    }
}
