use std::borrow::Cow;
use std::sync::LazyLock;

use quick_xml::escape::{resolve_html5_entity, unescape_with};
use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::error::MalformedBlock;

static PROPS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\sdata-props\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*);").unwrap()
});

/// Raw, still entity-encoded attribute value, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedBlock {
    pub index: usize,
    pub raw: String,
}

pub fn find_blocks(html: &str) -> Vec<EmbeddedBlock> {
    PROPS_RE
        .captures_iter(html)
        .enumerate()
        .filter_map(|(index, caps)| {
            let raw = caps.get(1).or_else(|| caps.get(2))?.as_str().to_string();
            Some(EmbeddedBlock { index, raw })
        })
        .collect()
}

/// Reverse entity escaping and parse as a JSON object.
pub fn decode_block(block: &EmbeddedBlock) -> Result<Map<String, Value>, MalformedBlock> {
    let malformed = |reason: String| MalformedBlock {
        index: block.index,
        reason,
    };

    let text = unescape_attr(&block.raw);
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(malformed(format!("expected JSON object, got {}", kind_of(&other)))),
        Err(e) => Err(malformed(format!("invalid JSON: {}", e))),
    }
}

/// HTML attribute unescaping. Bare `&` and unknown references stay literal.
fn unescape_attr(raw: &str) -> Cow<'_, str> {
    match unescape_with(raw, resolve_html5_entity) {
        Ok(text) => text,
        Err(_) => ENTITY_RE.replace_all(raw, |caps: &Captures| {
            resolve_reference(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        }),
    }
}

fn resolve_reference(name: &str) -> Option<String> {
    let Some(num) = name.strip_prefix('#') else {
        return resolve_html5_entity(name).map(str::to_string);
    };
    let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => num.parse().ok()?,
    };
    char::from_u32(code).map(String::from)
}

/// Later blocks overwrite earlier ones key by key.
pub fn merge_into(target: &mut Map<String, Value>, block: Map<String, Value>) {
    for (key, value) in block {
        target.insert(key, value);
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
