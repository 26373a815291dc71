//! Permissive key/value parsing for the property columns of `SHOW ROUTINE LOAD`.
//!
//! Store versions render `JobProperties` and `DataSourceProperties` either as
//! JSON objects or as loose `key=value` lists. The parsers below are tried in
//! order and the first one that yields at least one pair wins.

use std::collections::BTreeMap;

use serde_json::Value;

pub type PropertyMap = BTreeMap<String, String>;

/// A named way of turning property text into pairs.
pub struct PropertyParser {
    pub name: &'static str,
    pub parse: fn(&str) -> Option<PropertyMap>,
}

/// Parsers in priority order.
pub const PROPERTY_PARSERS: &[PropertyParser] = &[
    PropertyParser { name: "structured", parse: parse_structured },
    PropertyParser { name: "comma_pairs", parse: parse_comma_pairs },
    PropertyParser { name: "whitespace_pairs", parse: parse_whitespace_pairs },
];

/// Parse property text with the first parser that produces a non-empty map.
/// Unparseable text yields an empty map.
pub fn parse_props(text: &str) -> PropertyMap {
    let text = text.trim();
    if text.is_empty() {
        return PropertyMap::new();
    }
    PROPERTY_PARSERS
        .iter()
        .find_map(|p| (p.parse)(text).filter(|m| !m.is_empty()))
        .unwrap_or_default()
}

/// JSON object decoding, attempted only when the text looks like an object or array.
pub fn parse_structured(text: &str) -> Option<PropertyMap> {
    let looks_structured =
        (text.starts_with('{') && text.ends_with('}')) || text.starts_with('[');
    if !looks_structured {
        return None;
    }
    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(text) else {
        return None;
    };
    Some(obj.iter().map(|(k, v)| (k.clone(), value_text(v))).collect())
}

/// `k1=v1, k2="v2"` with surrounding quotes trimmed from values.
pub fn parse_comma_pairs(text: &str) -> Option<PropertyMap> {
    Some(split_pairs(text.split(',')))
}

/// `k1=v1 k2=v2` as a last resort.
pub fn parse_whitespace_pairs(text: &str) -> Option<PropertyMap> {
    Some(split_pairs(text.split_whitespace()))
}

fn split_pairs<'a>(parts: impl Iterator<Item = &'a str>) -> PropertyMap {
    parts
        .filter_map(|part| {
            let (k, v) = part.trim().split_once('=')?;
            let k = k.trim();
            if k.is_empty() {
                return None;
            }
            Some((k.to_string(), trim_quotes(v).to_string()))
        })
        .collect()
}

fn trim_quotes(v: &str) -> &str {
    v.trim_matches(|c| c == ' ' || c == '"' || c == '\'')
}

/// Scalars render as plain text; nested values keep their JSON form.
fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
