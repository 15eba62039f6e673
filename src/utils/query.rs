//! Extended query-string parsing.
//!
//! Produces a JSON object from `application/x-www-form-urlencoded` input,
//! understanding bracket nesting the way browser forms and API clients use it:
//!
//! - `a=1` → `{"a": "1"}`
//! - `a=1&a=2` → `{"a": ["1", "2"]}`
//! - `price[gte]=500` → `{"price": {"gte": "500"}}`
//! - `tags[]=x` → `{"tags": ["x"]}`
//!
//! Keys with unbalanced brackets or nesting deeper than [`MAX_DEPTH`] are kept
//! as literal keys. [`serialize`] writes a parsed object back in the same
//! notation.

use serde_json::{Map, Value};

/// Maximum number of bracket segments after the base key.
pub const MAX_DEPTH: usize = 5;

/// Parses a raw query or form body into a JSON object.
pub fn parse(raw: &[u8]) -> Map<String, Value> {
    let mut root = Map::new();
    for (key, value) in url::form_urlencoded::parse(raw) {
        if key.is_empty() {
            continue;
        }
        let path = split_key(&key);
        insert(&mut root, &path, Value::String(value.into_owned()));
    }
    root
}

/// Encodes a parsed object back into a query string.
///
/// Arrays become repeated keys and objects become bracket paths, so
/// `parse(serialize(m).as_bytes())` yields `m` for anything `parse` produced.
/// Empty objects and arrays are omitted.
pub fn serialize(map: &Map<String, Value>) -> String {
    let mut out = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in map {
        append(&mut out, key, value);
    }
    out.finish()
}

fn append(out: &mut url::form_urlencoded::Serializer<'_, String>, key: &str, value: &Value) {
    match value {
        Value::String(s) => {
            out.append_pair(key, s);
        }
        Value::Array(items) => {
            for item in items {
                append(out, key, item);
            }
        }
        Value::Object(map) => {
            for (child, value) in map {
                append(out, &format!("{key}[{child}]"), value);
            }
        }
        Value::Null => {
            out.append_pair(key, "");
        }
        other => {
            out.append_pair(key, &other.to_string());
        }
    }
}

/// Splits `a[b][c]` into `["a", "b", "c"]`.
fn split_key(key: &str) -> Vec<String> {
    let literal = || vec![key.to_string()];

    let Some(open) = key.find('[') else {
        return literal();
    };
    if open == 0 {
        return literal();
    }

    let mut segments = vec![key[..open].to_string()];
    let mut rest = &key[open..];
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            return literal();
        };
        segments.push(inner[..close].to_string());
        rest = &inner[close + 1..];
    }

    if !rest.is_empty() || segments.len() > MAX_DEPTH + 1 {
        return literal();
    }
    segments
}

fn insert(map: &mut Map<String, Value>, path: &[String], value: Value) {
    let Some((head, tail)) = path.split_first() else {
        return;
    };

    match tail {
        [] => merge_leaf(map, head, value),
        [last] if last.is_empty() => append_item(map, head, value),
        _ => {
            let child = map
                .entry(head.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            // A scalar already sits here; nested keys under it are dropped.
            if let Value::Object(child) = child {
                insert(child, tail, value);
            }
        }
    }
}

/// Repeated keys collect into an array in arrival order.
fn merge_leaf(map: &mut Map<String, Value>, key: &str, value: Value) {
    match map.get_mut(key) {
        None => {
            map.insert(key.to_string(), value);
        }
        Some(Value::Array(items)) => items.push(value),
        Some(Value::Object(_)) => {}
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

fn append_item(map: &mut Map<String, Value>, key: &str, value: Value) {
    match map.get_mut(key) {
        None => {
            map.insert(key.to_string(), Value::Array(vec![value]));
        }
        Some(_) => merge_leaf(map, key, value),
    }
}
