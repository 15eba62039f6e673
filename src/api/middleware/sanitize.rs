//! Input sanitization stages.
//!
//! Both stages rewrite the parsed query and body in place and never reject a
//! request.
//!
//! - [`injection`] drops document-store operator keys (`$gt`, `$where`, ...) and
//!   dotted keys that would address nested fields.
//! - [`script_injection`] escapes angle brackets so stored strings cannot carry
//!   markup.

use axum::{extract::Request, middleware::Next, response::Response};
use serde_json::{Map, Value};

use crate::context::RequestContext;

/// Marker that opens a query operator in the document store.
pub const OPERATOR_MARKER: char = '$';

pub async fn injection(mut req: Request, next: Next) -> Response {
    let removed = RequestContext::update(&mut req, |ctx| {
        let mut removed = strip_operator_keys_in(&mut ctx.query);
        if let Some(body) = ctx.body.as_mut() {
            removed += strip_operator_keys(body);
        }
        removed
    });

    if removed > 0 {
        tracing::warn!(
            removed,
            path = %req.uri().path(),
            "Removed operator keys from request input"
        );
    }

    next.run(req).await
}

pub async fn script_injection(mut req: Request, next: Next) -> Response {
    RequestContext::update(&mut req, |ctx| {
        escape_markup_in(&mut ctx.query);
        if let Some(body) = ctx.body.as_mut() {
            escape_markup(body);
        }
    });
    next.run(req).await
}

fn is_operator_key(key: &str) -> bool {
    key.starts_with(OPERATOR_MARKER) || key.contains('.')
}

/// Recursively removes operator-like keys. Returns how many were removed.
pub fn strip_operator_keys(value: &mut Value) -> usize {
    match value {
        Value::Object(map) => strip_operator_keys_in(map),
        Value::Array(items) => items.iter_mut().map(strip_operator_keys).sum(),
        _ => 0,
    }
}

fn strip_operator_keys_in(map: &mut Map<String, Value>) -> usize {
    let before = map.len();
    map.retain(|key, _| !is_operator_key(key));
    let mut removed = before - map.len();
    for child in map.values_mut() {
        removed += strip_operator_keys(child);
    }
    removed
}

/// Escapes `<` and `>` in every string and object key.
pub fn escape_markup(value: &mut Value) {
    match value {
        Value::String(s) => {
            if let Some(escaped) = escape(s) {
                *s = escaped;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(escape_markup),
        Value::Object(map) => escape_markup_in(map),
        _ => {}
    }
}

fn escape_markup_in(map: &mut Map<String, Value>) {
    if !map.keys().any(|k| escape(k).is_some()) {
        map.values_mut().for_each(escape_markup);
        return;
    }

    for (key, mut child) in std::mem::take(map) {
        escape_markup(&mut child);
        let key = escape(&key).unwrap_or(key);
        map.insert(key, child);
    }
}

/// Returns the escaped string, or `None` when nothing needed escaping.
fn escape(s: &str) -> Option<String> {
    if !s.contains(['<', '>']) {
        return None;
    }
    Some(s.replace('<', "&lt;").replace('>', "&gt;"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_operator_keys_recursively() {
        let mut v = json!({
            "email": { "$gt": "" },
            "password": "pass1234",
            "$where": "sleep(1000)",
            "profile.role": "admin",
            "filters": [{ "$ne": null, "name": "ok" }]
        });

        let removed = strip_operator_keys(&mut v);

        assert_eq!(removed, 4);
        assert_eq!(
            v,
            json!({
                "email": {},
                "password": "pass1234",
                "filters": [{ "name": "ok" }]
            })
        );
    }

    #[test]
    fn test_values_with_marker_are_kept() {
        let mut v = json!({ "price": "$100", "note": "a.b" });
        assert_eq!(strip_operator_keys(&mut v), 0);
        assert_eq!(v, json!({ "price": "$100", "note": "a.b" }));
    }

    #[test]
    fn test_escape_markup() {
        let mut v = json!({
            "name": "<script>alert('x')</script>",
            "tags": ["<b>bold</b>", "plain"],
            "nested": { "<img>": 1, "n": 5 }
        });

        escape_markup(&mut v);

        assert_eq!(
            v,
            json!({
                "name": "&lt;script&gt;alert('x')&lt;/script&gt;",
                "tags": ["&lt;b&gt;bold&lt;/b&gt;", "plain"],
                "nested": { "&lt;img&gt;": 1, "n": 5 }
            })
        );
    }

    #[test]
    fn test_escape_leaves_clean_strings_alone() {
        assert_eq!(escape("The Forest Hiker"), None);
    }
}
