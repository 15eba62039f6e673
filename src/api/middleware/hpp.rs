//! HTTP parameter pollution guard.
//!
//! A repeated query key parses to an array. Unless the key is allow-listed
//! (range filters such as `duration` or `price`), only its last value is kept
//! and the original array is moved to [`RequestContext::query_polluted`].
//! URL-encoded bodies get the same treatment; JSON bodies are left alone since
//! arrays there are intentional.
//!
//! Once done, the request URI's query is rewritten from the sanitized context
//! so `Query<T>` extractors cannot reach the raw input.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde_json::{Map, Value};

use crate::context::{BodyFormat, RequestContext};

#[derive(Debug, Clone)]
pub struct Whitelist(pub Arc<HashSet<String>>);

impl Whitelist {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(Arc::new(keys.into_iter().map(Into::into).collect()))
    }

    pub fn allows(&self, key: &str) -> bool {
        self.0.contains(key)
    }
}

pub async fn layer(State(whitelist): State<Whitelist>, mut req: Request, next: Next) -> Response {
    RequestContext::update(&mut req, |ctx| {
        let polluted = collapse(&mut ctx.query, &whitelist);
        ctx.query_polluted.extend(polluted);

        if ctx.body_format == Some(BodyFormat::UrlEncoded)
            && let Some(Value::Object(body)) = ctx.body.as_mut()
        {
            collapse(body, &whitelist);
        }
    });
    // Last stage to rewrite the query; hand the cleaned copy to URI readers.
    RequestContext::sync_query(&mut req);
    next.run(req).await
}

/// Collapses non-allow-listed arrays to their last element, at any depth
/// below a non-allow-listed key. Returns the original top-level arrays.
pub fn collapse(map: &mut Map<String, Value>, whitelist: &Whitelist) -> Map<String, Value> {
    let mut polluted = Map::new();
    let mut emptied = Vec::new();

    for (key, value) in map.iter_mut() {
        if whitelist.allows(key) {
            continue;
        }
        if let Value::Array(items) = value {
            polluted.insert(key.clone(), Value::Array(items.clone()));
            match items.pop() {
                Some(last) => *value = last,
                None => emptied.push(key.clone()),
            }
        }
        collapse_nested(value);
    }

    for key in emptied {
        map.remove(&key);
    }
    polluted
}

fn collapse_nested(value: &mut Value) {
    let Value::Object(map) = value else {
        return;
    };
    for child in map.values_mut() {
        if let Value::Array(items) = child {
            *child = items.pop().unwrap_or(Value::Null);
        }
        collapse_nested(child);
    }
}
