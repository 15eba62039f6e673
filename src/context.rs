//! Per-request annotation record threaded through the pipeline.
//!
//! The context lives in the request's extension map. It is created when the
//! request arrives (with the query already parsed) and dropped with the
//! request, so nothing is ever shared between requests. Each field is written
//! by exactly one stage; later stages and route handlers read it.

use std::collections::HashMap;

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::uri::PathAndQuery;
use axum::http::Uri;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::error::AppError;
use crate::utils::query;

/// Where the parsed body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    Json,
    UrlEncoded,
}

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Parsed query string. Written on arrival, rewritten by the sanitizers.
    pub query: Map<String, Value>,
    /// Repeated query values the pollution guard collapsed, as originally sent.
    pub query_polluted: Map<String, Value>,
    /// Parsed body; written by the body parser, `None` before it ran.
    pub body: Option<Value>,
    pub body_format: Option<BodyFormat>,
    /// Written by the cookie parser.
    pub cookies: HashMap<String, String>,
    /// Written by the context annotation stage.
    pub received_at: Option<DateTime<Utc>>,
}

impl RequestContext {
    /// Creates the context for a freshly arrived request.
    pub fn new(uri: &Uri) -> Self {
        Self {
            query: uri.query().map(|q| query::parse(q.as_bytes())).unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Runs `f` against the request's context, creating it on first use.
    pub fn update<R>(req: &mut Request, f: impl FnOnce(&mut RequestContext) -> R) -> R {
        let mut ctx = match req.extensions_mut().remove::<RequestContext>() {
            Some(ctx) => ctx,
            None => RequestContext::new(req.uri()),
        };
        let out = f(&mut ctx);
        req.extensions_mut().insert(ctx);
        out
    }

    /// Rewrites the request URI's query from the context's query.
    ///
    /// Extractors that read the URI directly, such as `Query<T>`, then see the
    /// same sanitized input as [`RequestContext::query`].
    pub fn sync_query(req: &mut Request) {
        if req.uri().query().is_none() {
            return;
        }
        let Some(ctx) = req.extensions().get::<RequestContext>() else {
            return;
        };

        let query = query::serialize(&ctx.query);
        let path = req.uri().path();
        let rebuilt = if query.is_empty() {
            path.parse::<PathAndQuery>()
        } else {
            format!("{path}?{query}").parse::<PathAndQuery>()
        };

        let mut parts = req.uri().clone().into_parts();
        parts.path_and_query = match rebuilt {
            Ok(pq) => Some(pq),
            Err(e) => {
                tracing::warn!(path, "Dropping query that could not be re-encoded: {e}");
                parts.path_and_query.as_ref().and_then(|pq| pq.path().parse().ok())
            }
        };
        match Uri::from_parts(parts) {
            Ok(uri) => *req.uri_mut() = uri,
            Err(e) => tracing::warn!("Failed to rebuild request URI: {e}"),
        }
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Deserializes the sanitized body. Missing bodies read as `{}`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if the body does not fit `T`.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        let body = self
            .body
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new()));
        serde_json::from_value(body)
            .map_err(|e| AppError::bad_request("Invalid input data", json!({ "reason": e.to_string() })))
    }

    /// Deserializes the sanitized query. Values are strings, as sent.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if the query does not fit `T`.
    pub fn query_as<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        serde_json::from_value(Value::Object(self.query.clone()))
            .map_err(|e| AppError::bad_request("Invalid query", json!({ "reason": e.to_string() })))
    }
}

/// Hands route handlers the sanitized context.
///
/// Rejects with an internal error when the handler runs outside the pipeline,
/// since unsanitized input must never be passed off as sanitized.
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| {
                AppError::internal(
                    "Request context missing",
                    json!({ "path": parts.uri.path() }),
                )
            })
    }
}
