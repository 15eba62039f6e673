//! Body parsing stage.
//!
//! JSON and URL-encoded bodies are read up to the configured cap, parsed, and
//! stored in [`RequestContext::body`]. The request body is then emptied so the
//! parsed (and later sanitized) value is the only copy handlers can reach.
//! Other content types, multipart uploads among them, pass through untouched
//! with [`RequestContext::body`] left unset. Requests without a content type
//! get `{}`.
//!
//! JSON is strict: the top-level value must be an object or an array.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use futures_util::StreamExt;
use serde_json::{Map, Value, json};

use crate::context::{BodyFormat, RequestContext};
use crate::error::AppError;
use crate::utils::query;

#[derive(Debug, Clone, Copy)]
pub struct BodyLimit(pub usize);

pub async fn layer(
    State(BodyLimit(limit)): State<BodyLimit>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(format) = body_format(req.headers()) else {
        // Bodyless requests read as `{}`; other media types stay raw and unset.
        if !req.headers().contains_key(header::CONTENT_TYPE) {
            RequestContext::update(&mut req, |ctx| {
                ctx.body.get_or_insert_with(|| Value::Object(Map::new()));
            });
        }
        return Ok(next.run(req).await);
    };

    if let Some(length) = declared_length(req.headers())
        && length > limit
    {
        return Err(too_large(limit, Some(length)));
    }

    let (mut parts, body) = req.into_parts();
    let raw = read_capped(body, limit).await?;
    let parsed = parse(format, &raw)?;

    parts.headers.remove(header::CONTENT_LENGTH);
    let mut req = Request::from_parts(parts, Body::empty());
    RequestContext::update(&mut req, |ctx| {
        ctx.body = Some(parsed);
        ctx.body_format = Some(format);
    });

    Ok(next.run(req).await)
}

/// Recognizes `application/json`, `application/*+json` and form encoding.
pub fn body_format(headers: &HeaderMap) -> Option<BodyFormat> {
    let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if essence == "application/json"
        || (essence.starts_with("application/") && essence.ends_with("+json"))
    {
        Some(BodyFormat::Json)
    } else if essence == "application/x-www-form-urlencoded" {
        Some(BodyFormat::UrlEncoded)
    } else {
        None
    }
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Reads the whole body, failing as soon as it grows past `limit`.
async fn read_capped(body: Body, limit: usize) -> Result<Vec<u8>, AppError> {
    let mut stream = body.into_data_stream();
    let mut buf = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            AppError::bad_request("Failed to read request body", json!({ "reason": e.to_string() }))
        })?;
        if buf.len() + chunk.len() > limit {
            return Err(too_large(limit, None));
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(buf)
}

fn parse(format: BodyFormat, raw: &[u8]) -> Result<Value, AppError> {
    match format {
        BodyFormat::UrlEncoded => Ok(Value::Object(query::parse(raw))),
        BodyFormat::Json => {
            let first = raw.iter().find(|b| !b.is_ascii_whitespace());
            match first {
                None => Ok(Value::Object(Map::new())),
                // Strict mode: only objects and arrays are accepted at the top level.
                Some(b'{') | Some(b'[') => serde_json::from_slice(raw).map_err(|e| {
                    AppError::bad_request("Invalid JSON body", json!({ "reason": e.to_string() }))
                }),
                Some(_) => Err(AppError::bad_request(
                    "Invalid JSON body",
                    json!({ "reason": "top-level value must be an object or array" }),
                )),
            }
        }
    }
}

fn too_large(limit: usize, length: Option<usize>) -> AppError {
    AppError::payload_too_large(
        "request entity too large",
        json!({ "limit": limit, "length": length }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(content_type: &'static str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        h
    }

    #[test]
    fn test_body_format_detection() {
        assert_eq!(
            body_format(&headers("application/json; charset=utf-8")),
            Some(BodyFormat::Json)
        );
        assert_eq!(
            body_format(&headers("application/merge-patch+json")),
            Some(BodyFormat::Json)
        );
        assert_eq!(
            body_format(&headers("application/x-www-form-urlencoded")),
            Some(BodyFormat::UrlEncoded)
        );
        assert_eq!(body_format(&headers("multipart/form-data; boundary=x")), None);
        assert_eq!(body_format(&HeaderMap::new()), None);
    }

    #[test]
    fn test_parse_json_strict() {
        assert_eq!(
            parse(BodyFormat::Json, br#" {"name":"Jonas"} "#).unwrap(),
            json!({ "name": "Jonas" })
        );
        assert_eq!(parse(BodyFormat::Json, b"   ").unwrap(), json!({}));
        assert!(parse(BodyFormat::Json, b"\"just a string\"").is_err());
        assert!(parse(BodyFormat::Json, b"{\"name\":").is_err());
    }

    #[test]
    fn test_parse_urlencoded() {
        assert_eq!(
            parse(BodyFormat::UrlEncoded, b"name=Jonas&email=j%40example.com").unwrap(),
            json!({ "name": "Jonas", "email": "j@example.com" })
        );
    }

    #[tokio::test]
    async fn test_read_capped() {
        let ok = read_capped(Body::from(vec![b'a'; 10]), 10).await.unwrap();
        assert_eq!(ok.len(), 10);

        let err = read_capped(Body::from(vec![b'a'; 11]), 10).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::PAYLOAD_TOO_LARGE);
    }
}
