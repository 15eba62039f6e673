//! Cookie parsing stage.

use std::collections::HashMap;

use axum::{
    extract::Request,
    http::{HeaderMap, header::COOKIE},
    middleware::Next,
    response::Response,
};

use crate::context::RequestContext;

/// Parses every `Cookie` header into [`RequestContext::cookies`].
pub async fn layer(mut req: Request, next: Next) -> Response {
    let cookies = parse_cookies(req.headers());
    RequestContext::update(&mut req, |ctx| ctx.cookies = cookies);
    next.run(req).await
}

/// Splits `name=value` pairs on `;`.
///
/// - the first occurrence of a name wins
/// - surrounding double quotes are stripped from values
/// - values are percent-decoded; undecodable values are kept as sent
/// - pairs without `=` are ignored
pub fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut cookies = HashMap::new();

    let pairs = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|line| line.split(';'));

    for pair in pairs {
        let mut parts = pair.splitn(2, '=');
        let (Some(name), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() || cookies.contains_key(name) {
            continue;
        }

        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        let value = percent_encoding::percent_decode_str(value)
            .decode_utf8()
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| value.to_string());

        cookies.insert(name.to_string(), value);
    }

    cookies
}
