//! Rate limiting stage for API paths.
//!
//! Counts requests per client IP in fixed windows (see
//! [`crate::infrastructure::rate_limiter`]). Paths outside the API prefix are
//! never counted.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tower_governor::key_extractor::{KeyExtractor, PeerIpKeyExtractor, SmartIpKeyExtractor};

use crate::error::AppError;
use crate::infrastructure::{Decision, RateLimiter};

/// Fixed message returned once a client exhausts its window.
pub const LIMIT_MESSAGE: &str = "Too many requests from this IP, please try again in an hour!";

/// Clients whose IP cannot be determined share this bucket.
const UNIDENTIFIED_CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// How the client identity is derived from a request.
#[derive(Debug, Clone, Copy)]
pub enum ClientIdentity {
    /// Socket peer address.
    Peer,
    /// `X-Forwarded-For` / `X-Real-IP` / `Forwarded`, falling back to the peer.
    /// Use only behind a trusted reverse proxy.
    Forwarded,
}

impl ClientIdentity {
    pub fn new(behind_proxy: bool) -> Self {
        if behind_proxy {
            Self::Forwarded
        } else {
            Self::Peer
        }
    }

    fn key(self, req: &Request) -> IpAddr {
        let key = match self {
            Self::Peer => PeerIpKeyExtractor.extract(req),
            Self::Forwarded => SmartIpKeyExtractor.extract(req),
        };
        key.unwrap_or_else(|_| {
            tracing::debug!("Client IP unavailable, using shared rate-limit bucket");
            UNIDENTIFIED_CLIENT
        })
    }
}

#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: RateLimiter,
    pub identity: ClientIdentity,
    pub prefix: Arc<str>,
}

/// Whether `path` is `prefix` itself or lies below it.
pub fn is_under_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Admits or rejects API requests.
///
/// Admitted responses carry `X-RateLimit-Limit`, `X-RateLimit-Remaining` and
/// `X-RateLimit-Reset` (Unix seconds). The request past the limit fails with
/// `429 Too Many Requests` and [`LIMIT_MESSAGE`].
pub async fn layer(State(st): State<RateLimitState>, req: Request, next: Next) -> Response {
    if !is_under_prefix(req.uri().path(), &st.prefix) {
        return next.run(req).await;
    }

    let client = st.identity.key(&req);
    let limit = st.limiter.max_requests();

    match st.limiter.check(client) {
        Decision::Allowed {
            remaining,
            reset_after,
        } => {
            let mut response = next.run(req).await;
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            headers.insert("x-ratelimit-reset", HeaderValue::from(reset_at(reset_after)));
            response
        }
        Decision::Limited { reset_after } => {
            tracing::warn!(%client, path = %req.uri().path(), "Rate limit exceeded");
            metrics::counter!("natours_rate_limited_total").increment(1);

            let retry_after = reset_after.as_secs().max(1);
            let mut response = AppError::too_many_requests(
                LIMIT_MESSAGE,
                json!({ "limit": limit, "retryAfter": retry_after }),
            )
            .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
            response
        }
    }
}

fn reset_at(reset_after: std::time::Duration) -> i64 {
    let secs = i64::try_from(reset_after.as_secs()).unwrap_or(i64::MAX / 2);
    chrono::Utc::now().timestamp().saturating_add(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_scoping() {
        assert!(is_under_prefix("/api", "/api"));
        assert!(is_under_prefix("/api/v1/tours", "/api"));
        assert!(!is_under_prefix("/apiary", "/api"));
        assert!(!is_under_prefix("/", "/api"));
        assert!(!is_under_prefix("/webhook-checkout", "/api"));
    }

    #[test]
    fn test_forwarded_identity_reads_headers() {
        let req = Request::builder()
            .uri("/api/v1/tours")
            .header("x-forwarded-for", "203.0.113.9")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(
            ClientIdentity::Forwarded.key(&req),
            "203.0.113.9".parse::<IpAddr>().unwrap()
        );
    }

    #[test]
    fn test_missing_peer_uses_shared_bucket() {
        let req = Request::builder()
            .uri("/api/v1/tours")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(ClientIdentity::Peer.key(&req), UNIDENTIFIED_CLIENT);
    }
}
