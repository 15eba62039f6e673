//! Security header stage.
//!
//! Adds a fixed set of hardening headers to every response, plus a
//! Content-Security-Policy built from the configured origin allow-list.
//! Headers a handler already set are left alone.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, header},
    middleware::Next,
    response::Response,
};

/// Content-Security-Policy with third-party origins confined to an allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSecurityPolicy {
    directives: Vec<(&'static str, Vec<String>)>,
}

impl ContentSecurityPolicy {
    /// Script, image, frame and connect sources admit `'self'` plus `origins`.
    pub fn with_allowed_origins(origins: &[String]) -> Self {
        let sources = |base: &[&str], extra: &[String]| -> Vec<String> {
            base.iter()
                .map(|s| s.to_string())
                .chain(extra.iter().cloned())
                .collect()
        };

        Self {
            directives: vec![
                ("default-src", sources(&["'self'"], &[])),
                ("base-uri", sources(&["'self'"], &[])),
                ("font-src", sources(&["'self'", "https:", "data:"], &[])),
                ("form-action", sources(&["'self'"], &[])),
                ("frame-ancestors", sources(&["'self'"], &[])),
                ("frame-src", sources(&["'self'"], origins)),
                ("img-src", sources(&["'self'", "data:", "blob:"], origins)),
                ("object-src", sources(&["'none'"], &[])),
                ("script-src", sources(&["'self'", "blob:"], origins)),
                ("script-src-attr", sources(&["'none'"], &[])),
                ("style-src", sources(&["'self'", "https:", "'unsafe-inline'"], &[])),
                ("connect-src", sources(&["'self'"], origins)),
                ("worker-src", sources(&["'self'", "blob:"], &[])),
                ("upgrade-insecure-requests", Vec::new()),
            ],
        }
    }

    pub fn sources(&self, directive: &str) -> Option<&[String]> {
        self.directives
            .iter()
            .find(|(name, _)| *name == directive)
            .map(|(_, sources)| sources.as_slice())
    }

    /// Serializes to the header form: `name src src;name src;...`.
    pub fn render(&self) -> String {
        self.directives
            .iter()
            .map(|(name, sources)| {
                if sources.is_empty() {
                    name.to_string()
                } else {
                    format!("{name} {}", sources.join(" "))
                }
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Precomputed header set shared by all requests.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: Arc<HeaderMap>,
}

impl SecurityHeaders {
    /// # Errors
    ///
    /// Fails if an allow-listed origin cannot appear in a header value.
    pub fn new(csp: &ContentSecurityPolicy) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_str(&csp.render())?,
        );

        let fixed: [(HeaderName, &'static str); 11] = [
            (
                HeaderName::from_static("cross-origin-opener-policy"),
                "same-origin",
            ),
            (
                HeaderName::from_static("cross-origin-resource-policy"),
                "same-origin",
            ),
            (HeaderName::from_static("origin-agent-cluster"), "?1"),
            (header::REFERRER_POLICY, "no-referrer"),
            (
                header::STRICT_TRANSPORT_SECURITY,
                "max-age=15552000; includeSubDomains",
            ),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            (header::X_DNS_PREFETCH_CONTROL, "off"),
            (HeaderName::from_static("x-download-options"), "noopen"),
            (header::X_FRAME_OPTIONS, "SAMEORIGIN"),
            (
                HeaderName::from_static("x-permitted-cross-domain-policies"),
                "none",
            ),
            (header::X_XSS_PROTECTION, "0"),
        ];
        for (name, value) in fixed {
            headers.insert(name, HeaderValue::from_static(value));
        }

        Ok(Self {
            headers: Arc::new(headers),
        })
    }
}

pub async fn layer(State(policy): State<SecurityHeaders>, req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    for (name, value) in policy.headers.iter() {
        if !headers.contains_key(name) {
            headers.insert(name.clone(), value.clone());
        }
    }
    headers.remove("x-powered-by");

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, middleware, routing::get};
    use axum_test::TestServer;

    fn origins() -> Vec<String> {
        vec![
            "https://js.stripe.com".to_string(),
            "https://*.mapbox.com".to_string(),
        ]
    }

    #[test]
    fn test_csp_restricts_sources_to_allow_list() {
        let csp = ContentSecurityPolicy::with_allowed_origins(&origins());

        let scripts = csp.sources("script-src").unwrap();
        assert!(scripts.contains(&"https://js.stripe.com".to_string()));
        assert!(scripts.contains(&"'self'".to_string()));
        assert!(!scripts.iter().any(|s| s == "https:" || s == "*"));

        let frames = csp.sources("frame-src").unwrap();
        assert!(frames.contains(&"https://js.stripe.com".to_string()));

        assert_eq!(csp.sources("object-src").unwrap(), ["'none'".to_string()]);
    }

    #[test]
    fn test_csp_render() {
        let csp = ContentSecurityPolicy::with_allowed_origins(&origins());
        let rendered = csp.render();
        assert!(rendered.starts_with("default-src 'self';base-uri 'self';"));
        assert!(rendered.contains("script-src 'self' blob: https://js.stripe.com https://*.mapbox.com;"));
        assert!(rendered.ends_with(";upgrade-insecure-requests"));
    }

    #[tokio::test]
    async fn test_headers_added_without_overriding() {
        let csp = ContentSecurityPolicy::with_allowed_origins(&origins());
        let policy = SecurityHeaders::new(&csp).unwrap();
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .route(
                "/framed",
                get(|| async { ([(header::X_FRAME_OPTIONS, "DENY"), (HeaderName::from_static("x-powered-by"), "Express")], "ok") }),
            )
            .layer(middleware::from_fn_with_state(policy, layer));
        let server = TestServer::new(app).unwrap();

        let response = server.get("/").await;
        assert_eq!(response.header("x-frame-options"), "SAMEORIGIN");
        assert_eq!(response.header("x-content-type-options"), "nosniff");
        assert!(
            response
                .header("content-security-policy")
                .to_str()
                .unwrap()
                .contains("https://js.stripe.com")
        );

        let response = server.get("/framed").await;
        assert_eq!(response.header("x-frame-options"), "DENY");
        assert!(response.maybe_header("x-powered-by").is_none());
    }
}
