//! Ordered request pipeline.
//!
//! The stage order is a single explicit list, [`Stage::ORDER`], rather than a
//! trail of `.layer()` calls. [`build`] walks it to assemble the router:
//!
//! 1. dispatch stages become the innermost router (collaborator routes plus
//!    system routes) with the not-found fallback, and handler panics are
//!    caught right there so the resulting 500 passes back out through every
//!    stage;
//! 2. middleware stages wrap it in reverse, so the first stage in the list is
//!    the first to see a request;
//! 3. the terminal error stage wraps everything, with a second panic capture
//!    just inside it for the stages, so it observes every outcome exactly once.
//!
//! Reordering [`Stage::ORDER`] changes security behavior. The tests at the
//! bottom of this file pin the order.

use std::fmt;
use std::sync::Arc;

use axum::{Router, middleware, routing::get};
use tower_http::catch_panic::CatchPanicLayer;

use crate::api::handlers::health_handler;
use crate::api::middleware::{
    body, compression, cookies, cors, errors, hpp, rate_limit, request_time, sanitize,
    security_headers, static_assets, tracing as request_log, webhook,
};
use crate::config::{Environment, PipelineConfig};
use crate::routes::Collaborators;
use crate::state::AppState;

/// How a stage attaches to the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Wraps everything ordered after it.
    Middleware,
    /// Mounts route handlers.
    Dispatch,
    /// Handles requests no route matched.
    Fallback,
    /// Observes every response; wraps the whole pipeline.
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    StaticAssets,
    CrossOrigin,
    SecurityHeaders,
    DiagnosticLogging,
    RateLimit,
    WebhookRawBody,
    BodyParsing,
    CookieParsing,
    InjectionSanitization,
    ScriptSanitization,
    ParameterPollution,
    Compression,
    ContextAnnotation,
    RouteDispatch,
    NotFound,
    ErrorHandler,
}

impl Stage {
    /// Every stage, in request order.
    pub const ORDER: [Stage; 16] = [
        Stage::StaticAssets,
        Stage::CrossOrigin,
        Stage::SecurityHeaders,
        Stage::DiagnosticLogging,
        Stage::RateLimit,
        Stage::WebhookRawBody,
        Stage::BodyParsing,
        Stage::CookieParsing,
        Stage::InjectionSanitization,
        Stage::ScriptSanitization,
        Stage::ParameterPollution,
        Stage::Compression,
        Stage::ContextAnnotation,
        Stage::RouteDispatch,
        Stage::NotFound,
        Stage::ErrorHandler,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::StaticAssets => "static-assets",
            Stage::CrossOrigin => "cross-origin",
            Stage::SecurityHeaders => "security-headers",
            Stage::DiagnosticLogging => "diagnostic-logging",
            Stage::RateLimit => "rate-limit",
            Stage::WebhookRawBody => "webhook-raw-body",
            Stage::BodyParsing => "body-parsing",
            Stage::CookieParsing => "cookie-parsing",
            Stage::InjectionSanitization => "injection-sanitization",
            Stage::ScriptSanitization => "script-sanitization",
            Stage::ParameterPollution => "parameter-pollution",
            Stage::Compression => "compression",
            Stage::ContextAnnotation => "context-annotation",
            Stage::RouteDispatch => "route-dispatch",
            Stage::NotFound => "not-found",
            Stage::ErrorHandler => "error-handler",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Stage::StaticAssets => "serve files under the public root",
            Stage::CrossOrigin => "CORS headers; answer OPTIONS with 204",
            Stage::SecurityHeaders => "hardening headers and Content-Security-Policy",
            Stage::DiagnosticLogging => "log method, path, status and latency (development)",
            Stage::RateLimit => "fixed-window limit per client on API paths",
            Stage::WebhookRawBody => "hand the payment webhook its unparsed body",
            Stage::BodyParsing => "parse JSON / URL-encoded bodies up to the size cap",
            Stage::CookieParsing => "parse the Cookie header",
            Stage::InjectionSanitization => "drop operator keys from query and body",
            Stage::ScriptSanitization => "escape markup in query and body",
            Stage::ParameterPollution => "collapse repeated query keys",
            Stage::Compression => "negotiate response compression",
            Stage::ContextAnnotation => "stamp the request-received time",
            Stage::RouteDispatch => "views, tours, users, reviews, bookings",
            Stage::NotFound => "404 for unmatched paths",
            Stage::ErrorHandler => "render every error exactly once",
        }
    }

    pub fn placement(self) -> Placement {
        match self {
            Stage::RouteDispatch => Placement::Dispatch,
            Stage::NotFound => Placement::Fallback,
            Stage::ErrorHandler => Placement::Terminal,
            _ => Placement::Middleware,
        }
    }

    pub fn enabled_in(self, environment: Environment) -> bool {
        match self {
            Stage::DiagnosticLogging => !environment.is_production(),
            _ => true,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stages active in `environment`, in request order.
pub fn stages(environment: Environment) -> Vec<Stage> {
    Stage::ORDER
        .into_iter()
        .filter(|s| s.enabled_in(environment))
        .collect()
}

/// Assembles the full pipeline around `collaborators`.
///
/// # Errors
///
/// Fails if the configured CSP allow-list cannot be expressed as a header value.
pub fn build(state: AppState, collaborators: Collaborators) -> anyhow::Result<Router> {
    let config = state.config.clone();
    let Collaborators {
        views,
        tours,
        users,
        reviews,
        bookings,
        webhook,
    } = collaborators;

    let api = format!("{}/v1", config.api_prefix);
    let system = Router::new()
        .route("/health", get(health_handler))
        .with_state(state.clone());

    let mut router = Router::new()
        .merge(system)
        .merge(views)
        .nest(&format!("{api}/tours"), tours)
        .nest(&format!("{api}/users"), users)
        .nest(&format!("{api}/reviews"), reviews)
        .nest(&format!("{api}/bookings"), bookings)
        .fallback(errors::not_found)
        .layer(CatchPanicLayer::custom(errors::on_panic));

    let active = stages(config.environment);
    for stage in active.iter().rev() {
        if stage.placement() == Placement::Middleware {
            router = apply(*stage, router, &state, &config, &webhook)?;
        }
    }

    let rendering = errors::ErrorRendering {
        environment: config.environment,
        api_prefix: Arc::from(config.api_prefix.as_str()),
    };

    // Backstop for panics inside the stages themselves.
    Ok(router
        .layer(CatchPanicLayer::custom(errors::on_panic))
        .layer(middleware::from_fn_with_state(rendering, errors::terminal)))
}

fn apply(
    stage: Stage,
    router: Router,
    state: &AppState,
    config: &PipelineConfig,
    webhook: &Router,
) -> anyhow::Result<Router> {
    let router = match stage {
        Stage::StaticAssets => router.layer(middleware::from_fn_with_state(
            state.assets.clone(),
            static_assets::layer,
        )),
        Stage::CrossOrigin => router
            .layer(cors::layer())
            .layer(middleware::from_fn(cors::options_responder)),
        Stage::SecurityHeaders => {
            let csp = security_headers::ContentSecurityPolicy::with_allowed_origins(
                &config.csp_allowed_origins,
            );
            let headers = security_headers::SecurityHeaders::new(&csp)?;
            router.layer(middleware::from_fn_with_state(
                headers,
                security_headers::layer,
            ))
        }
        Stage::DiagnosticLogging => router
            .layer(middleware::from_fn(request_log::access_log))
            .layer(request_log::span_layer()),
        Stage::RateLimit => {
            let st = rate_limit::RateLimitState {
                limiter: state.limiter.clone(),
                identity: rate_limit::ClientIdentity::new(config.rate_limit.behind_proxy),
                prefix: Arc::from(config.api_prefix.as_str()),
            };
            router.layer(middleware::from_fn_with_state(st, rate_limit::layer))
        }
        Stage::WebhookRawBody => {
            let route = webhook::WebhookRoute {
                path: Arc::from(config.webhook_path.as_str()),
                router: webhook.clone(),
            };
            router.layer(middleware::from_fn_with_state(route, webhook::layer))
        }
        Stage::BodyParsing => router.layer(middleware::from_fn_with_state(
            body::BodyLimit(config.body_limit_bytes),
            body::layer,
        )),
        Stage::CookieParsing => router.layer(middleware::from_fn(cookies::layer)),
        Stage::InjectionSanitization => router.layer(middleware::from_fn(sanitize::injection)),
        Stage::ScriptSanitization => {
            router.layer(middleware::from_fn(sanitize::script_injection))
        }
        Stage::ParameterPollution => router.layer(middleware::from_fn_with_state(
            hpp::Whitelist::new(config.hpp_whitelist.iter().cloned()),
            hpp::layer,
        )),
        Stage::Compression => router.layer(compression::layer(config.compression_min_bytes)),
        Stage::ContextAnnotation => router.layer(middleware::from_fn(request_time::layer)),
        Stage::RouteDispatch | Stage::NotFound | Stage::ErrorHandler => router,
    };
    Ok(router)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(stage: Stage) -> usize {
        Stage::ORDER.iter().position(|s| *s == stage).unwrap()
    }

    #[test]
    fn test_order_is_pinned() {
        let names: Vec<_> = Stage::ORDER.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            [
                "static-assets",
                "cross-origin",
                "security-headers",
                "diagnostic-logging",
                "rate-limit",
                "webhook-raw-body",
                "body-parsing",
                "cookie-parsing",
                "injection-sanitization",
                "script-sanitization",
                "parameter-pollution",
                "compression",
                "context-annotation",
                "route-dispatch",
                "not-found",
                "error-handler",
            ]
        );
    }

    #[test]
    fn test_webhook_precedes_body_parsing() {
        assert!(position(Stage::WebhookRawBody) < position(Stage::BodyParsing));
        assert_eq!(position(Stage::WebhookRawBody) + 1, position(Stage::BodyParsing));
    }

    #[test]
    fn test_sanitizers_follow_parsers() {
        let body = position(Stage::BodyParsing);
        for s in [
            Stage::InjectionSanitization,
            Stage::ScriptSanitization,
            Stage::ParameterPollution,
        ] {
            assert!(position(s) > body, "{s} must run after body parsing");
            assert!(position(s) < position(Stage::RouteDispatch));
        }
    }

    #[test]
    fn test_static_assets_first_and_error_handler_last() {
        assert_eq!(Stage::ORDER[0], Stage::StaticAssets);
        assert_eq!(Stage::ORDER[15], Stage::ErrorHandler);
        assert_eq!(Stage::ErrorHandler.placement(), Placement::Terminal);
    }

    #[test]
    fn test_logging_only_outside_production() {
        assert!(stages(Environment::Development).contains(&Stage::DiagnosticLogging));
        assert!(!stages(Environment::Production).contains(&Stage::DiagnosticLogging));
        assert_eq!(stages(Environment::Production).len(), 15);
    }

    #[test]
    fn test_build_rejects_unencodable_csp() {
        let config = PipelineConfig {
            csp_allowed_origins: vec!["https://bad\norigin".to_string()],
            ..PipelineConfig::default()
        };
        let result = build(AppState::new(config), Collaborators::default());
        assert!(result.is_err());
    }
}
