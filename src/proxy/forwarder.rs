//! The `/api/*` relay.
//!
//! Rebuilds the backend URL from the configured base, the matched slug and
//! the original query string, then hands the request to [`Upstream`]
//! unchanged. There is no retry and no caching.

use bytes::Bytes;
use serde_json::json;
use url::Url;

use crate::config::BackendConfig;
use crate::http::headers::Headers;
use crate::http::request::{Method, Request};
use crate::http::response::{Response, StatusCode};
use crate::proxy::error::ForwardError;
use crate::proxy::upstream::Upstream;

pub const NOT_CONFIGURED_MESSAGE: &str = "Backend API URL is not configured.";

/// One request to relay.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    /// Path segments after the API prefix.
    pub slug: Vec<String>,
    /// Original query string with its leading `?`, or empty.
    pub query: String,
    pub headers: Headers,
    pub body: Bytes,
}

impl ForwardRequest {
    pub fn from_request(request: Request, slug: Vec<String>) -> Self {
        let query = request.query_string().to_string();

        Self {
            method: request.method,
            slug,
            query,
            headers: request.headers,
            body: request.body,
        }
    }
}

/// Relays API calls to the configured backend.
#[derive(Debug, Clone)]
pub struct Forwarder {
    base_url: Option<String>,
    upstream: Upstream,
}

impl Forwarder {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            base_url: config.base_url().map(str::to_string),
            upstream: Upstream::new(config.connect_timeout(), config.request_timeout())
                .with_max_body_bytes(config.response_body_limit()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    /// Backend URL for `slug` and `query`, or `None` when no base URL is set.
    pub fn target_url(&self, slug: &[String], query: &str) -> Option<String> {
        self.base_url
            .as_deref()
            .map(|base| build_target_url(base, slug, query))
    }

    /// Relays `request` and returns the backend response as received.
    ///
    /// With no base URL configured this answers 500 without touching the
    /// network. Transport failures are returned, not converted, and so is a
    /// slug whose dot segments climb out of the base path.
    pub async fn forward(&self, request: ForwardRequest) -> Result<Response, ForwardError> {
        let Some(base) = self.base_url.as_deref() else {
            tracing::error!(method = %request.method, "Backend API URL is not configured");
            return Ok(not_configured());
        };

        let url = resolve_target(base, &request.slug, &request.query)?;

        tracing::debug!(
            method = %request.method,
            target = %url,
            body_len = request.body.len(),
            "Forwarding request to backend"
        );

        let response = self
            .upstream
            .send(request.method, &url, &request.headers, &request.body)
            .await?;

        tracing::info!(
            method = %request.method,
            target = %url,
            status = response.status.as_u16(),
            "Request forwarded"
        );

        Ok(response)
    }
}

/// `base + "/" + slug.join("/") + query`, with the query kept verbatim.
pub fn build_target_url(base: &str, slug: &[String], query: &str) -> String {
    format!("{}/{}{}", base, slug.join("/"), query)
}

/// Parses the target URL and checks it is still under `base`.
///
/// `.`/`..` segments (also percent-encoded or with `\` separators) are
/// normalised by the URL parser, so the check runs on the parsed path.
pub fn resolve_target(base: &str, slug: &[String], query: &str) -> Result<Url, ForwardError> {
    let parse = |raw: String| {
        Url::parse(&raw).map_err(|source| ForwardError::InvalidUrl { url: raw, source })
    };

    let root = parse(format!("{}/", base))?;
    let target = build_target_url(base, slug, query);
    let url = parse(target.clone())?;

    if !url.path().starts_with(root.path()) {
        return Err(ForwardError::OutsideBase { url: target });
    }

    Ok(url)
}

fn not_configured() -> Response {
    Response::json(
        StatusCode::INTERNAL_SERVER_ERROR,
        &json!({ "message": NOT_CONFIGURED_MESSAGE }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slug(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn target_url_joins_slug_and_keeps_query() {
        let base = "http://backend:4000/api";

        assert_eq!(build_target_url(base, &[], ""), "http://backend:4000/api/");
        assert_eq!(
            build_target_url(base, &slug(&["courses"]), "?page=2"),
            "http://backend:4000/api/courses?page=2"
        );
        assert_eq!(
            build_target_url(base, &slug(&["courses", "42", "lessons"]), ""),
            "http://backend:4000/api/courses/42/lessons"
        );
    }

    #[test]
    fn dot_segments_cannot_leave_the_base_path() {
        let base = "http://backend:4000/v1/public";

        for parts in [
            &["..", "..", "admin", "secrets"][..],
            &["%2e%2e", "%2E%2E", "admin"][..],
            &[".%2e", "admin"][..],
            &["..\\..\\admin"][..],
            &["..", "publicity"][..],
        ] {
            let err = resolve_target(base, &slug(parts), "").unwrap_err();
            assert!(matches!(err, ForwardError::OutsideBase { .. }), "{:?}", parts);
        }
    }

    #[test]
    fn dot_segments_inside_the_base_are_resolved() {
        let base = "http://backend:4000/v1/public";

        let url = resolve_target(base, &slug(&["courses", "..", "lessons", "."]), "?a=1").unwrap();
        assert_eq!(url.as_str(), "http://backend:4000/v1/public/lessons/?a=1");

        let url = resolve_target("http://backend:4000", &slug(&["users"]), "").unwrap();
        assert_eq!(url.path(), "/users");
    }

    #[test]
    fn unconfigured_forwarder_has_no_target() {
        let forwarder = Forwarder::new(&BackendConfig::default());
        assert!(!forwarder.is_configured());
        assert_eq!(forwarder.target_url(&slug(&["a"]), ""), None);
    }
}
