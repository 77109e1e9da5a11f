use crate::config::{Config, DEFAULT_MAX_BODY_BYTES};
use crate::http::request::Request;
use crate::http::response::{Response, ResponseBuilder, StatusCode};
use crate::proxy::{ForwardError, ForwardRequest, Forwarder};

/// Sends API-prefixed requests to the forwarder; everything else is 404.
pub struct Router {
    api_prefix: String,
    forwarder: Forwarder,
    max_body_bytes: usize,
}

impl Router {
    pub fn new(api_prefix: impl Into<String>, forwarder: Forwarder) -> Self {
        let api_prefix = api_prefix.into();
        Self {
            api_prefix: api_prefix.trim_end_matches('/').to_string(),
            forwarder,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.server.api_prefix.clone(), Forwarder::new(&cfg.backend))
            .with_max_body_bytes(cfg.server.max_body_bytes)
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Largest request body a connection reads before answering `413`.
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    pub async fn handle(&self, request: Request) -> Response {
        let Some(slug) = self.api_slug(request.path_only()) else {
            tracing::debug!(method = %request.method, path = %request.path_only(), "No route");
            return Response::not_found();
        };

        let method = request.method;
        let path = request.path_only().to_string();

        match self.forwarder.forward(ForwardRequest::from_request(request, slug)).await {
            Ok(response) => response,
            Err(e) if e.is_client_error() => {
                tracing::warn!(error = %e, %method, %path, "Rejected API path");
                upstream_failure(&e)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    %method,
                    %path,
                    "Failed to forward request to backend"
                );
                upstream_failure(&e)
            }
        }
    }

    /// Path segments after the API prefix, or `None` for paths outside it.
    ///
    /// Empty segments are dropped; segments are not percent-decoded.
    pub fn api_slug(&self, path: &str) -> Option<Vec<String>> {
        let rest = path.strip_prefix(&self.api_prefix)?;
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }

        Some(
            rest.split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

fn upstream_failure(error: &ForwardError) -> Response {
    if error.is_client_error() {
        return Response::bad_request();
    }

    let (status, body): (StatusCode, &'static [u8]) = if error.is_timeout() {
        (
            StatusCode::GATEWAY_TIMEOUT,
            b"504 Gateway Timeout\r\n\r\nThe backend server did not respond in time.",
        )
    } else {
        (
            StatusCode::BAD_GATEWAY,
            b"502 Bad Gateway\r\n\r\nFailed to reach the backend server.",
        )
    };

    ResponseBuilder::new(status)
        .header("Content-Type", "text/plain")
        .body(body)
        .build()
}
