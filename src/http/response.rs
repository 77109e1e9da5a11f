use bytes::Bytes;
use serde::Serialize;

use crate::http::headers::Headers;

/// Numeric HTTP status code.
///
/// Backend responses are relayed with whatever code they carry, so this is
/// an open set; the associated constants cover the codes produced locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const CREATED: StatusCode = StatusCode(201);
    pub const NO_CONTENT: StatusCode = StatusCode(204);
    pub const NOT_MODIFIED: StatusCode = StatusCode(304);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const METHOD_NOT_ALLOWED: StatusCode = StatusCode(405);
    pub const PAYLOAD_TOO_LARGE: StatusCode = StatusCode(413);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);
    pub const BAD_GATEWAY: StatusCode = StatusCode(502);
    pub const SERVICE_UNAVAILABLE: StatusCode = StatusCode(503);
    pub const GATEWAY_TIMEOUT: StatusCode = StatusCode(504);

    /// Accepts any three-digit code.
    pub fn from_u16(code: u16) -> Option<Self> {
        (100..=999).contains(&code).then_some(StatusCode(code))
    }

    /// Returns the numeric HTTP status code.
    ///
    /// ```
    /// # use campus_edge::http::response::StatusCode;
    /// assert_eq!(StatusCode::OK.as_u16(), 200);
    /// assert_eq!(StatusCode::BAD_GATEWAY.as_u16(), 502);
    /// ```
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Standard reason phrase, or `""` for codes without a well-known one.
    pub fn reason_phrase(&self) -> &'static str {
        match self.0 {
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            204 => "No Content",
            301 => "Moved Permanently",
            302 => "Found",
            304 => "Not Modified",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            409 => "Conflict",
            413 => "Payload Too Large",
            422 => "Unprocessable Entity",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            _ => "",
        }
    }

    /// Whether a response with this status never carries a body.
    pub fn is_bodiless(&self) -> bool {
        matches!(self.0, 100..=199 | 204 | 304)
    }
}

/// A complete HTTP response ready to be sent to a client.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    /// Reason phrase received from a backend; `None` uses the standard one.
    pub reason: Option<String>,
    pub headers: Headers,
    pub body: Bytes,
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// ```ignore
/// let response = ResponseBuilder::new(StatusCode::OK)
///     .header("Content-Type", "application/json")
///     .body(b"{}".to_vec())
///     .build();
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    reason: Option<String>,
    headers: Headers,
    body: Bytes,
    fill_length: bool,
}

impl ResponseBuilder {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            reason: None,
            headers: Headers::new(),
            body: Bytes::new(),
            fill_length: true,
        }
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Adds or replaces a header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Replaces the whole header list.
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Leaves the header list exactly as given, without a derived
    /// Content-Length. Used for answers to `HEAD`.
    pub fn keep_headers_as_is(mut self) -> Self {
        self.fill_length = false;
        self
    }

    /// Builds the final Response.
    ///
    /// Adds a Content-Length header from the body size if none is present
    /// and the status allows a body.
    pub fn build(mut self) -> Response {
        if self.fill_length
            && !self.status.is_bodiless()
            && !self.headers.contains("Content-Length")
        {
            self.headers
                .append("Content-Length", self.body.len().to_string());
        }

        Response {
            status: self.status,
            reason: self.reason,
            headers: self.headers,
            body: self.body,
        }
    }
}

impl Response {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        ResponseBuilder::new(StatusCode::OK).body(body).build()
    }

    pub fn not_found() -> Self {
        ResponseBuilder::new(StatusCode::NOT_FOUND)
            .header("Content-Type", "text/plain")
            .body(&b"404 Not Found"[..])
            .build()
    }

    pub fn bad_request() -> Self {
        ResponseBuilder::new(StatusCode::BAD_REQUEST)
            .header("Content-Type", "text/plain")
            .body(&b"400 Bad Request"[..])
            .build()
    }

    pub fn payload_too_large() -> Self {
        ResponseBuilder::new(StatusCode::PAYLOAD_TOO_LARGE)
            .header("Content-Type", "text/plain")
            .body(&b"413 Payload Too Large"[..])
            .build()
    }

    pub fn internal_error() -> Self {
        ResponseBuilder::new(StatusCode::INTERNAL_SERVER_ERROR)
            .header("Content-Type", "text/plain")
            .body(&b"500 Internal Server Error"[..])
            .build()
    }

    /// JSON response with `Content-Type: application/json`.
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => ResponseBuilder::new(status)
                .header("Content-Type", "application/json")
                .body(body)
                .build(),
            Err(err) => {
                tracing::error!(error = %err, "Failed to serialize JSON response");
                Self::internal_error()
            }
        }
    }

    /// Reason phrase to put on the status line.
    pub fn reason_phrase(&self) -> &str {
        self.reason
            .as_deref()
            .unwrap_or_else(|| self.status.reason_phrase())
    }
}
