//! Upstream exchange with the backend.
//!
//! One fresh TCP connection per relayed request (`Connection: close`).
//! Bodies are buffered; framing headers are rebuilt for each hop while all
//! end-to-end headers pass through untouched.

use std::future::Future;
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use url::Url;

use crate::config::DEFAULT_MAX_BODY_BYTES;
use crate::http::chunked::ChunkedDecoder;
use crate::http::headers::Headers;
use crate::http::parser::{find_headers_end, is_chunked, parse_header_lines, ParseError};
use crate::http::request::Method;
use crate::http::response::{Response, ResponseBuilder, StatusCode};
use crate::proxy::error::ForwardError;

/// Default buffer size for reads
const BUFFER_SIZE: usize = 8192;

/// Upper bound for a backend status line plus headers.
pub const MAX_RESPONSE_HEADER_BYTES: usize = 64 * 1024;

/// Connection-scoped request headers that must not cross to the new hop.
const REQUEST_HOP_BY_HOP: &[&str] = &[
    "Connection",
    "Keep-Alive",
    "Proxy-Connection",
    "Transfer-Encoding",
    "TE",
    "Upgrade",
    "Expect",
    "Host",
    "Content-Length",
];

/// Connection-scoped response headers. The body is re-framed for the client.
const RESPONSE_HOP_BY_HOP: &[&str] = &[
    "Connection",
    "Keep-Alive",
    "Proxy-Connection",
    "Transfer-Encoding",
    "Upgrade",
];

/// Sends requests to a backend over plain HTTP/1.1.
#[derive(Debug, Clone)]
pub struct Upstream {
    connect_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    max_body_bytes: usize,
}

impl Default for Upstream {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl Upstream {
    /// `None` means wait indefinitely.
    pub fn new(connect_timeout: Option<Duration>, request_timeout: Option<Duration>) -> Self {
        Self {
            connect_timeout,
            request_timeout,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Caps the size of response bodies read from the backend.
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Connects to `target`, sends the request and reads the full response.
    pub async fn send(
        &self,
        method: Method,
        target: &Url,
        headers: &Headers,
        body: &[u8],
    ) -> Result<Response, ForwardError> {
        if target.scheme() != "http" {
            return Err(ForwardError::UnsupportedScheme(target.scheme().to_string()));
        }

        let host = target.host_str().ok_or(ForwardError::MissingHost)?;
        let port = target.port_or_known_default().unwrap_or(80);
        let addr = format!("{}:{}", host, port);

        let stream = with_timeout(self.connect_timeout, "connect", async {
            TcpStream::connect(&addr)
                .await
                .map_err(|source| ForwardError::Connect {
                    addr: addr.clone(),
                    source,
                })
        })
        .await?;

        tracing::trace!(%addr, "Connected to backend");

        let request_bytes = self.build_http_request(method, target, headers, body);

        with_timeout(
            self.request_timeout,
            "request",
            exchange(
                stream,
                request_bytes,
                method == Method::HEAD,
                self.max_body_bytes,
            ),
        )
        .await
    }

    /// Serializes the outbound request.
    ///
    /// Public so the wire form can be inspected in tests.
    pub fn build_http_request(
        &self,
        method: Method,
        target: &Url,
        headers: &Headers,
        body: &[u8],
    ) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(512 + body.len());

        let mut request_target = target.path().to_string();
        if let Some(query) = target.query() {
            request_target.push('?');
            request_target.push_str(query);
        }

        buffer.extend_from_slice(format!("{} {} HTTP/1.1\r\n", method, request_target).as_bytes());
        buffer.extend_from_slice(format!("Host: {}\r\n", authority(target)).as_bytes());

        for (key, value) in strip_hop_by_hop(headers, REQUEST_HOP_BY_HOP).iter() {
            buffer.extend_from_slice(format!("{}: {}\r\n", key, value).as_bytes());
        }

        if !body.is_empty() || carries_body(method) {
            buffer.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
        }
        buffer.extend_from_slice(b"Connection: close\r\n");

        // End of headers
        buffer.extend_from_slice(b"\r\n");
        buffer.extend_from_slice(body);

        buffer
    }
}

async fn exchange(
    mut stream: TcpStream,
    request_bytes: Vec<u8>,
    head_request: bool,
    max_body_bytes: usize,
) -> Result<Response, ForwardError> {
    stream.write_all(&request_bytes).await?;
    stream.flush().await?;

    tracing::trace!("Request sent to backend");

    read_http_response(&mut stream, head_request, max_body_bytes).await
}

/// Reads one complete response, skipping interim `1xx` responses.
///
/// Bodies larger than `max_body_bytes` are refused as malformed.
pub async fn read_http_response<R>(
    stream: &mut R,
    head_request: bool,
    max_body_bytes: usize,
) -> Result<Response, ForwardError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);

    loop {
        let headers_end = loop {
            if let Some(end) = find_headers_end(&buffer) {
                break end;
            }

            // Prevent unbounded header growth
            if buffer.len() > MAX_RESPONSE_HEADER_BYTES {
                return Err(malformed("response headers too large"));
            }

            if stream.read_buf(&mut buffer).await? == 0 {
                return Err(malformed("connection closed before response headers"));
            }
        };

        let head = buffer.split_to(headers_end + 4);
        let (status, reason, headers) = parse_response_head(&head)?;

        if (100..200).contains(&status.as_u16()) && status.as_u16() != 101 {
            tracing::trace!(status = status.as_u16(), "Skipping interim response");
            continue;
        }

        let chunked = is_chunked(&headers);
        let coded = headers.contains("Transfer-Encoding");
        let body = if head_request || status.is_bodiless() {
            Bytes::new()
        } else if chunked {
            read_chunked_body(stream, &mut buffer, max_body_bytes).await?
        } else if coded {
            // non-chunked final coding: delimited by close
            read_until_close(stream, &mut buffer, max_body_bytes).await?
        } else if let Some(len) = content_length(&headers)? {
            read_sized_body(stream, &mut buffer, len, max_body_bytes).await?
        } else {
            read_until_close(stream, &mut buffer, max_body_bytes).await?
        };

        let mut headers = strip_hop_by_hop(&headers, RESPONSE_HOP_BY_HOP);
        if coded && !head_request {
            headers.remove("Content-Length");
        }

        let mut builder = ResponseBuilder::new(status).headers(headers).body(body);
        if !reason.is_empty() {
            builder = builder.reason(reason);
        }
        if head_request {
            builder = builder.keep_headers_as_is();
        }

        return Ok(builder.build());
    }
}

/// Parses a status line and header block.
pub fn parse_response_head(head: &[u8]) -> Result<(StatusCode, String, Headers), ForwardError> {
    let text =
        std::str::from_utf8(head).map_err(|_| malformed("invalid UTF-8 in response headers"))?;

    let mut lines = text.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let mut parts = status_line.splitn(3, ' ');

    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(ForwardError::MalformedResponse(format!(
            "invalid status line: {}",
            status_line
        )));
    }

    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .and_then(StatusCode::from_u16)
        .ok_or_else(|| {
            ForwardError::MalformedResponse(format!("invalid status code: {}", status_line))
        })?;

    let reason = parts.next().unwrap_or_default().trim().to_string();

    let headers =
        parse_header_lines(lines).map_err(|e| ForwardError::MalformedResponse(e.to_string()))?;

    Ok((status, reason, headers))
}

async fn read_chunked_body<R>(
    stream: &mut R,
    buffer: &mut BytesMut,
    limit: usize,
) -> Result<Bytes, ForwardError>
where
    R: AsyncRead + Unpin,
{
    let mut decoder = ChunkedDecoder::with_limit(limit);

    loop {
        match decoder.feed(&buffer[..]) {
            Ok(Some(consumed)) => {
                buffer.advance(consumed);
                return Ok(Bytes::from(decoder.into_body()));
            }
            Ok(None) => {}
            Err(ParseError::BodyTooLarge) => return Err(body_too_large(limit)),
            Err(e) => return Err(ForwardError::MalformedResponse(e.to_string())),
        }

        if stream.read_buf(buffer).await? == 0 {
            return Err(malformed("connection closed before complete body received"));
        }
    }
}

async fn read_sized_body<R>(
    stream: &mut R,
    buffer: &mut BytesMut,
    len: usize,
    limit: usize,
) -> Result<Bytes, ForwardError>
where
    R: AsyncRead + Unpin,
{
    if len > limit {
        return Err(body_too_large(limit));
    }

    buffer.reserve(len.saturating_sub(buffer.len()).min(1 << 20));

    while buffer.len() < len {
        if stream.read_buf(buffer).await? == 0 {
            return Err(malformed("connection closed before complete body received"));
        }
    }

    Ok(buffer.split_to(len).freeze())
}

async fn read_until_close<R>(
    stream: &mut R,
    buffer: &mut BytesMut,
    limit: usize,
) -> Result<Bytes, ForwardError>
where
    R: AsyncRead + Unpin,
{
    loop {
        if buffer.len() > limit {
            return Err(body_too_large(limit));
        }
        if stream.read_buf(buffer).await? == 0 {
            return Ok(buffer.split().freeze());
        }
    }
}

fn content_length(headers: &Headers) -> Result<Option<usize>, ForwardError> {
    headers
        .get("Content-Length")
        .map(|v| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| malformed("invalid Content-Length"))
        })
        .transpose()
}

/// Drops the fixed hop-by-hop set plus anything named in `Connection`.
fn strip_hop_by_hop(headers: &Headers, fixed: &[&str]) -> Headers {
    let listed: Vec<&str> = headers
        .get_all("Connection")
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect();

    headers
        .iter()
        .filter(|(key, _)| {
            !fixed.iter().any(|name| name.eq_ignore_ascii_case(key))
                && !listed.iter().any(|name| name.eq_ignore_ascii_case(key))
        })
        .collect()
}

fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

fn carries_body(method: Method) -> bool {
    matches!(method, Method::POST | Method::PUT | Method::PATCH)
}

fn malformed(reason: &str) -> ForwardError {
    ForwardError::MalformedResponse(reason.to_string())
}

fn body_too_large(limit: usize) -> ForwardError {
    ForwardError::MalformedResponse(format!("response body exceeds {} bytes", limit))
}

async fn with_timeout<T, F>(
    limit: Option<Duration>,
    stage: &'static str,
    fut: F,
) -> Result<T, ForwardError>
where
    F: Future<Output = Result<T, ForwardError>>,
{
    match limit {
        Some(limit) => timeout(limit, fut)
            .await
            .map_err(|_| ForwardError::Timeout(stage))?,
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 1024;

    #[tokio::test]
    async fn reads_chunked_response_and_drops_framing() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nX-Id: 7\r\n\r\n5\r\nhello\r\n0\r\n\r\n";
        let mut stream = &raw[..];

        let response = read_http_response(&mut stream, false, LIMIT).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(&response.body[..], b"hello");
        assert_eq!(response.headers.get("X-Id"), Some("7"));
        assert_eq!(response.headers.get("Transfer-Encoding"), None);
        assert_eq!(response.headers.get("Content-Length"), Some("5"));
    }

    #[tokio::test]
    async fn skips_interim_response() {
        let raw = b"HTTP/1.1 103 Early Hints\r\nLink: </a.css>\r\n\r\nHTTP/1.1 201 Created\r\nContent-Length: 2\r\n\r\nok";
        let mut stream = &raw[..];

        let response = read_http_response(&mut stream, false, LIMIT).await.unwrap();

        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(&response.body[..], b"ok");
    }

    #[tokio::test]
    async fn reads_until_close_without_length() {
        let raw = b"HTTP/1.0 200 OK\r\n\r\nstreamed";
        let mut stream = &raw[..];

        let response = read_http_response(&mut stream, false, LIMIT).await.unwrap();

        assert_eq!(&response.body[..], b"streamed");
    }

    #[tokio::test]
    async fn truncated_body_is_an_error() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nshort";
        let mut stream = &raw[..];

        let err = read_http_response(&mut stream, false, LIMIT).await.unwrap_err();
        assert!(matches!(err, ForwardError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn oversized_bodies_are_refused_for_every_framing() {
        let sized = b"HTTP/1.1 200 OK\r\nContent-Length: 999999999999\r\n\r\n".to_vec();
        let chunked = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n800\r\n".to_vec();
        let mut until_close = b"HTTP/1.0 200 OK\r\n\r\n".to_vec();
        until_close.extend(std::iter::repeat(b'x').take(LIMIT + 1));

        for raw in [sized, chunked, until_close] {
            let mut stream = &raw[..];
            let err = read_http_response(&mut stream, false, LIMIT).await.unwrap_err();
            assert!(err.to_string().contains("exceeds 1024 bytes"), "{}", err);
        }
    }

    #[tokio::test]
    async fn body_at_the_limit_is_accepted() {
        let mut raw = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", LIMIT).into_bytes();
        raw.extend(std::iter::repeat(b'y').take(LIMIT));
        let mut stream = &raw[..];

        let response = read_http_response(&mut stream, false, LIMIT).await.unwrap();
        assert_eq!(response.body.len(), LIMIT);
    }

    #[tokio::test]
    async fn head_response_keeps_backend_headers_as_sent() {
        let without_length = b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n";
        let mut stream = &without_length[..];
        let response = read_http_response(&mut stream, true, LIMIT).await.unwrap();
        assert_eq!(response.headers.get("Content-Length"), None);
        assert!(response.body.is_empty());

        let with_length = b"HTTP/1.1 200 OK\r\nContent-Length: 512\r\n\r\n";
        let mut stream = &with_length[..];
        let response = read_http_response(&mut stream, true, LIMIT).await.unwrap();
        assert_eq!(response.headers.get("Content-Length"), Some("512"));
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn non_chunked_transfer_coding_reads_to_close() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: gzip\r\nContent-Length: 2\r\n\r\nabcdef";
        let mut stream = &raw[..];

        let response = read_http_response(&mut stream, false, LIMIT).await.unwrap();
        assert_eq!(&response.body[..], b"abcdef");
        assert_eq!(response.headers.get("Content-Length"), Some("6"));
    }
}
