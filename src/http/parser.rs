use bytes::Bytes;

use crate::http::chunked::decode_chunked;
use crate::http::headers::Headers;
use crate::http::request::{Method, Request};

/// Upper bound for the request line plus headers.
pub const MAX_HEADER_BYTES: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("malformed request line")]
    InvalidRequest,
    #[error("unsupported method")]
    InvalidMethod,
    #[error("malformed header line")]
    InvalidHeader,
    #[error("invalid Content-Length")]
    InvalidContentLength,
    #[error("unsupported transfer coding")]
    UnsupportedTransferCoding,
    #[error("malformed chunked body")]
    InvalidChunk,
    #[error("request headers too large")]
    HeadersTooLarge,
    #[error("body exceeds the configured limit")]
    BodyTooLarge,
    #[error("incomplete request")]
    Incomplete,
}

/// How a message body is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// Exactly this many bytes follow the headers (0 when no length is sent).
    Length(usize),
    Chunked,
}

/// Parses one request from the front of `buf`.
///
/// Returns the request and the number of bytes it occupied, so pipelined
/// data after it stays in the buffer.
pub fn parse_http_request(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    let (mut request, framing, body_start) = parse_request_head(buf)?;
    let body_buf = &buf[body_start..];

    let body_len = match framing {
        BodyFraming::Chunked => {
            let (body, consumed) = decode_chunked(body_buf)?;
            request.body = Bytes::from(body);
            consumed
        }
        BodyFraming::Length(len) => {
            if body_buf.len() < len {
                return Err(ParseError::Incomplete);
            }
            request.body = Bytes::copy_from_slice(&body_buf[..len]);
            len
        }
    };

    Ok((request, body_start + body_len))
}

/// Parses the request line and headers without touching the body.
///
/// Returns the request with an empty body, how its body is framed and the
/// offset where the body starts.
pub fn parse_request_head(buf: &[u8]) -> Result<(Request, BodyFraming, usize), ParseError> {
    let headers_end = match find_headers_end(buf) {
        Some(end) if end > MAX_HEADER_BYTES => return Err(ParseError::HeadersTooLarge),
        Some(end) => end,
        None if buf.len() > MAX_HEADER_BYTES => return Err(ParseError::HeadersTooLarge),
        None => return Err(ParseError::Incomplete),
    };
    let header_bytes = &buf[..headers_end];

    let headers_str = std::str::from_utf8(header_bytes).map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = headers_str.split("\r\n");

    // Request line
    let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
    let mut parts = request_line.split_whitespace();

    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let path = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().ok_or(ParseError::InvalidRequest)?;

    if parts.next().is_some() || !version.starts_with("HTTP/") {
        return Err(ParseError::InvalidRequest);
    }

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;

    let headers = parse_header_lines(lines)?;
    let framing = request_body_framing(&headers)?;

    let request = Request {
        method,
        path: path.to_string(),
        version: version.to_string(),
        headers,
        body: Bytes::new(),
    };

    Ok((request, framing, headers_end + 4))
}

/// Body framing of a request.
///
/// A request whose final transfer coding is not `chunked` cannot be
/// delimited and is rejected.
pub fn request_body_framing(headers: &Headers) -> Result<BodyFraming, ParseError> {
    if headers.contains("Transfer-Encoding") {
        return if is_chunked(headers) {
            Ok(BodyFraming::Chunked)
        } else {
            Err(ParseError::UnsupportedTransferCoding)
        };
    }

    let length = headers
        .get("Content-Length")
        .map(|v| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| ParseError::InvalidContentLength)
        })
        .transpose()?
        .unwrap_or(0);

    Ok(BodyFraming::Length(length))
}

/// Parses `Name: value` lines, stopping at the first blank line.
pub fn parse_header_lines<'a>(
    lines: impl Iterator<Item = &'a str>,
) -> Result<Headers, ParseError> {
    let mut headers = Headers::new();

    for line in lines {
        if line.is_empty() {
            break;
        }

        let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ParseError::InvalidHeader);
        }

        headers.append(key, value.trim());
    }

    Ok(headers)
}

/// Whether the final transfer coding is `chunked`.
pub fn is_chunked(headers: &Headers) -> bool {
    headers
        .get_all("Transfer-Encoding")
        .flat_map(|v| v.split(','))
        .last()
        .map(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
        .unwrap_or(false)
}

pub(crate) fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";

        let (parsed, consumed) = parse_http_request(req).unwrap();

        assert_eq!(parsed.path, "/");
        assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn parse_chunked_post() {
        let req = b"POST /api/x HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\n\r\n";

        let (parsed, consumed) = parse_http_request(req).unwrap();

        assert_eq!(&parsed.body[..], b"abc");
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn head_reports_framing_and_body_offset() {
        let req = b"PUT /api/x HTTP/1.1\r\nContent-Length: 4\r\n\r\nbo";

        let (head, framing, body_start) = parse_request_head(req).unwrap();

        assert_eq!(head.path, "/api/x");
        assert!(head.body.is_empty());
        assert_eq!(framing, BodyFraming::Length(4));
        assert_eq!(&req[body_start..], b"bo");
    }
}
