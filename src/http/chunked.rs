//! Chunked transfer coding.

use crate::http::parser::ParseError;

/// Incremental chunked-body decoder.
///
/// `feed` is handed the whole buffered body each time more bytes arrive and
/// resumes after the last complete chunk, so a body is scanned once no
/// matter how many reads it takes.
#[derive(Debug, Default)]
pub struct ChunkedDecoder {
    body: Vec<u8>,
    pos: usize,
    limit: Option<usize>,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with [`ParseError::BodyTooLarge`] once the decoded payload
    /// would exceed `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Decodes as far as `buf` allows.
    ///
    /// `buf` must start at the same place on every call. Returns
    /// `Ok(Some(consumed))` once the terminating chunk and trailers are in,
    /// `Ok(None)` when more input is needed.
    pub fn feed(&mut self, buf: &[u8]) -> Result<Option<usize>, ParseError> {
        loop {
            let rest = buf.get(self.pos..).ok_or(ParseError::InvalidChunk)?;
            let Some(line_len) = find_crlf(rest) else {
                return Ok(None);
            };
            let line =
                std::str::from_utf8(&rest[..line_len]).map_err(|_| ParseError::InvalidChunk)?;

            // chunk extensions follow ';'
            let size_str = line.split(';').next().unwrap_or_default().trim();
            let size =
                usize::from_str_radix(size_str, 16).map_err(|_| ParseError::InvalidChunk)?;
            let data_start = self.pos + line_len + 2;

            if size == 0 {
                return Ok(skip_trailers(buf, data_start));
            }

            if let Some(limit) = self.limit {
                if size > limit.saturating_sub(self.body.len()) {
                    return Err(ParseError::BodyTooLarge);
                }
            }

            let data_end = data_start
                .checked_add(size)
                .ok_or(ParseError::InvalidChunk)?;
            let chunk_end = data_end.checked_add(2).ok_or(ParseError::InvalidChunk)?;
            if buf.len() < chunk_end {
                return Ok(None);
            }

            if &buf[data_end..chunk_end] != b"\r\n" {
                return Err(ParseError::InvalidChunk);
            }

            self.body.extend_from_slice(&buf[data_start..data_end]);
            self.pos = chunk_end;
        }
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

/// Decodes a chunked body from the start of `buf`.
///
/// Returns the de-chunked payload and the number of bytes consumed,
/// trailers included. Trailer fields are discarded.
pub fn decode_chunked(buf: &[u8]) -> Result<(Vec<u8>, usize), ParseError> {
    let mut decoder = ChunkedDecoder::new();
    match decoder.feed(buf)? {
        Some(consumed) => Ok((decoder.into_body(), consumed)),
        None => Err(ParseError::Incomplete),
    }
}

/// Position just past the blank line ending the trailer section.
fn skip_trailers(buf: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        let trailer_len = find_crlf(buf.get(pos..)?)?;
        pos += trailer_len + 2;
        if trailer_len == 0 {
            return Some(pos);
        }
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}
