use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use crate::http::chunked::ChunkedDecoder;
use crate::http::parser::{parse_request_head, BodyFraming, ParseError};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::writer::ResponseWriter;
use crate::server::router::Router;

const READ_CHUNK: usize = 4096;

pub struct Connection<S> {
    stream: S,
    buffer: Vec<u8>,
    state: ConnectionState,
    router: Arc<Router>,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Writing(ResponseWriter, bool), // bool = keep_alive?
    Closed,
}

enum ReadOutcome {
    Request(Request),
    Malformed(ParseError),
    Eof,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, router: Arc<Router>) -> Self {
        Self {
            stream,
            buffer: Vec::with_capacity(READ_CHUNK),
            state: ConnectionState::Reading,
            router,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            let state = std::mem::replace(&mut self.state, ConnectionState::Closed);

            self.state = match state {
                ConnectionState::Reading => match self.read_request().await? {
                    ReadOutcome::Request(req) => ConnectionState::Processing(req),
                    ReadOutcome::Malformed(err) => {
                        tracing::warn!(error = %err, "Rejecting malformed request");
                        let mut response = match err {
                            ParseError::BodyTooLarge => Response::payload_too_large(),
                            _ => Response::bad_request(),
                        };
                        response.headers.insert("Connection", "close");
                        ConnectionState::Writing(ResponseWriter::new(&response), false)
                    }
                    ReadOutcome::Eof => ConnectionState::Closed,
                },

                ConnectionState::Processing(req) => {
                    let keep_alive = req.keep_alive();
                    let mut response = self.router.handle(req).await;

                    if !keep_alive {
                        response.headers.insert("Connection", "close");
                    }

                    ConnectionState::Writing(ResponseWriter::new(&response), keep_alive)
                }

                ConnectionState::Writing(mut writer, keep_alive) => {
                    writer.write_to_stream(&mut self.stream).await?;

                    if keep_alive {
                        ConnectionState::Reading
                    } else {
                        ConnectionState::Closed
                    }
                }

                ConnectionState::Closed => break,
            };
        }

        Ok(())
    }

    async fn read_request(&mut self) -> anyhow::Result<ReadOutcome> {
        let limit = self.router.max_body_bytes();

        let (mut request, framing, body_start) = loop {
            // Try parsing whatever we already have
            match parse_request_head(&self.buffer) {
                Ok(head) => break head,
                Err(ParseError::Incomplete) => {}
                Err(e) => return Ok(ReadOutcome::Malformed(e)),
            }

            if !self.fill_buffer().await? {
                return Ok(ReadOutcome::Eof);
            }
        };

        let consumed = match framing {
            BodyFraming::Length(len) => {
                if len > limit {
                    return Ok(ReadOutcome::Malformed(ParseError::BodyTooLarge));
                }

                while self.buffer.len() - body_start < len {
                    if !self.fill_buffer().await? {
                        return Ok(ReadOutcome::Eof);
                    }
                }

                request.body = Bytes::copy_from_slice(&self.buffer[body_start..body_start + len]);
                body_start + len
            }

            BodyFraming::Chunked => {
                let mut decoder = ChunkedDecoder::with_limit(limit);

                let body_len = loop {
                    match decoder.feed(&self.buffer[body_start..]) {
                        Ok(Some(body_len)) => break body_len,
                        Ok(None) => {}
                        Err(e) => return Ok(ReadOutcome::Malformed(e)),
                    }

                    if !self.fill_buffer().await? {
                        return Ok(ReadOutcome::Eof);
                    }
                };

                request.body = Bytes::from(decoder.into_body());
                body_start + body_len
            }
        };

        self.buffer.drain(..consumed);
        Ok(ReadOutcome::Request(request))
    }

    /// Reads more bytes into the buffer; `false` once the client has closed.
    async fn fill_buffer(&mut self) -> anyhow::Result<bool> {
        let mut temp = [0u8; READ_CHUNK];
        let n = self.stream.read(&mut temp).await?;

        if n == 0 {
            if !self.buffer.is_empty() {
                tracing::debug!(
                    buffered = self.buffer.len(),
                    "Client closed connection mid-request"
                );
            }
            return Ok(false);
        }

        self.buffer.extend_from_slice(&temp[..n]);
        Ok(true)
    }
}
