//! HTTP protocol implementation.
//!
//! A small HTTP/1.1 server with keep-alive support, enough to accept API
//! calls from browsers and relay them.
//!
//! # Architecture
//!
//! - **`connection`**: per-client request/response state machine
//! - **`parser`**: parses requests out of a byte buffer
//! - **`chunked`**: chunked transfer coding, shared with the upstream reader
//! - **`headers`**: ordered, case-insensitive header list
//! - **`request`** / **`response`**: message types and builders
//! - **`writer`**: serializes and writes responses
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Wait for incoming request data
//!        └──────┬──────┘
//!               │ Request received (malformed → 400, then Closed)
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Route / forward to backend
//!        └──────┬───────────┘
//!               │ Response ready
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← Send response to client
//!        └──────┬───────────┘
//!               │ Response sent
//!               ├─ Keep-Alive → Reading (same connection)
//!               └─ Close → Closed
//! ```

pub mod chunked;
pub mod connection;
pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;

pub use headers::Headers;
