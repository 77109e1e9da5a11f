//! campus-edge - API relay and access guards for the campus web app
//!
//! Relays `/api/*` calls to the backend API and decides, from the
//! session's role, which protected pages and fragments may be shown.

pub mod access;
pub mod config;
pub mod http;
pub mod proxy;
pub mod server;
