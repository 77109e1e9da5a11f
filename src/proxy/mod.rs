//! Reverse proxy functionality
//!
//! Relays `/api/*` calls to the backend API so browsers never see the
//! backend URL and never make cross-origin requests.

pub mod error;
pub mod forwarder;
pub mod upstream;

pub use error::ForwardError;
pub use forwarder::{build_target_url, resolve_target, ForwardRequest, Forwarder};
pub use upstream::Upstream;
