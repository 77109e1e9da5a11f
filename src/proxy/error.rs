use std::io;

/// Failure while relaying a request to the backend.
///
/// None of these are handled by the forwarder itself; the server layer
/// turns them into a response (`400` for [`ForwardError::OutsideBase`],
/// 5xx otherwise).
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("invalid backend URL `{url}`")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("target `{url}` resolves outside the backend base path")]
    OutsideBase { url: String },

    #[error("unsupported backend URL scheme `{0}`")]
    UnsupportedScheme(String),

    #[error("backend URL has no host")]
    MissingHost,

    #[error("failed to connect to backend at {addr}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("backend {0} timed out")]
    Timeout(&'static str),

    #[error("backend I/O error")]
    Io(#[from] io::Error),

    #[error("malformed backend response: {0}")]
    MalformedResponse(String),
}

impl ForwardError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ForwardError::Timeout(_))
    }

    /// The client's request, not the backend, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ForwardError::OutsideBase { .. })
    }
}
