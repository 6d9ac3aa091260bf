use thiserror::Error;

/// Errors raised while fetching, decoding or verifying a run stream.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid base URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// The server rejected the request before streaming.
    #[error("server responded {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid event frame: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
        frame: String,
    },

    /// The body is not a valid `text/event-stream`.
    #[error("malformed event stream: {message}")]
    Stream { message: String },

    /// The stream broke the run lifecycle rules.
    #[error("{message}")]
    Protocol { message: String },
}

impl ClientError {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
