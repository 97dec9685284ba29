use thiserror::Error;

/// Errors returned by the Web Control protocol client
///
/// Transport and protocol failures are kept apart so the session layer can
/// tell an unreachable player from one that answered with nonsense.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network communication error
    ///
    /// Connection refused, timeouts, DNS failures and broken bodies all end up
    /// here.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Response parsing error
    ///
    /// The player answered, but the body could not be turned into the
    /// expected value (bad JSON, non-numeric status, out-of-range volume).
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Non-success HTTP status returned by the plugin
    #[error("HTTP error: status code {0}")]
    HttpStatus(u16),

    /// The player reported that the requested playlist does not exist
    #[error("Playlist {0} not found")]
    PlaylistNotFound(i64),

    /// The player answered a JSON request with a status other than "OK"
    #[error("Remote failure: {0}")]
    RemoteFailure(String),

    /// Invalid parameter value
    ///
    /// Rejected locally, before any request is sent.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ApiError {
    /// Whether the error came from the transport rather than the response
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::NetworkError(_) | ApiError::HttpStatus(_))
    }

    /// Whether the player answered with something that violates the protocol
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            ApiError::ParseError(_) | ApiError::PlaylistNotFound(_) | ApiError::RemoteFailure(_)
        )
    }
}

/// Type alias for results that can return an ApiError
pub type Result<T> = std::result::Result<T, ApiError>;

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => ApiError::HttpStatus(status.as_u16()),
            None => ApiError::NetworkError(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        ApiError::ParseError(error.to_string())
    }
}
