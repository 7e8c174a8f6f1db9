use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Client error {status}: {message}")]
    ClientError { status: u16, message: String },

    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to encode request body: {0}")]
    Encode(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        let message = Self::truncate_body(body);
        if status >= 500 {
            ApiError::ServerError { status, message }
        } else {
            ApiError::ClientError { status, message }
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ClientError { status, .. } | ApiError::ServerError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server errors and timeouts are transient
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::ServerError { .. } | ApiError::Timeout)
    }

    /// Failures that say the upstream is unhealthy rather than that the
    /// request was wrong
    pub fn indicates_outage(&self) -> bool {
        matches!(self, ApiError::ServerError { .. } | ApiError::Timeout | ApiError::Network(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// 429 is a client error like any other 4xx and is not retried
    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }
}
