use super::ApiError;

/// Classified result of one executed request (after retries).
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome<T> {
    Success(T),
    /// 4xx (and any other non-success status below 500); never retried
    ClientError { status: u16, message: String },
    /// 5xx; retried while retries remain
    ServerError { status: u16, message: String },
    /// The per-attempt timer fired before a response arrived; retried
    Timeout,
    /// DNS, refused connection, broken body; not retried
    NetworkFailure(String),
}

impl<T> RequestOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, RequestOutcome::Success(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, RequestOutcome::ServerError { .. } | RequestOutcome::Timeout)
    }

    /// Short label for log fields
    pub fn label(&self) -> &'static str {
        match self {
            RequestOutcome::Success(_) => "success",
            RequestOutcome::ClientError { .. } => "client_error",
            RequestOutcome::ServerError { .. } => "server_error",
            RequestOutcome::Timeout => "timeout",
            RequestOutcome::NetworkFailure(_) => "network_failure",
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RequestOutcome<U> {
        match self {
            RequestOutcome::Success(value) => RequestOutcome::Success(f(value)),
            RequestOutcome::ClientError { status, message } => RequestOutcome::ClientError { status, message },
            RequestOutcome::ServerError { status, message } => RequestOutcome::ServerError { status, message },
            RequestOutcome::Timeout => RequestOutcome::Timeout,
            RequestOutcome::NetworkFailure(message) => RequestOutcome::NetworkFailure(message),
        }
    }

    pub fn into_result(self) -> Result<T, ApiError> {
        match self {
            RequestOutcome::Success(value) => Ok(value),
            RequestOutcome::ClientError { status, message } => Err(ApiError::ClientError { status, message }),
            RequestOutcome::ServerError { status, message } => Err(ApiError::ServerError { status, message }),
            RequestOutcome::Timeout => Err(ApiError::Timeout),
            RequestOutcome::NetworkFailure(message) => Err(ApiError::Network(message)),
        }
    }
}
