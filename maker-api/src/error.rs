use thiserror::Error;

/// Errors returned by Maker API requests
///
/// Retryable failures (5xx, 408, dropped connections, timeouts) never show up
/// here directly. They are retried inside the request pipeline and only turn
/// into one of these variants once the retry budget is used up.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The hub rejected the access token (HTTP 401)
    ///
    /// Never retried: a retry cannot fix a bad token.
    #[error("Invalid access token")]
    InvalidToken,

    /// The hub answered, but the request failed
    ///
    /// Covers non-auth 4xx responses, 5xx/408 responses after the last
    /// attempt, and 200 responses whose body carries a truthy `error` field.
    /// The `url` never contains the access token.
    #[error("{method} {url} failed with status {status}: {reason}")]
    Request {
        method: String,
        url: String,
        status: u16,
        reason: String,
    },

    /// The hub could not be reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// The hub answered with a body that is not the expected JSON
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// HTTP status attached to the failure, if the hub answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::InvalidToken => Some(401),
            ApiError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Type alias for results that can return an ApiError
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_error_display() {
        let error = ApiError::Request {
            method: "GET".to_string(),
            url: "http://10.0.1.99/apps/api/1234/hsm".to_string(),
            status: 400,
            reason: "Bad Request".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "GET http://10.0.1.99/apps/api/1234/hsm failed with status 400: Bad Request"
        );
        assert_eq!(error.status(), Some(400));
    }

    #[test]
    fn test_status_of_non_http_errors() {
        assert_eq!(ApiError::InvalidToken.status(), Some(401));
        assert_eq!(ApiError::Connection("refused".into()).status(), None);
        assert_eq!(ApiError::InvalidResponse("eof".into()).status(), None);
    }
}
