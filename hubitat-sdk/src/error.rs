//! Error types for hub operations

use callback_server::ServerError;
use maker_api::ApiError;

use crate::device::DeviceId;
use crate::hub::Lifecycle;

/// Errors surfaced by [`Hub`](crate::Hub)
///
/// The variants are chosen so that a failed `start()` tells bad credentials,
/// an unreachable hub and a hub that answers nonsense apart.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Missing or malformed host, app id, access token or event URL
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The hub rejected the access token
    #[error("Invalid access token")]
    InvalidToken,

    /// The hub answered but the request failed
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

    /// The hub answered with a body of the wrong shape
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// `set_mode` was given a name the hub does not know
    #[error("Invalid mode: {0}")]
    InvalidMode(String),

    #[error("Unknown device: {0}")]
    UnknownDevice(DeviceId),

    /// The operation is not allowed in the hub's current lifecycle state
    #[error("Operation not allowed while hub is {0}")]
    InvalidState(Lifecycle),

    /// The event listener could not be started
    #[error("Event listener error: {0}")]
    Listener(#[from] ServerError),
}

impl From<ApiError> for HubError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::InvalidToken => HubError::InvalidToken,
            ApiError::Request {
                method,
                url,
                status,
                reason,
            } => HubError::Request {
                method,
                url,
                status,
                reason,
            },
            ApiError::Connection(msg) => HubError::Connection(msg),
            ApiError::InvalidResponse(msg) => HubError::MalformedPayload(msg),
        }
    }
}

/// Type alias for results that can return a HubError
pub type Result<T> = std::result::Result<T, HubError>;
