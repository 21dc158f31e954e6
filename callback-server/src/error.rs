//! Error types for the callback server.

use std::net::SocketAddr;

/// Errors that can occur while starting the event listener.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listener could not bind its address
    #[error("Failed to bind event listener to {addr}: {reason}")]
    Bind {
        /// The address that was requested
        addr: SocketAddr,
        /// Why the bind failed
        reason: String,
    },

    /// The TLS certificate or key could not be used
    #[error("Invalid TLS material: {0}")]
    Tls(String),

    /// The local address that reaches the hub could not be determined
    #[error("Failed to detect local address for {host}: {reason}")]
    AddressDetection {
        /// The host that was probed
        host: String,
        /// Why detection failed
        reason: String,
    },

    /// The server task exited before reporting that it was ready
    #[error("Event listener on {0} exited before it was ready")]
    StartFailed(SocketAddr),
}

/// Convenience type alias for Results using ServerError.
pub type Result<T> = std::result::Result<T, ServerError>;
