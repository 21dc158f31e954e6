//! Typed client for the Hubitat Maker API.
//!
//! This crate covers the request side of talking to a hub: building Maker
//! API URLs, authenticating with the app's access token, retrying transient
//! failures with a linear backoff, and decoding the hub's loosely typed JSON
//! into wire structs.
//!
//! Higher-level state (device tables, modes, event fanout) lives in
//! `hubitat-sdk`; this crate is stateless apart from its HTTP client.
//!
//! # Example
//!
//! ```no_run
//! use maker_api::{ClientConfig, MakerClient, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> maker_api::Result<()> {
//! let config = ClientConfig {
//!     retry: RetryPolicy::new(5, Duration::from_millis(250)),
//!     ..ClientConfig::default()
//! };
//! let client = MakerClient::new("http://10.0.1.99/apps/api/1234", "token", config)?;
//!
//! let modes = client.modes().await?;
//! let status = client.hsm().await?;
//! println!("{} modes, hsm {}", modes.len(), status.hsm);
//! # Ok(())
//! # }
//! ```

mod client;
pub mod error;
pub mod models;
pub mod retry;

pub use client::{encode_url, ClientConfig, MakerClient};
pub use error::{ApiError, Result};
pub use models::{
    AttributeInfo, DeviceDetail, DeviceSummary, EventContent, HsmStatus, ModeInfo,
};
pub use retry::{classify_status, classify_transport, RetryDecision, RetryPolicy, TransportFailure};
