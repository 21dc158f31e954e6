//! HTTP listener for Hubitat Maker API event push notifications.
//!
//! The hub POSTs a JSON document to a URL registered with the Maker API app
//! every time something changes. This crate owns the receiving end of that
//! push: it binds a local port, accepts `POST /` with a JSON body, and hands
//! every decoded body to a channel. It has no knowledge of what the body means.
//!
//! # Overview
//!
//! - [`CallbackServer`]: HTTP (or HTTPS) server bound to a local address.
//! - [`EventRouter`]: Pushes decoded bodies into a bounded channel in the
//!   order they were accepted.
//! - [`EventPayload`]: A decoded JSON body plus the address it came from.
//! - [`local_ip_for`]: Picks the local address that routes to the hub, for
//!   building the URL the hub should call back.
//!
//! # Example
//!
//! ```no_run
//! use callback_server::{local_ip_for, CallbackServer, EventPayload, ServerConfig};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (tx, mut rx) = mpsc::channel::<EventPayload>(1024);
//!
//!     let ip = local_ip_for("192.168.1.50")?;
//!     let mut server = CallbackServer::start(ServerConfig::new(ip, 0), tx).await?;
//!     println!("Register this URL with the hub: {}", server.url());
//!
//!     tokio::spawn(async move {
//!         while let Some(payload) = rx.recv().await {
//!             println!("{}", payload.body);
//!         }
//!     });
//!
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Private Workspace Crate
//!
//! This crate is intended for internal use within the workspace and is not published
//! to crates.io.

pub mod error;
pub mod router;
mod server;

pub use error::{Result, ServerError};
pub use router::{EventPayload, EventRouter};
pub use server::{local_ip_for, CallbackServer, ServerConfig, TlsConfig};
