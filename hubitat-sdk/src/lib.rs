//! # Hubitat SDK - live device state for Hubitat hubs
//!
//! Connects to a hub through its Maker API app, loads every device, and keeps
//! the local copy current from the events the hub pushes back:
//!
//! ```rust,no_run
//! use hubitat_sdk::{Hub, HubConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hubitat_sdk::HubError> {
//!     let hub = Hub::new(HubConfig::new("http://10.0.1.99", "1234", "token"))?;
//!     hub.start().await?;
//!
//!     for device in hub.devices().values() {
//!         println!("{device}: {:?}", device.get_attribute("switch"));
//!     }
//!
//!     hub.add_mode_listener(|event| println!("Mode is now {}", event.value));
//!     hub.send_command("176", "on", None).await?;
//!
//!     hub.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! hubitat-sdk (Hub: device table, modes, HSM, listeners)
//!     ↓                         ↑
//! maker-api (requests)     callback-server (pushed events)
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod hub;
pub mod logging;
pub mod mode;
pub mod registry;

pub use config::{HubAddress, HubConfig};
pub use device::{Attribute, AttributeValue, DataType, Device, DeviceId};
pub use error::{HubError, Result};
pub use event::Event;
pub use hub::{Hub, Lifecycle};
pub use mode::{HsmCommand, Mode};
pub use registry::{Listener, ListenerKey, ListenerRegistry};

pub use callback_server::TlsConfig;
pub use maker_api::RetryPolicy;
