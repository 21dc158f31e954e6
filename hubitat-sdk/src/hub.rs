//! Hub connection manager
//!
//! [`Hub`] owns everything needed to mirror one hub: the Maker API client,
//! the device table, the mode list and HSM status, the event listener, and
//! the listener registry that fans pushed events out to subscribers.
//!
//! Pushed events travel from the listener over a bounded channel to a single
//! processor task, which applies them to the device table and dispatches
//! them. State locks are never held across an await or while listeners run.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use callback_server::{local_ip_for, CallbackServer, EventPayload, ServerConfig, TlsConfig};
use maker_api::{ClientConfig, EventContent, MakerClient};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{resolve_event_url, validate_event_url, HubAddress, HubConfig};
use crate::device::{AttributeValue, Device, DeviceId};
use crate::error::{HubError, Result};
use crate::event::Event;
use crate::mode::{activate_mode, HsmCommand, Mode};
use crate::registry::{ListenerKey, ListenerRegistry};

/// Where a [`Hub`] is in its lifecycle
///
/// `Unstarted -> Starting -> Running -> Stopped`, or `Starting -> Failed`
/// when bootstrap fails. A stopped or failed hub cannot be started again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Unstarted,
    Starting,
    Running,
    Stopped,
    Failed,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifecycle::Unstarted => "unstarted",
            Lifecycle::Starting => "starting",
            Lifecycle::Running => "running",
            Lifecycle::Stopped => "stopped",
            Lifecycle::Failed => "failed",
        };
        f.write_str(name)
    }
}

struct HubState {
    address: HubAddress,
    /// Configured listener port
    port: Option<u16>,
    /// Explicit event URL override, as given
    event_url: Option<String>,
    tls: Option<TlsConfig>,
    /// URL and port of the running listener
    listener: Option<(String, u16)>,
    devices: HashMap<DeviceId, Device>,
    modes: Vec<Mode>,
    mode_supported: Option<bool>,
    hsm_status: Option<String>,
    hsm_supported: Option<bool>,
    lifecycle: Lifecycle,
}

/// State shared between the public handle and the event processor task
struct HubShared {
    app_id: String,
    access_token: String,
    client_config: ClientConfig,
    shutdown_timeout: Duration,
    api: RwLock<Arc<MakerClient>>,
    state: RwLock<HubState>,
    registry: ListenerRegistry,
    mode_reload_pending: AtomicBool,
}

impl HubShared {
    fn api(&self) -> Arc<MakerClient> {
        self.api.read().clone()
    }

    /// Load the device list, then each device's detail one at a time.
    async fn load_devices(&self, force_refresh: bool) -> Result<()> {
        if !force_refresh && !self.state.read().devices.is_empty() {
            return Ok(());
        }

        let devices = self.api().devices().await?;
        tracing::debug!("Loaded device list ({} devices)", devices.len());

        for summary in devices {
            self.load_device(&DeviceId::new(summary.id), force_refresh)
                .await?;
        }
        Ok(())
    }

    async fn load_device(&self, device_id: &DeviceId, force_refresh: bool) -> Result<()> {
        if !force_refresh && self.state.read().devices.contains_key(device_id) {
            return Ok(());
        }

        tracing::debug!("Loading device {}", device_id);
        let detail = self.api().device(device_id.as_str()).await?;

        let mut state = self.state.write();
        match state.devices.get_mut(device_id) {
            Some(device) => device.replace(detail),
            None => {
                state
                    .devices
                    .insert(device_id.clone(), Device::new(device_id.clone(), detail));
            }
        }
        tracing::debug!("Loaded device {}", device_id);
        Ok(())
    }

    async fn load_modes(&self) -> Result<()> {
        let modes = self.api().modes().await?;
        tracing::debug!("Loaded modes");
        self.state.write().modes = modes.into_iter().map(Mode::from).collect();
        Ok(())
    }

    async fn load_hsm_status(&self) -> Result<()> {
        let status = self.api().hsm().await?;
        tracing::debug!("Loaded hsm status");
        self.state.write().hsm_status = Some(status.hsm);
        Ok(())
    }

    fn process_event(self: &Arc<Self>, body: &Value) {
        let content = match EventContent::from_body(body) {
            Some(Ok(content)) => content,
            Some(Err(e)) => {
                tracing::warn!("Received malformed event {}: {}", body, e);
                return;
            }
            None => {
                tracing::warn!("Received invalid event: {}", body);
                return;
            }
        };
        tracing::debug!("Received event: {:?}", content);

        if let Some(device_id) = content.device_id.as_deref() {
            let device_id = DeviceId::new(device_id);
            self.update_device_attr(&device_id, &content);
            self.registry
                .dispatch(&ListenerKey::Device(device_id), &Event::from(content));
        } else if matches!(content.name.as_str(), "mode" | "hsmStatus")
            && content.value.is_null()
        {
            tracing::warn!("Received {} event without a value: {}", content.name, body);
        } else if content.name == "mode" {
            let name = AttributeValue::from_json(&content.value).to_string();
            let known = activate_mode(&mut self.state.write().modes, &name);
            if !known {
                tracing::info!("Hub reported unknown mode {}, reloading modes", name);
                self.schedule_mode_reload();
            }
            self.registry.dispatch(&ListenerKey::Mode, &Event::from(content));
        } else if content.name == "hsmStatus" {
            let status = AttributeValue::from_json(&content.value).to_string();
            self.state.write().hsm_status = Some(status);
            self.registry.dispatch(&ListenerKey::Hsm, &Event::from(content));
        } else {
            tracing::trace!("Ignoring {} event", content.name);
        }
    }

    fn update_device_attr(&self, device_id: &DeviceId, content: &EventContent) {
        tracing::debug!(
            "Updating {} of {} to {} ({:?})",
            content.name,
            device_id,
            content.value,
            content.unit
        );

        let mut state = self.state.write();
        match state.devices.get_mut(device_id) {
            Some(device) => {
                device.update_attribute(
                    &content.name,
                    AttributeValue::from_json(&content.value),
                    content.unit.clone(),
                );
            }
            None => tracing::warn!("Tried to update unknown device {}", device_id),
        }
    }

    /// Reload the mode list in the background; overlapping requests collapse into one.
    fn schedule_mode_reload(self: &Arc<Self>) {
        if self.mode_reload_pending.swap(true, Ordering::AcqRel) {
            tracing::debug!("Mode reload already pending");
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime available to reload modes");
            self.mode_reload_pending.store(false, Ordering::Release);
            return;
        };

        let shared = Arc::clone(self);
        runtime.spawn(async move {
            if let Err(e) = shared.load_modes().await {
                tracing::warn!("Unable to reload modes: {}", e);
            }
            shared.mode_reload_pending.store(false, Ordering::Release);
        });
    }
}

/// Connection to one Hubitat hub through its Maker API app
///
/// # Example
///
/// ```no_run
/// use hubitat_sdk::{Hub, HubConfig};
///
/// # async fn example() -> hubitat_sdk::Result<()> {
/// let hub = Hub::new(HubConfig::new("http://10.0.1.99", "1234", "token"))?;
/// hub.start().await?;
///
/// hub.add_device_listener("176", |event| {
///     println!("{} is now {}", event.attribute, event.value);
/// });
///
/// hub.send_command("176", "on", None).await?;
/// # Ok(())
/// # }
/// ```
pub struct Hub {
    shared: Arc<HubShared>,
    listener: tokio::sync::Mutex<Option<CallbackServer>>,
    event_tx: mpsc::Sender<EventPayload>,
    event_rx: Mutex<Option<mpsc::Receiver<EventPayload>>>,
    processor: Mutex<Option<JoinHandle<()>>>,
}

impl Hub {
    /// Create a hub connection. Nothing is contacted until [`start`](Self::start).
    ///
    /// Fails with [`HubError::InvalidConfig`] when host, app id or token is missing.
    pub fn new(config: HubConfig) -> Result<Self> {
        config.validate()?;

        let address = HubAddress::parse(&config.host)?;
        let client_config = config.client_config();
        let api = MakerClient::new(
            address.api_url(&config.app_id),
            config.access_token.clone(),
            client_config.clone(),
        )?;
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer_size);

        let state = HubState {
            address,
            port: config.event_port(),
            event_url: config.event_url.clone(),
            tls: config.tls.clone(),
            listener: None,
            devices: HashMap::new(),
            modes: Vec::new(),
            mode_supported: None,
            hsm_status: None,
            hsm_supported: None,
            lifecycle: Lifecycle::Unstarted,
        };

        let hub = Self {
            shared: Arc::new(HubShared {
                app_id: config.app_id,
                access_token: config.access_token,
                client_config,
                shutdown_timeout: config.shutdown_timeout,
                api: RwLock::new(Arc::new(api)),
                state: RwLock::new(state),
                registry: ListenerRegistry::new(),
                mode_reload_pending: AtomicBool::new(false),
            }),
            listener: tokio::sync::Mutex::new(None),
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
            processor: Mutex::new(None),
        };

        tracing::info!("Created hub {:?}", hub);
        Ok(hub)
    }

    /// Connect to the hub and load its initial state.
    ///
    /// Starts the event listener, registers its URL with the hub, and loads
    /// every device. Failures in any of those steps are returned and leave
    /// the hub [`Lifecycle::Failed`]. Modes and HSM status are loaded
    /// afterwards; if the hub does not support them the matching
    /// `*_supported` flag becomes `Some(false)` and startup still succeeds.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.shared.state.write();
            if state.lifecycle != Lifecycle::Unstarted {
                return Err(HubError::InvalidState(state.lifecycle));
            }
            state.lifecycle = Lifecycle::Starting;
            state.mode_supported = None;
            state.hsm_supported = None;
        }

        if let Err(e) = self.connect().await {
            tracing::error!("Failed to connect to hub at {}: {}", self.host(), e);
            self.shutdown_listener().await;
            self.abort_processor();
            self.shared.state.write().lifecycle = Lifecycle::Failed;
            return Err(e);
        }

        match self.shared.load_modes().await {
            Ok(()) => self.shared.state.write().mode_supported = Some(true),
            Err(e) => {
                self.shared.state.write().mode_supported = Some(false);
                tracing::warn!("Unable to access modes: {}", e);
            }
        }

        match self.shared.load_hsm_status().await {
            Ok(()) => self.shared.state.write().hsm_supported = Some(true),
            Err(e) => {
                self.shared.state.write().hsm_supported = Some(false);
                tracing::warn!("Unable to access HSM status: {}", e);
            }
        }

        let mut state = self.shared.state.write();
        if state.lifecycle == Lifecycle::Starting {
            state.lifecycle = Lifecycle::Running;
        }
        Ok(())
    }

    async fn connect(&self) -> Result<()> {
        self.spawn_processor();

        let server = self.bind_listener().await?;
        *self.listener.lock().await = Some(server);
        self.register_event_url().await?;

        self.shared.load_devices(false).await?;
        tracing::debug!("Connected to Hubitat hub at {}", self.host());
        Ok(())
    }

    /// Stop the event listener and remove all listeners.
    ///
    /// Safe to call more than once, and after a failed start.
    pub async fn stop(&self) {
        self.shutdown_listener().await;
        self.abort_processor();
        self.shared.registry.clear();

        let mut state = self.shared.state.write();
        if state.lifecycle != Lifecycle::Failed {
            state.lifecycle = Lifecycle::Stopped;
        }
    }

    /// Verify that the hub is reachable and accepts the access token.
    pub async fn check_config(&self) -> Result<()> {
        self.shared.api().devices().await?;
        Ok(())
    }

    /// Load all devices. Without `force_refresh` nothing happens if devices
    /// are already loaded.
    pub async fn load_devices(&self, force_refresh: bool) -> Result<()> {
        self.shared.load_devices(force_refresh).await
    }

    /// Reload one known device, replacing its attributes, capabilities and commands.
    pub async fn refresh_device(&self, device_id: &str) -> Result<()> {
        let device_id = DeviceId::new(device_id);
        if !self.shared.state.read().devices.contains_key(&device_id) {
            return Err(HubError::UnknownDevice(device_id));
        }
        self.shared.load_device(&device_id, true).await
    }

    /// Send a command to a device, with an optional argument.
    pub async fn send_command(
        &self,
        device_id: &str,
        command: &str,
        arg: Option<&str>,
    ) -> Result<Value> {
        tracing::debug!("Sending command {}({:?}) to {}", command, arg, device_id);
        Ok(self
            .shared
            .api()
            .send_command(device_id, command, arg)
            .await?)
    }

    /// Send a command whose arguments are joined with commas.
    pub async fn send_command_with_args(
        &self,
        device_id: &str,
        command: &str,
        args: &[&str],
    ) -> Result<Value> {
        let joined = args.join(",");
        let arg = (!joined.is_empty()).then_some(joined.as_str());
        self.send_command(device_id, command, arg).await
    }

    /// Activate the mode called `name`.
    pub async fn set_mode(&self, name: &str) -> Result<()> {
        let mode_id = self
            .shared
            .state
            .read()
            .modes
            .iter()
            .find(|mode| mode.name == name)
            .and_then(|mode| mode.id.clone());

        let Some(mode_id) = mode_id else {
            tracing::error!("Invalid mode: {}", name);
            return Err(HubError::InvalidMode(name.to_string()));
        };

        let modes = self.shared.api().set_mode(&mode_id).await?;
        self.shared.state.write().modes = modes.into_iter().map(Mode::from).collect();
        Ok(())
    }

    pub async fn set_hsm(&self, command: HsmCommand) -> Result<()> {
        let status = self.shared.api().set_hsm(command.as_str()).await?;
        tracing::debug!("HSM is now {}", status.hsm);
        self.shared.state.write().hsm_status = Some(status.hsm);
        Ok(())
    }

    /// Point the hub at a different event URL, or back at the listener with `None`.
    ///
    /// While running, the URL is registered with the hub right away;
    /// otherwise it is used when the hub starts.
    pub async fn set_event_url(&self, event_url: Option<String>) -> Result<()> {
        let event_url = event_url.filter(|url| !url.is_empty());
        if let Some(url) = &event_url {
            validate_event_url(url)?;
        }
        self.shared.state.write().event_url = event_url;

        if self.lifecycle() != Lifecycle::Running {
            return Ok(());
        }
        self.register_event_url().await
    }

    /// Change the hub address. Affects the next request; requests in flight
    /// keep the old address.
    pub fn set_host(&self, host: &str) -> Result<()> {
        let address = HubAddress::parse(host)?;
        let api = MakerClient::new(
            address.api_url(&self.shared.app_id),
            self.shared.access_token.clone(),
            self.shared.client_config.clone(),
        )?;

        tracing::debug!("Setting host to {}", address.host());
        *self.shared.api.write() = Arc::new(api);
        self.shared.state.write().address = address;
        Ok(())
    }

    /// Change the listener port, restarting the listener and re-registering
    /// the event URL if it is running.
    ///
    /// If re-registration fails the new listener is already up, but the hub
    /// may still be posting to the old URL.
    pub async fn set_port(&self, port: u16) -> Result<()> {
        tracing::info!("Setting port to {}", port);
        self.shared.state.write().port = Some(port);
        self.restart_listener().await
    }

    /// Serve the listener over HTTPS with `tls`, or plain HTTP with `None`.
    ///
    /// Restarts a running listener the same way [`set_port`](Self::set_port) does.
    pub async fn set_tls(&self, tls: Option<TlsConfig>) -> Result<()> {
        if tls.is_some() {
            tracing::debug!("Enabling SSL for event listener server");
        } else {
            tracing::debug!("Disabling SSL for event listener server");
        }
        self.shared.state.write().tls = tls;
        self.restart_listener().await
    }

    /// Feed a raw event body through the same path the listener uses.
    pub fn process_event(&self, body: &Value) {
        self.shared.process_event(body);
    }

    pub fn add_device_listener<F>(&self, device_id: impl Into<DeviceId>, listener: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.shared
            .registry
            .subscribe(ListenerKey::Device(device_id.into()), listener);
    }

    pub fn add_mode_listener<F>(&self, listener: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.shared.registry.subscribe(ListenerKey::Mode, listener);
    }

    pub fn add_hsm_listener<F>(&self, listener: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.shared.registry.subscribe(ListenerKey::Hsm, listener);
    }

    pub fn remove_device_listeners(&self, device_id: impl Into<DeviceId>) {
        self.shared
            .registry
            .unsubscribe_all(&ListenerKey::Device(device_id.into()));
    }

    pub fn remove_mode_listeners(&self) {
        self.shared.registry.unsubscribe_all(&ListenerKey::Mode);
    }

    pub fn remove_hsm_listeners(&self) {
        self.shared.registry.unsubscribe_all(&ListenerKey::Hsm);
    }

    /// The listener registry, for registering under arbitrary keys
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.shared.registry
    }

    /// Snapshot of the device table
    pub fn devices(&self) -> HashMap<DeviceId, Device> {
        self.shared.state.read().devices.clone()
    }

    pub fn device(&self, device_id: &str) -> Option<Device> {
        self.shared.state.read().devices.get(device_id).cloned()
    }

    /// Name of the active mode
    pub fn mode(&self) -> Option<String> {
        self.shared
            .state
            .read()
            .modes
            .iter()
            .find(|mode| mode.active)
            .map(|mode| mode.name.clone())
    }

    pub fn modes(&self) -> Vec<Mode> {
        self.shared.state.read().modes.clone()
    }

    pub fn hsm_status(&self) -> Option<String> {
        self.shared.state.read().hsm_status.clone()
    }

    /// Whether the hub exposes modes; `None` until [`start`](Self::start) has tried.
    pub fn mode_supported(&self) -> Option<bool> {
        self.shared.state.read().mode_supported
    }

    /// Whether the hub exposes HSM; `None` until [`start`](Self::start) has tried.
    pub fn hsm_supported(&self) -> Option<bool> {
        self.shared.state.read().hsm_supported
    }

    /// Hub host, with port when one was given
    pub fn host(&self) -> String {
        self.shared.state.read().address.host().to_string()
    }

    pub fn api_url(&self) -> String {
        self.shared.api().api_url().to_string()
    }

    pub fn app_id(&self) -> &str {
        &self.shared.app_id
    }

    /// Configured listener port
    pub fn port(&self) -> Option<u16> {
        self.shared.state.read().port
    }

    /// Port the running listener is bound to
    pub fn listener_port(&self) -> Option<u16> {
        self.shared.state.read().listener.as_ref().map(|(_, port)| *port)
    }

    /// URL the hub is told to post events to
    pub fn event_url(&self) -> Option<String> {
        let state = self.shared.state.read();
        resolve_event_url(
            state.event_url.as_deref(),
            state.port,
            state
                .listener
                .as_ref()
                .map(|(url, port)| (url.as_str(), *port)),
        )
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.state.read().lifecycle
    }

    fn spawn_processor(&self) {
        let Some(mut event_rx) = self.event_rx.lock().take() else {
            return;
        };

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            while let Some(payload) = event_rx.recv().await {
                shared.process_event(&payload.body);
            }
            tracing::debug!("Event processor stopped");
        });
        *self.processor.lock() = Some(handle);
    }

    fn abort_processor(&self) {
        if let Some(handle) = self.processor.lock().take() {
            handle.abort();
        }
    }

    async fn bind_listener(&self) -> Result<CallbackServer> {
        let (hostname, port, tls) = {
            let state = self.shared.state.read();
            (
                state.address.hostname().to_string(),
                state.port.unwrap_or(0),
                state.tls.clone(),
            )
        };

        let ip = tokio::task::spawn_blocking(move || local_ip_for(&hostname))
            .await
            .map_err(|e| HubError::Connection(e.to_string()))??;

        let config = ServerConfig::new(ip, port)
            .with_tls(tls)
            .with_shutdown_timeout(self.shared.shutdown_timeout);
        let server = CallbackServer::start(config, self.event_tx.clone()).await?;

        tracing::debug!(
            "Listening on {} with SSL {}",
            server.local_addr(),
            if server.is_tls() { "enabled" } else { "disabled" }
        );
        self.shared.state.write().listener = Some((server.url(), server.port()));
        Ok(server)
    }

    async fn shutdown_listener(&self) {
        let server = self.listener.lock().await.take();
        if let Some(mut server) = server {
            server.shutdown().await;
            tracing::info!("Stopped event server");
        }
        self.shared.state.write().listener = None;
    }

    /// Rebind the listener of a running hub with the current port and TLS
    /// settings, then re-register the event URL.
    ///
    /// A previous failed rebind leaves no listener behind; the next call
    /// still binds a new one.
    async fn restart_listener(&self) -> Result<()> {
        if self.lifecycle() != Lifecycle::Running {
            return Ok(());
        }

        let mut listener = self.listener.lock().await;
        if let Some(mut old) = listener.take() {
            old.shutdown().await;
        }
        self.shared.state.write().listener = None;
        *listener = Some(self.bind_listener().await?);
        drop(listener);

        self.register_event_url().await
    }

    async fn register_event_url(&self) -> Result<()> {
        let event_url = self
            .event_url()
            .ok_or_else(|| HubError::InvalidState(self.lifecycle()))?;

        tracing::info!("Setting event update URL to {}", event_url);
        self.shared.api().set_post_url(&event_url).await?;
        Ok(())
    }
}

impl Drop for Hub {
    fn drop(&mut self) {
        self.abort_processor();
    }
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.read();
        f.debug_struct("Hub")
            .field("host", &state.address.host())
            .field("app_id", &self.shared.app_id)
            .field("lifecycle", &state.lifecycle)
            .field("devices", &state.devices.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maker_api::DeviceDetail;
    use serde_json::json;

    fn hub() -> Hub {
        Hub::new(HubConfig::new("1.2.3.4", "1234", "token")).unwrap()
    }

    fn seed(hub: &Hub) {
        let detail: DeviceDetail = serde_json::from_value(json!({
            "id": "176",
            "label": "Kitchen Light",
            "attributes": [
                {"name": "switch", "currentValue": "off", "dataType": "ENUM"},
                {"name": "level", "currentValue": 50, "dataType": "NUMBER", "unit": "%"}
            ],
            "capabilities": ["Switch"],
            "commands": ["on", "off"]
        }))
        .unwrap();

        let mut state = hub.shared.state.write();
        state
            .devices
            .insert(DeviceId::new("176"), Device::new(DeviceId::new("176"), detail));
        state.modes = vec![
            Mode {
                id: Some("1".into()),
                name: "Day".into(),
                active: true,
            },
            Mode {
                id: Some("2".into()),
                name: "Night".into(),
                active: false,
            },
        ];
    }

    fn recorder(hub: &Hub, key: ListenerKey) -> Arc<Mutex<Vec<Event>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        hub.listeners()
            .subscribe(key, move |event| sink.lock().push(event.clone()));
        events
    }

    #[test]
    fn test_new_hub_is_empty() {
        let hub = hub();
        assert!(hub.devices().is_empty());
        assert_eq!(hub.lifecycle(), Lifecycle::Unstarted);
        assert_eq!(hub.mode_supported(), None);
        assert_eq!(hub.hsm_supported(), None);
        assert_eq!(hub.api_url(), "http://1.2.3.4/apps/api/1234");
        assert_eq!(hub.event_url(), None);
    }

    #[test]
    fn test_new_hub_rejects_missing_token() {
        let result = Hub::new(HubConfig::new("1.2.3.4", "1234", ""));
        assert!(matches!(result, Err(HubError::InvalidConfig(_))));
    }

    #[test]
    fn test_device_event_updates_and_dispatches() {
        let hub = hub();
        seed(&hub);
        let events = recorder(&hub, ListenerKey::Device(DeviceId::new("176")));

        hub.process_event(&json!({
            "content": {"deviceId": "176", "name": "switch", "value": "on", "unit": null}
        }));

        let device = hub.device("176").unwrap();
        assert_eq!(device.get_attribute("switch"), Some(&AttributeValue::from("on")));
        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].attribute, "switch");
        assert_eq!(events[0].value, "on");
    }

    #[test]
    fn test_unknown_attribute_still_dispatches() {
        let hub = hub();
        seed(&hub);
        let events = recorder(&hub, ListenerKey::Device(DeviceId::new("176")));
        let before = hub.device("176").unwrap();

        hub.process_event(&json!({
            "content": {"deviceId": "176", "name": "temperature", "value": 21.5, "unit": "°C"}
        }));

        assert_eq!(hub.device("176").unwrap().attributes(), before.attributes());
        assert_eq!(events.lock().len(), 1);
    }

    #[test]
    fn test_event_for_unknown_device_is_dispatched_without_update() {
        let hub = hub();
        let events = recorder(&hub, ListenerKey::Device(DeviceId::new("999")));

        hub.process_event(&json!({
            "content": {"deviceId": 999, "name": "switch", "value": "on"}
        }));

        assert!(hub.devices().is_empty());
        assert_eq!(events.lock().len(), 1);
    }

    #[test]
    fn test_known_mode_event() {
        let hub = hub();
        seed(&hub);
        let events = recorder(&hub, ListenerKey::Mode);

        hub.process_event(&json!({
            "content": {"deviceId": null, "name": "mode", "value": "Night"}
        }));

        assert_eq!(hub.mode().as_deref(), Some("Night"));
        assert_eq!(hub.modes().len(), 2);
        assert_eq!(events.lock().len(), 1);
    }

    #[test]
    fn test_unknown_mode_event_without_runtime_keeps_placeholder() {
        let hub = hub();
        seed(&hub);

        hub.process_event(&json!({
            "content": {"deviceId": null, "name": "mode", "value": "Vacation"}
        }));

        let modes = hub.modes();
        assert_eq!(modes.len(), 3);
        assert!(modes[2].active && modes[2].is_placeholder());
        assert!(!modes[0].active);
        assert!(!hub.shared.mode_reload_pending.load(Ordering::Acquire));
    }

    #[test]
    fn test_hsm_event() {
        let hub = hub();
        let events = recorder(&hub, ListenerKey::Hsm);

        hub.process_event(&json!({
            "content": {"deviceId": null, "name": "hsmStatus", "value": "armedAway"}
        }));

        assert_eq!(hub.hsm_status().as_deref(), Some("armedAway"));
        assert_eq!(events.lock()[0].value, "armedAway");
    }

    #[test]
    fn test_mode_and_hsm_events_without_value_are_dropped() {
        let hub = hub();
        seed(&hub);
        hub.shared.state.write().hsm_status = Some("disarmed".to_string());
        let mode_events = recorder(&hub, ListenerKey::Mode);
        let hsm_events = recorder(&hub, ListenerKey::Hsm);

        hub.process_event(&json!({"content": {"deviceId": null, "name": "mode", "value": null}}));
        hub.process_event(&json!({"content": {"deviceId": null, "name": "hsmStatus"}}));

        assert_eq!(hub.modes().len(), 2);
        assert_eq!(hub.mode().as_deref(), Some("Day"));
        assert_eq!(hub.hsm_status().as_deref(), Some("disarmed"));
        assert!(mode_events.lock().is_empty());
        assert!(hsm_events.lock().is_empty());
        assert!(!hub.shared.mode_reload_pending.load(Ordering::Acquire));
    }

    #[test]
    fn test_unrelated_and_invalid_events_are_ignored() {
        let hub = hub();
        seed(&hub);
        let mode_events = recorder(&hub, ListenerKey::Mode);

        hub.process_event(&json!({"content": {"deviceId": null, "name": "sunrise", "value": "true"}}));
        hub.process_event(&json!({"something": "else"}));
        hub.process_event(&json!({"content": {"value": "no name"}}));
        hub.process_event(&json!("not an object"));

        assert!(mode_events.lock().is_empty());
        assert_eq!(hub.mode().as_deref(), Some("Day"));
        assert_eq!(hub.hsm_status(), None);
    }

    #[test]
    fn test_lifecycle_display() {
        assert_eq!(Lifecycle::Running.to_string(), "running");
        assert_eq!(Lifecycle::Failed.to_string(), "failed");
    }

    #[test]
    fn test_set_host_rewrites_api_url() {
        let hub = hub();
        hub.set_host("https://hub.local:8443").unwrap();
        assert_eq!(hub.api_url(), "https://hub.local:8443/apps/api/1234");
        assert_eq!(hub.host(), "hub.local:8443");
        assert!(hub.set_host("").is_err());
    }

    #[tokio::test]
    async fn test_set_mode_rejects_unknown_name() {
        let hub = hub();
        seed(&hub);
        let result = hub.set_mode("Party").await;
        assert!(matches!(result, Err(HubError::InvalidMode(name)) if name == "Party"));
    }

    #[tokio::test]
    async fn test_refresh_unknown_device() {
        let hub = hub();
        let result = hub.refresh_device("42").await;
        assert!(matches!(result, Err(HubError::UnknownDevice(id)) if id.as_str() == "42"));
    }

    #[tokio::test]
    async fn test_reconfigure_before_start_only_stores() {
        let hub = hub();
        hub.set_port(39501).await.unwrap();
        hub.set_event_url(Some("http://proxy.local/hook".into()))
            .await
            .unwrap();

        assert_eq!(hub.port(), Some(39501));
        assert_eq!(hub.listener_port(), None);
        assert_eq!(
            hub.event_url().as_deref(),
            Some("http://proxy.local:39501/hook")
        );
        assert!(hub.set_event_url(Some("nope".into())).await.is_err());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_terminal() {
        let hub = hub();
        hub.add_mode_listener(|_| {});

        hub.stop().await;
        hub.stop().await;

        assert_eq!(hub.lifecycle(), Lifecycle::Stopped);
        assert!(hub.listeners().is_empty());
        assert!(matches!(
            hub.start().await,
            Err(HubError::InvalidState(Lifecycle::Stopped))
        ));
    }
}
