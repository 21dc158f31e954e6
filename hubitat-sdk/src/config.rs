//! Configuration for a hub connection
//!
//! [`HubConfig`] collects everything needed to talk to one Maker API app:
//! where the hub is, which app instance to use, the access token, and how
//! the local event listener should be exposed to the hub.

use std::time::Duration;

use callback_server::TlsConfig;
use maker_api::{ClientConfig, RetryPolicy};
use url::Url;

use crate::error::{HubError, Result};

/// Configuration for a [`Hub`](crate::Hub)
///
/// # Example
///
/// ```
/// use hubitat_sdk::HubConfig;
/// use std::time::Duration;
///
/// let config = HubConfig::new("http://10.0.1.99", "1234", "token")
///     .with_port(39501)
///     .with_request_timeout(Duration::from_secs(5));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone)]
pub struct HubConfig {
    /// Hub address, with or without scheme and port
    pub host: String,

    /// Maker API app instance id
    pub app_id: String,

    /// Maker API access token
    pub access_token: String,

    /// Port for the event listener
    /// Default: none (any free port)
    pub port: Option<u16>,

    /// URL the hub should POST events to, when it differs from the listener's own
    /// Default: none (use the listener URL)
    pub event_url: Option<String>,

    /// Serve the event listener over HTTPS
    /// Default: none (plain HTTP)
    pub tls: Option<TlsConfig>,

    /// Retry behaviour for Maker API requests
    /// Default: 3 attempts, 500ms linear base delay
    pub retry: RetryPolicy,

    /// Per-request timeout for Maker API requests
    /// Default: 10 seconds
    pub request_timeout: Duration,

    /// Capacity of the channel between the event listener and the event processor
    /// Default: 1024
    pub event_buffer_size: usize,

    /// Upper bound on how long stopping the event listener may take
    /// Default: 5 seconds
    pub shutdown_timeout: Duration,

    /// Accept self-signed hub certificates
    /// Default: true
    pub accept_invalid_certs: bool,
}

impl HubConfig {
    /// Create a configuration with default settings
    pub fn new(
        host: impl Into<String>,
        app_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            app_id: app_id.into(),
            access_token: access_token.into(),
            port: None,
            event_url: None,
            tls: None,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(10),
            event_buffer_size: 1024,
            shutdown_timeout: Duration::from_secs(5),
            accept_invalid_certs: true,
        }
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(HubError::InvalidConfig("host is required".to_string()));
        }
        if self.app_id.trim().is_empty() {
            return Err(HubError::InvalidConfig("app id is required".to_string()));
        }
        if self.access_token.trim().is_empty() {
            return Err(HubError::InvalidConfig(
                "access token is required".to_string(),
            ));
        }
        if self.event_buffer_size == 0 {
            return Err(HubError::InvalidConfig(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }
        if let Some(event_url) = &self.event_url {
            validate_event_url(event_url)?;
        }
        HubAddress::parse(&self.host)?;
        Ok(())
    }

    /// Port the listener should bind: the explicit port, else the port of an
    /// explicit event URL, else none.
    pub fn event_port(&self) -> Option<u16> {
        self.port
            .or_else(|| self.event_url.as_deref().and_then(explicit_port))
    }

    pub(crate) fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: self.request_timeout,
            accept_invalid_certs: self.accept_invalid_certs,
            retry: self.retry,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_event_url(mut self, event_url: impl Into<String>) -> Self {
        self.event_url = Some(event_url.into());
        self
    }

    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }
}

impl std::fmt::Debug for HubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubConfig")
            .field("host", &self.host)
            .field("app_id", &self.app_id)
            .field("access_token", &"<redacted>")
            .field("port", &self.port)
            .field("event_url", &self.event_url)
            .field("tls", &self.tls.is_some())
            .field("retry", &self.retry)
            .field("request_timeout", &self.request_timeout)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

/// A normalized hub address.
///
/// Accepts `10.0.1.99`, `10.0.1.99:8080`, `http://10.0.1.99` or
/// `https://hub.local`; the scheme defaults to `http`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubAddress {
    scheme: String,
    authority: String,
    hostname: String,
}

impl HubAddress {
    pub fn parse(host: &str) -> Result<Self> {
        let trimmed = host.trim();
        if trimmed.is_empty() {
            return Err(HubError::InvalidConfig("host is required".to_string()));
        }

        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{trimmed}")
        };
        let url = Url::parse(&with_scheme)
            .map_err(|e| HubError::InvalidConfig(format!("invalid host {trimmed}: {e}")))?;
        let hostname = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| HubError::InvalidConfig(format!("invalid host {trimmed}")))?;

        let authority = match url.port() {
            Some(port) => format!("{hostname}:{port}"),
            None => hostname.to_string(),
        };

        Ok(Self {
            scheme: url.scheme().to_string(),
            authority,
            hostname: hostname
                .trim_start_matches('[')
                .trim_end_matches(']')
                .to_string(),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host and, when present, port, e.g. `10.0.1.99:8080`
    pub fn host(&self) -> &str {
        &self.authority
    }

    /// Host name or IP only, for resolving the local interface that reaches the hub
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.authority)
    }

    /// Root of a Maker API app instance on this hub
    pub fn api_url(&self, app_id: &str) -> String {
        format!("{}/apps/api/{}", self.base_url(), app_id)
    }
}

/// Check that an event URL is absolute and names a host.
pub(crate) fn validate_event_url(event_url: &str) -> Result<()> {
    let parsed = Url::parse(event_url)
        .map_err(|e| HubError::InvalidConfig(format!("invalid event URL {event_url}: {e}")))?;
    if parsed.host_str().is_none() {
        return Err(HubError::InvalidConfig(format!(
            "event URL {event_url} has no host"
        )));
    }
    Ok(())
}

/// Byte range of the authority part of a URL (between `://` and the path).
fn authority_range(raw: &str) -> Option<(usize, usize)> {
    let start = raw.find("://")? + 3;
    let end = raw[start..]
        .find(|c: char| matches!(c, '/' | '?' | '#'))
        .map_or(raw.len(), |i| start + i);
    Some((start, end))
}

/// Port written out in a URL, if any.
pub(crate) fn explicit_port(raw: &str) -> Option<u16> {
    let (start, end) = authority_range(raw)?;
    let authority = &raw[start..end];
    let host_port = authority.rsplit('@').next().unwrap_or(authority);
    let after_host = match host_port.rfind(']') {
        Some(i) => &host_port[i + 1..],
        None => host_port,
    };
    after_host
        .rsplit_once(':')
        .and_then(|(_, port)| port.parse().ok())
}

/// Insert `:port` after the host of a URL that has none.
pub(crate) fn splice_port(raw: &str, port: u16) -> String {
    match authority_range(raw) {
        Some((_, end)) => format!("{}:{}{}", &raw[..end], port, &raw[end..]),
        None => raw.to_string(),
    }
}

/// Work out the URL to register with the hub.
///
/// An explicit URL with a port is used as is. An explicit URL without one
/// gets the configured port, or failing that the listener's bound port.
/// Without an explicit URL the listener's own URL is used.
pub(crate) fn resolve_event_url(
    explicit: Option<&str>,
    configured_port: Option<u16>,
    listener: Option<(&str, u16)>,
) -> Option<String> {
    match explicit {
        Some(raw) if explicit_port(raw).is_some() => Some(raw.to_string()),
        Some(raw) => {
            let port = configured_port
                .filter(|port| *port != 0)
                .or(listener.map(|(_, port)| port));
            Some(match port {
                Some(port) => splice_port(raw, port),
                None => raw.to_string(),
            })
        }
        None => listener.map(|(url, _)| url.to_string()),
    }
}
