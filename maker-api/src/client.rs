use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ApiError, Result};
use crate::models::{error_field, DeviceDetail, DeviceSummary, HsmStatus, ModeInfo};
use crate::retry::{classify_status, classify_transport, RetryPolicy, TransportFailure};

/// Characters left alone when a whole URL is packed into one path segment.
const URL_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Command arguments are comma-joined, so commas stay readable.
const PATH_SEGMENT: &AsciiSet = &URL_COMPONENT.remove(b',');

/// Settings for the HTTP transport underneath a [`MakerClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// Accept self-signed hub certificates
    pub accept_invalid_certs: bool,
    /// Retry behaviour for failed requests
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            accept_invalid_certs: true,
            retry: RetryPolicy::default(),
        }
    }
}

/// Client for one Maker API app instance on one hub.
///
/// Every call is a `GET` under `{api_url}/` with the access token passed as
/// the `access_token` query parameter. Connections are not pooled: every
/// request opens and closes its own.
///
/// The client is immutable. Pointing it at a different hub means building a
/// new one; requests already in flight keep the old address.
///
/// # Example
///
/// ```no_run
/// use maker_api::{ClientConfig, MakerClient};
///
/// # async fn example() -> maker_api::Result<()> {
/// let client = MakerClient::new(
///     "http://10.0.1.99/apps/api/1234",
///     "token",
///     ClientConfig::default(),
/// )?;
///
/// for device in client.devices().await? {
///     println!("{} {}", device.id, device.label);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MakerClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    retry: RetryPolicy,
}

impl MakerClient {
    pub fn new(
        api_url: impl Into<String>,
        token: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(0)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| ApiError::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            retry: config.retry,
        })
    }

    /// Root of the Maker API app, without the access token.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Issue a request to `path` (relative to the API root) and decode the JSON body.
    ///
    /// Retries according to the client's [`RetryPolicy`]. A 401 fails
    /// immediately with [`ApiError::InvalidToken`]; a body with a truthy
    /// `error` field fails with [`ApiError::Request`] even on HTTP 200.
    pub async fn request(&self, path: &str) -> Result<Value> {
        const METHOD: &str = "GET";
        let url = format!("{}/{}", self.api_url, path.trim_start_matches('/'));
        let mut attempt = 0;

        loop {
            attempt += 1;

            let sent = self
                .http
                .get(&url)
                .query(&[("access_token", self.token.as_str())])
                .send()
                .await;

            let failure = match sent {
                Ok(response) => {
                    let status = response.status();

                    if status.is_client_error() || status.is_server_error() {
                        let code = status.as_u16();
                        if self.retry.should_retry(attempt, classify_status(code)) {
                            tracing::debug!(
                                "{} request to {} failed with code {}. Retrying...",
                                METHOD,
                                path,
                                code
                            );
                            tokio::time::sleep(self.retry.delay_for(attempt)).await;
                            continue;
                        }

                        if code == 401 {
                            return Err(ApiError::InvalidToken);
                        }
                        return Err(ApiError::Request {
                            method: METHOD.to_string(),
                            url,
                            status: code,
                            reason: status.canonical_reason().unwrap_or("").to_string(),
                        });
                    }

                    match response.json::<Value>().await {
                        Ok(body) => {
                            if let Some(error) = error_field(&body) {
                                return Err(ApiError::Request {
                                    method: METHOD.to_string(),
                                    url,
                                    status: status.as_u16(),
                                    reason: match error {
                                        Value::String(s) => s.clone(),
                                        other => other.to_string(),
                                    },
                                });
                            }
                            return Ok(body);
                        }
                        Err(e) => e.without_url(),
                    }
                }
                Err(e) => e.without_url(),
            };

            let kind = TransportFailure::of(&failure);
            if self.retry.should_retry(attempt, classify_transport(kind)) {
                tracing::debug!(
                    "{} request to {} failed with {}. Retrying...",
                    METHOD,
                    path,
                    failure
                );
                tokio::time::sleep(self.retry.delay_for(attempt)).await;
                continue;
            }

            return Err(match kind {
                TransportFailure::Decode => {
                    tracing::warn!("Unable to parse response from {} as JSON: {}", path, failure);
                    ApiError::InvalidResponse(failure.to_string())
                }
                _ => ApiError::Connection(failure.to_string()),
            });
        }
    }

    /// Like [`request`](Self::request), then decode the body into `T`.
    pub async fn request_as<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.request(path).await?;
        serde_json::from_value(body)
            .map_err(|e| ApiError::InvalidResponse(format!("{path}: {e}")))
    }

    /// `GET devices`
    pub async fn devices(&self) -> Result<Vec<DeviceSummary>> {
        self.request_as("devices").await
    }

    /// `GET devices/{id}`
    pub async fn device(&self, device_id: &str) -> Result<DeviceDetail> {
        self.request_as(&format!("devices/{}", encode_segment(device_id)))
            .await
    }

    /// `GET devices/{id}/{command}[/{arg}]`
    pub async fn send_command(
        &self,
        device_id: &str,
        command: &str,
        arg: Option<&str>,
    ) -> Result<Value> {
        let mut path = format!(
            "devices/{}/{}",
            encode_segment(device_id),
            encode_segment(command)
        );
        if let Some(arg) = arg.filter(|arg| !arg.is_empty()) {
            path.push('/');
            path.push_str(&encode_segment(arg));
        }
        self.request(&path).await
    }

    /// `GET modes`
    pub async fn modes(&self) -> Result<Vec<ModeInfo>> {
        self.request_as("modes").await
    }

    /// `GET modes/{id}`, returns the updated mode list.
    pub async fn set_mode(&self, mode_id: &str) -> Result<Vec<ModeInfo>> {
        self.request_as(&format!("modes/{}", encode_segment(mode_id)))
            .await
    }

    /// `GET hsm`
    pub async fn hsm(&self) -> Result<HsmStatus> {
        self.request_as("hsm").await
    }

    /// `GET hsm/{command}`, returns the new status.
    pub async fn set_hsm(&self, command: &str) -> Result<HsmStatus> {
        self.request_as(&format!("hsm/{}", encode_segment(command)))
            .await
    }

    /// `GET postURL/{url}`, telling the hub where to push events.
    pub async fn set_post_url(&self, event_url: &str) -> Result<Value> {
        self.request(&format!("postURL/{}", encode_url(event_url)))
            .await
    }
}

impl std::fmt::Debug for MakerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MakerClient")
            .field("api_url", &self.api_url)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Percent-encode a full URL so it fits in a single path segment.
pub fn encode_url(url: &str) -> String {
    utf8_percent_encode(url, URL_COMPONENT).to_string()
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}
