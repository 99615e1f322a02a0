//! Retrying HTTP client for the device channel REST API
//!
//! Every request goes to `GET {base}/rest/channel/{path}` and is classified
//! by status:
//!
//! | Status  | Outcome                                   |
//! |---------|-------------------------------------------|
//! | 2xx     | body decoded, malformed bodies are absent |
//! | 404     | empty result, not an error                |
//! | 401     | [`ProbeError::Authentication`]            |
//! | other   | [`ProbeError::UpstreamStatus`]            |

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace};

use crate::channel::ChannelRecord;
use crate::config::{BasicAuth, ProbeConfig};
use crate::discovery::DiscoveryResult;
use crate::error::{ProbeError, Result};
use crate::retry::{with_retry, RetryPolicy};

/// Build the shared HTTP client (connection pool, user agent)
pub fn build_http_client(config: &ProbeConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .build()?;
    Ok(client)
}

/// Client bound to one device
#[derive(Debug, Clone)]
pub struct DeviceClient {
    http: reqwest::Client,
    base_url: String,
    auth: Option<BasicAuth>,
    retry: RetryPolicy,
}

impl DeviceClient {
    /// Create a client for the device at `target`
    pub fn new(http: reqwest::Client, target: &str, config: &ProbeConfig) -> Self {
        Self {
            http,
            base_url: format!("{}/rest/channel", target.trim_end_matches('/')),
            auth: config.auth.clone(),
            retry: config.retry,
        }
    }

    /// Full URL of a channel path
    pub fn channel_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Fetch one channel by explicit address (`ess0/Soc`)
    pub async fn get_channel(&self, address: &str, deadline: Instant) -> Result<ChannelRecord> {
        let record = match self.get_json(address, deadline).await? {
            Some(body) => ChannelRecord::from_explicit(address, &body),
            None => ChannelRecord::absent(address),
        };
        Ok(record)
    }

    /// Fetch all channels matching a wildcard path (`meter.*/.*`)
    pub async fn get_wildcard(&self, pattern: &str, deadline: Instant) -> Result<DiscoveryResult> {
        let Some(body) = self.get_json(pattern, deadline).await? else {
            return Ok(DiscoveryResult::default());
        };

        match DiscoveryResult::deserialize(&body) {
            Ok(result) => Ok(result),
            Err(e) => {
                debug!(path = pattern, error = %e, "unexpected wildcard response shape");
                Ok(DiscoveryResult::default())
            }
        }
    }

    /// Run one logical request with retries, bounded by the request timeout
    /// and the probe deadline. `None` means 404 or an undecodable body.
    async fn get_json(&self, path: &str, deadline: Instant) -> Result<Option<Value>> {
        let request_deadline = self.retry.request_deadline(deadline);
        let url = self.channel_url(path);
        let url = url.as_str();
        let attempts = with_retry(&self.retry, request_deadline, move |attempt| {
            self.send(url, attempt)
        });

        match timeout_at(request_deadline, attempts).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::DeadlineExceeded),
        }
    }

    async fn send(&self, url: &str, attempt: u32) -> Result<Option<Value>> {
        trace!(url, attempt, "GET");

        let mut request = self.http.get(url);
        if let Some(auth) = &self.auth {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }

        let response = request.send().await?;
        match response.status() {
            status if status.is_success() => {
                let body = response.bytes().await?;
                match serde_json::from_slice::<Value>(&body) {
                    Ok(value) => Ok(Some(value)),
                    Err(e) => {
                        debug!(url, error = %e, "response is not valid JSON");
                        Ok(None)
                    }
                }
            }
            StatusCode::NOT_FOUND => {
                debug!(url, "channel not found");
                Ok(None)
            }
            StatusCode::UNAUTHORIZED => Err(ProbeError::Authentication),
            status => Err(ProbeError::UpstreamStatus {
                status: status.as_u16(),
            }),
        }
    }
}
