//! Connectivity probe gating sync cycles.

use std::future::Future;
use std::time::Duration;

use super::error::TransportError;
use crate::config::SyncConfig;

/// Cheap reachability check against the remote authority.
///
/// Never fails: every problem is reported as `false`.
pub trait ConnectivityProbe: Send + Sync {
    fn is_reachable(&self) -> impl Future<Output = bool> + Send;
}

/// `GET {remote_base_url}/health`, bounded by the probe timeout
#[derive(Clone)]
pub struct HttpProbe {
    endpoint: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(config: &SyncConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.probe_timeout)
            .build()
            .map_err(|error| TransportError::Connection(error.to_string()))?;
        Ok(Self {
            endpoint: config.endpoint("health"),
            client,
            timeout: config.probe_timeout,
        })
    }
}

impl ConnectivityProbe for HttpProbe {
    async fn is_reachable(&self) -> bool {
        match tokio::time::timeout(self.timeout, self.client.get(&self.endpoint).send()).await {
            Ok(Ok(response)) if response.status().is_success() => true,
            Ok(Ok(response)) => {
                tracing::debug!(status = %response.status(), "Health check returned non-success status");
                false
            }
            Ok(Err(error)) => {
                tracing::debug!(%error, "Health check failed");
                false
            }
            Err(_) => {
                tracing::debug!(timeout = ?self.timeout, "Health check timed out");
                false
            }
        }
    }
}
