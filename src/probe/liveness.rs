use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::http_client;

/// A reachability check the enumerator can fan out over candidates.
#[async_trait]
pub trait Liveness: Send + Sync + 'static {
    /// `Err` is reserved for failures of the check itself, not an unreachable host.
    async fn check(&self, hostname: &str) -> anyhow::Result<bool>;
}

/// HTTPS first, then plain HTTP. Any HTTP response counts as alive.
pub struct LivenessProbe {
    https: Client,
    http: Client,
    timeout: Duration,
}

impl LivenessProbe {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        // Self-signed and expired certificates are normal on scan targets.
        // This client is never handed out beyond this probe.
        let https = http_client::base_builder(timeout)
            .danger_accept_invalid_certs(true)
            .build()?;
        let http = http_client::create_client(timeout)?;
        Ok(Self { https, http, timeout })
    }

    pub async fn check_active(&self, hostname: &str) -> bool {
        if self.attempt(&self.https, "https", hostname).await {
            return true;
        }
        self.attempt(&self.http, "http", hostname).await
    }

    async fn attempt(&self, client: &Client, scheme: &str, hostname: &str) -> bool {
        let url = match Url::parse(&format!("{}://{}/", scheme, hostname)) {
            Ok(u) => u,
            Err(e) => {
                debug!(hostname, scheme, error = %e, "unusable probe url");
                return false;
            }
        };

        match tokio::time::timeout(self.timeout, client.head(url).send()).await {
            Ok(Ok(resp)) => {
                debug!(hostname, scheme, status = resp.status().as_u16(), "probe answered");
                true
            }
            Ok(Err(e)) => {
                debug!(hostname, scheme, error = %e, "probe failed");
                false
            }
            Err(_) => {
                debug!(hostname, scheme, "probe timed out");
                false
            }
        }
    }
}

#[async_trait]
impl Liveness for LivenessProbe {
    async fn check(&self, hostname: &str) -> anyhow::Result<bool> {
        Ok(self.check_active(hostname).await)
    }
}
