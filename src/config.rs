use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    pub dns_timeout_secs: u64,
    pub dns_concurrency: usize,
    /// Empty means the system resolver configuration.
    pub nameservers: Vec<IpAddr>,
    pub probe_timeout_secs: u64,
    pub probe_concurrency: usize,
    pub port_scan_timeout_secs: u64,
    pub injection_scan_timeout_secs: u64,
    pub port_scanner: String,
    pub injection_scanner: String,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            dns_timeout_secs: 3,
            dns_concurrency: 10,
            nameservers: Vec::new(),
            probe_timeout_secs: 5,
            probe_concurrency: 10,
            port_scan_timeout_secs: 120,
            injection_scan_timeout_secs: 300,
            port_scanner: "nmap".to_string(),
            injection_scanner: "sqlmap".to_string(),
        }
    }
}

impl ReconConfig {
    /// Load from a JSON file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: ReconConfig = serde_json::from_str(&data)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(cfg)
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs.max(1))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }

    pub fn port_scan_timeout(&self) -> Duration {
        Duration::from_secs(self.port_scan_timeout_secs.max(1))
    }

    pub fn injection_scan_timeout(&self) -> Duration {
        Duration::from_secs(self.injection_scan_timeout_secs.max(1))
    }
}
