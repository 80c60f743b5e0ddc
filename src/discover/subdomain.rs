use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use hickory_resolver::proto::rr::RecordType;
use serde::Serialize;

use crate::concurrent::ConcurrentProbe;
use crate::config::ReconConfig;
use crate::discover::dns::{DnsClient, Resolution, Resolve};
use crate::probe::liveness::{Liveness, LivenessProbe};
use crate::validate::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LivenessStatus {
    Unresolved,
    Resolved,
    Active,
    ResolvedProbeFailed,
}

impl fmt::Display for LivenessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LivenessStatus::Unresolved => "Unresolved",
            LivenessStatus::Resolved => "DNS Resolved",
            LivenessStatus::Active => "Active (HTTP/S)",
            LivenessStatus::ResolvedProbeFailed => "DNS Resolved (HTTP/S Check Failed)",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubdomainCandidate {
    pub subdomain: String,
    pub ip_address: Option<String>,
    pub status: LivenessStatus,
    /// Set when the probe itself failed rather than the host being unreachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_error: Option<String>,
}

impl SubdomainCandidate {
    fn resolved(subdomain: &str, ip_address: &str) -> Self {
        Self {
            subdomain: subdomain.to_string(),
            ip_address: Some(ip_address.to_string()),
            status: LivenessStatus::Resolved,
            probe_error: None,
        }
    }

    /// Only a `Resolved` candidate moves, and only once.
    fn record_probe(&mut self, outcome: &Result<bool, String>) {
        if self.status != LivenessStatus::Resolved {
            return;
        }
        match outcome {
            Ok(true) => self.status = LivenessStatus::Active,
            Ok(false) => self.status = LivenessStatus::ResolvedProbeFailed,
            Err(e) => {
                self.status = LivenessStatus::ResolvedProbeFailed;
                self.probe_error = Some(e.clone());
            }
        }
    }
}

pub struct SubdomainEnumerator<R, P> {
    resolver: Arc<R>,
    prober: Arc<P>,
    dns_timeout: Duration,
    dns_concurrency: usize,
    probe_timeout: Duration,
    probe_concurrency: usize,
}

impl SubdomainEnumerator<DnsClient, LivenessProbe> {
    pub fn from_config(cfg: &ReconConfig) -> anyhow::Result<Self> {
        let enumerator = Self::new(
            DnsClient::from_config(cfg),
            LivenessProbe::new(cfg.probe_timeout())?,
        )
        .with_dns(cfg.dns_timeout(), cfg.dns_concurrency)
        .with_probes(cfg.probe_timeout(), cfg.probe_concurrency);
        Ok(enumerator)
    }
}

impl<R, P> SubdomainEnumerator<R, P>
where
    R: Resolve + 'static,
    P: Liveness,
{
    pub fn new(resolver: R, prober: P) -> Self {
        let defaults = ReconConfig::default();
        Self {
            resolver: Arc::new(resolver),
            prober: Arc::new(prober),
            dns_timeout: defaults.dns_timeout(),
            dns_concurrency: defaults.dns_concurrency,
            probe_timeout: defaults.probe_timeout(),
            probe_concurrency: defaults.probe_concurrency,
        }
    }

    pub fn with_dns(mut self, timeout: Duration, concurrency: usize) -> Self {
        self.dns_timeout = timeout;
        self.dns_concurrency = concurrency.max(1);
        self
    }

    pub fn with_probes(mut self, timeout: Duration, concurrency: usize) -> Self {
        self.probe_timeout = timeout;
        self.probe_concurrency = concurrency.max(1);
        self
    }

    /// Resolve `word.domain` for every wordlist entry, optionally probing each
    /// resolved address. Output follows wordlist order, then answer order.
    pub async fn enumerate(&self, domain: &Target, wordlist: &[String], check_active: bool) -> Vec<SubdomainCandidate> {
        let domain = domain.as_str();
        tracing::debug!("Starting DNS bruteforce for {} prefixes", wordlist.len());

        let per_entry: Vec<Vec<SubdomainCandidate>> = stream::iter(wordlist)
            .map(|word| {
                let subdomain = format!("{}.{}", word, domain);
                async move { self.resolve_entry(&subdomain).await }
            })
            .buffered(self.dns_concurrency)
            .collect()
            .await;
        let mut candidates: Vec<SubdomainCandidate> = per_entry.into_iter().flatten().collect();

        tracing::info!("DNS bruteforce found {} records", candidates.len());

        if check_active && !candidates.is_empty() {
            self.probe_all(&mut candidates).await;
        }
        candidates
    }

    async fn resolve_entry(&self, subdomain: &str) -> Vec<SubdomainCandidate> {
        let lookup = tokio::time::timeout(
            self.dns_timeout,
            self.resolver.resolve_forward(subdomain, RecordType::A),
        )
        .await;

        match lookup {
            Ok(Ok(result)) => match &result.resolution {
                Resolution::Answers(ips) => ips
                    .iter()
                    .map(|ip| SubdomainCandidate::resolved(subdomain, ip))
                    .collect(),
                other => {
                    tracing::debug!(subdomain, outcome = ?other, "no A record");
                    Vec::new()
                }
            },
            Ok(Err(e)) => {
                tracing::warn!("Error resolving {}: {}", subdomain, e);
                Vec::new()
            }
            Err(_) => {
                tracing::debug!(subdomain, "resolution exceeded timeout");
                Vec::new()
            }
        }
    }

    async fn probe_all(&self, candidates: &mut [SubdomainCandidate]) {
        // https and http attempts each get the full timeout
        let task_timeout = self.probe_timeout * 2 + Duration::from_secs(1);
        let pool = ConcurrentProbe::new(self.probe_concurrency).with_task_timeout(task_timeout);

        // one check per hostname, shared by all of its addresses
        let mut hosts: Vec<String> = Vec::new();
        let mut slot: HashMap<String, usize> = HashMap::new();
        for c in candidates.iter() {
            slot.entry(c.subdomain.clone()).or_insert_with(|| {
                hosts.push(c.subdomain.clone());
                hosts.len() - 1
            });
        }

        let prober = self.prober.clone();
        let outcomes: Vec<Result<bool, String>> = pool
            .execute(hosts.clone(), move |host| {
                let prober = prober.clone();
                async move { prober.check(&host).await }
            })
            .await
            .into_iter()
            .zip(&hosts)
            .map(|(outcome, host)| match outcome {
                Ok(Ok(active)) => Ok(active),
                Ok(Err(e)) => {
                    tracing::warn!(subdomain = %host, error = %e, "liveness check errored");
                    Err(e.to_string())
                }
                Err(e) => {
                    tracing::warn!(subdomain = %host, error = %e, "liveness task failed");
                    Err(e)
                }
            })
            .collect();

        for candidate in candidates.iter_mut() {
            if let Some(&i) = slot.get(&candidate.subdomain) {
                candidate.record_probe(&outcomes[i]);
            }
        }

        let (completed, errors) = pool.get_stats();
        tracing::info!(completed, errors, "liveness probing finished");
    }
}

/// Plain-text summary grouped by status.
pub fn generate_report(domain: &str, results: &[SubdomainCandidate]) -> String {
    let mut report = String::new();

    report.push_str(&format!("=== Subdomain Enumeration Results for {} ===\n\n", domain));
    report.push_str(&format!("Total records found: {}\n", results.len()));

    for status in [
        LivenessStatus::Active,
        LivenessStatus::ResolvedProbeFailed,
        LivenessStatus::Resolved,
    ] {
        let group: Vec<_> = results.iter().filter(|r| r.status == status).collect();
        if group.is_empty() {
            continue;
        }
        report.push_str(&format!("\n[{}] - {}:\n", status, group.len()));
        for sub in group {
            let ip = sub.ip_address.as_deref().unwrap_or("-");
            match &sub.probe_error {
                Some(err) => report.push_str(&format!("  - {} ({}) error: {}\n", sub.subdomain, ip, err)),
                None => report.push_str(&format!("  - {} ({})\n", sub.subdomain, ip)),
            }
        }
    }

    report
}
