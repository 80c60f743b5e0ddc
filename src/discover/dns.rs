use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::error::ProtoErrorKind;
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::proto::rr::RecordType;
use hickory_resolver::TokioAsyncResolver;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ReconConfig;
use crate::validate::ValidationError;

/// How a single query ended. The last three are expected, non-error states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "answers", rename_all = "snake_case")]
pub enum Resolution {
    Answers(Vec<String>),
    NoAnswer,
    NonExistent,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
    pub name: String,
    pub record_type: String,
    pub resolution: Resolution,
}

impl ResolutionResult {
    /// Answer strings in resolver order; empty for terminal outcomes.
    pub fn answers(&self) -> &[String] {
        match &self.resolution {
            Resolution::Answers(a) => a,
            _ => &[],
        }
    }
}

/// Any resolver failure that is not one of the terminal outcomes.
#[derive(Debug, Error)]
#[error("DNS query for {name} failed: {message}")]
pub struct DnsError {
    pub name: String,
    pub message: String,
}

pub fn parse_record_type(input: &str) -> Result<RecordType, ValidationError> {
    match RecordType::from_str(&input.to_ascii_uppercase()) {
        Ok(RecordType::Unknown(_)) | Err(_) => Err(ValidationError::RecordType(input.to_string())),
        Ok(rt) => Ok(rt),
    }
}

/// `d.c.b.a.in-addr.arpa.` for `a.b.c.d`.
pub fn reverse_name(ip: Ipv4Addr) -> String {
    let [a, b, c, d] = ip.octets();
    format!("{}.{}.{}.{}.in-addr.arpa.", d, c, b, a)
}

#[async_trait]
pub trait Resolve: Send + Sync {
    async fn resolve_forward(
        &self,
        name: &str,
        record_type: RecordType,
    ) -> Result<ResolutionResult, DnsError>;
}

/// One attempt per call, bounded by the configured timeout.
pub struct DnsClient {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl DnsClient {
    pub fn new(timeout: Duration, nameservers: &[IpAddr]) -> Self {
        let (config, mut opts) = if nameservers.is_empty() {
            hickory_resolver::system_conf::read_system_conf().unwrap_or_else(|e| {
                warn!(error = %e, "system resolver config unavailable, using defaults");
                (ResolverConfig::default(), ResolverOpts::default())
            })
        } else {
            let group = NameServerConfigGroup::from_ips_clear(nameservers, 53, true);
            (ResolverConfig::from_parts(None, vec![], group), ResolverOpts::default())
        };
        opts.timeout = timeout;
        opts.attempts = 1;

        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
            timeout,
        }
    }

    pub fn from_config(cfg: &ReconConfig) -> Self {
        Self::new(cfg.dns_timeout(), &cfg.nameservers)
    }

    pub async fn resolve_reverse(&self, ip: Ipv4Addr) -> Result<ResolutionResult, DnsError> {
        self.query(&reverse_name(ip), RecordType::PTR).await
    }

    async fn query(&self, name: &str, record_type: RecordType) -> Result<ResolutionResult, DnsError> {
        debug!(name, %record_type, "dns query");
        let lookup = tokio::time::timeout(self.timeout, self.resolver.lookup(name, record_type)).await;

        let resolution = match lookup {
            Err(_) => Resolution::TimedOut,
            Ok(Ok(answers)) => {
                let records: Vec<String> = answers.iter().map(|r| r.to_string()).collect();
                if records.is_empty() {
                    Resolution::NoAnswer
                } else {
                    Resolution::Answers(records)
                }
            }
            Ok(Err(e)) => classify_error(&e).ok_or_else(|| DnsError {
                name: name.to_string(),
                message: e.to_string(),
            })?,
        };

        Ok(ResolutionResult {
            name: name.to_string(),
            record_type: record_type.to_string(),
            resolution,
        })
    }
}

#[async_trait]
impl Resolve for DnsClient {
    async fn resolve_forward(
        &self,
        name: &str,
        record_type: RecordType,
    ) -> Result<ResolutionResult, DnsError> {
        self.query(name, record_type).await
    }
}

/// Maps resolver errors onto terminal outcomes; `None` for anything else.
fn classify_error(e: &ResolveError) -> Option<Resolution> {
    match e.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => {
            if *response_code == ResponseCode::NXDomain {
                Some(Resolution::NonExistent)
            } else {
                Some(Resolution::NoAnswer)
            }
        }
        ResolveErrorKind::Timeout => Some(Resolution::TimedOut),
        ResolveErrorKind::Proto(p) if matches!(p.kind(), ProtoErrorKind::Timeout) => {
            Some(Resolution::TimedOut)
        }
        _ => None,
    }
}
