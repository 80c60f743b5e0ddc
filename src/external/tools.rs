use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use which::which;

use crate::config::ReconConfig;
use crate::external::runner::{self, ScanInvocation, ScanOutcome};
use crate::parse::injection::{parse_injection_scan, InjectionFinding};
use crate::parse::port_scan::{parse_port_scan, PortScanReport};
use crate::validate::{Target, ValidationError};

pub const DEFAULT_SCAN_TYPE: &str = "-sV";

static SCAN_TYPE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-[A-Za-z0-9]+$").unwrap());

/// True when `program` resolves on PATH.
pub fn tool_available(program: &str) -> bool {
    which(program).is_ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortScanRequest {
    target: Target,
    scan_type: String,
}

impl PortScanRequest {
    /// `target` must be a domain or IPv4 target that cannot be read as an
    /// option; `scan_type` a single short flag.
    pub fn new(target: Target, scan_type: &str) -> Result<Self, ValidationError> {
        match &target {
            Target::Url(_) => return Err(ValidationError::Target(target.to_string())),
            Target::Domain(name) if name.starts_with('-') => {
                return Err(ValidationError::Target(name.clone()))
            }
            _ => {}
        }
        if !SCAN_TYPE_RE.is_match(scan_type) {
            return Err(ValidationError::ScanType(scan_type.to_string()));
        }
        Ok(Self { target, scan_type: scan_type.to_string() })
    }

    pub fn invocation(&self, program: &str, timeout: Duration) -> ScanInvocation {
        let target = self.target.to_string();
        ScanInvocation::new(program, [self.scan_type.clone(), target.clone()], &target, timeout)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl FromStr for HttpMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            _ => Err(ValidationError::Method(s.to_string())),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => f.write_str("GET"),
            HttpMethod::Post => f.write_str("POST"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionScanRequest {
    url: Target,
    method: HttpMethod,
    data: Option<String>,
}

impl InjectionScanRequest {
    pub fn new(url: Target, method: HttpMethod, data: Option<String>) -> Result<Self, ValidationError> {
        if !matches!(url, Target::Url(_)) {
            return Err(ValidationError::Url(url.to_string()));
        }
        Ok(Self { url, method, data })
    }

    pub fn invocation(&self, program: &str, timeout: Duration) -> ScanInvocation {
        let url = self.url.to_string();
        let mut args = vec![
            "-u".to_string(),
            url.clone(),
            "--batch".to_string(),
            "--random-agent".to_string(),
        ];
        if self.method == HttpMethod::Post {
            if let Some(data) = self.data.as_deref().filter(|d| !d.is_empty()) {
                args.push("--data".to_string());
                args.push(data.to_string());
            }
        }
        ScanInvocation::new(program, args, &url, timeout)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PortScanResult {
    pub invocation: ScanInvocation,
    pub outcome: ScanOutcome,
    /// Present only when the scanner produced usable output.
    pub report: Option<PortScanReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InjectionScanResult {
    pub invocation: ScanInvocation,
    pub outcome: ScanOutcome,
    pub findings: Option<Vec<InjectionFinding>>,
}

pub async fn run_port_scan(request: &PortScanRequest, cfg: &ReconConfig) -> PortScanResult {
    let invocation = request.invocation(&cfg.port_scanner, cfg.port_scan_timeout());
    let outcome = runner::invoke(&invocation).await;
    let report = outcome.class.has_output().then(|| parse_port_scan(&outcome.stdout));
    tracing::info!(target = %invocation.target, class = ?outcome.class, "port scan finished");
    PortScanResult { invocation, outcome, report }
}

pub async fn run_injection_scan(request: &InjectionScanRequest, cfg: &ReconConfig) -> InjectionScanResult {
    let invocation = request.invocation(&cfg.injection_scanner, cfg.injection_scan_timeout());
    let outcome = runner::invoke(&invocation).await;
    let findings = outcome.class.has_output().then(|| parse_injection_scan(&outcome.stdout));
    tracing::info!(target = %invocation.target, class = ?outcome.class, "injection scan finished");
    InjectionScanResult { invocation, outcome, findings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{validate_domain, validate_ipv4, validate_url};

    #[test]
    fn port_scan_arguments() {
        let req = PortScanRequest::new(validate_ipv4("10.0.0.5").unwrap(), "-sS").unwrap();
        let inv = req.invocation("nmap", Duration::from_secs(120));
        assert_eq!(inv.program, "nmap");
        assert_eq!(inv.args, vec!["-sS", "10.0.0.5"]);
        assert_eq!(inv.target, "10.0.0.5");
    }

    #[test]
    fn scan_type_must_be_single_flag() {
        let target = validate_domain("scanme.nmap.org").unwrap();
        for bad in ["sV", "-sV -oN out", "--script=vuln", "-", ""] {
            assert!(PortScanRequest::new(target.clone(), bad).is_err(), "{bad:?}");
        }
        assert!(PortScanRequest::new(validate_url("http://x").unwrap(), "-sV").is_err());
    }

    #[test]
    fn option_shaped_target_is_rejected() {
        for name in ["-iR1000", "-oNfile", "--open"] {
            let target = validate_domain(name).unwrap();
            assert_eq!(
                PortScanRequest::new(target, "-sV"),
                Err(ValidationError::Target(name.to_string()))
            );
        }
        // an inner hyphen is an ordinary hostname
        assert!(PortScanRequest::new(validate_domain("my-host.example.com").unwrap(), "-sV").is_ok());
    }

    #[test]
    fn injection_arguments_get() {
        let url = validate_url("http://testphp.vulnweb.com/artists.php?artist=1").unwrap();
        let req = InjectionScanRequest::new(url, HttpMethod::Get, Some("a=1".into())).unwrap();
        let inv = req.invocation("sqlmap", Duration::from_secs(300));
        // data is ignored for GET
        assert_eq!(
            inv.args,
            vec!["-u", "http://testphp.vulnweb.com/artists.php?artist=1", "--batch", "--random-agent"]
        );
    }

    #[test]
    fn injection_arguments_post() {
        let url = validate_url("https://example.com/login").unwrap();
        let req = InjectionScanRequest::new(url.clone(), HttpMethod::Post, Some("user=a&pass=b".into())).unwrap();
        let inv = req.invocation("sqlmap", Duration::from_secs(300));
        assert_eq!(inv.args[4..], ["--data".to_string(), "user=a&pass=b".to_string()]);

        let empty = InjectionScanRequest::new(url, HttpMethod::Post, Some(String::new())).unwrap();
        assert_eq!(empty.invocation("sqlmap", Duration::from_secs(1)).args.len(), 4);
    }

    #[test]
    fn method_parsing() {
        assert_eq!("post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!("GET".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert!("DELETE".parse::<HttpMethod>().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_scanner_yields_no_report() {
        let cfg = ReconConfig {
            port_scanner: "definitely-not-a-real-scanner-xyz".into(),
            ..Default::default()
        };
        let req = PortScanRequest::new(validate_ipv4("127.0.0.1").unwrap(), DEFAULT_SCAN_TYPE).unwrap();
        let res = run_port_scan(&req, &cfg).await;
        assert_eq!(res.outcome.class, runner::ExitClass::NotFound);
        assert!(res.report.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_still_yields_report() {
        let cfg = ReconConfig { port_scanner: "sh".into(), ..Default::default() };
        let req = PortScanRequest::new(validate_domain("localhost").unwrap(), "-c").unwrap();
        let res = run_port_scan(&req, &cfg).await;
        // `sh -c localhost` runs a command named localhost, which does not exist
        assert_eq!(res.outcome.class, runner::ExitClass::NonZeroExit);
        assert!(res.report.unwrap().findings.is_empty());
    }
}
