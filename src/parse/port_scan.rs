use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static PORT_PROTO_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,5})/([A-Za-z]+)$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PortFinding {
    pub port: u16,
    pub protocol: String,
    pub state: String,
    pub service: String,
    /// Trailing columns, present on service-detection scans.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    Up,
    Down,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PortScanReport {
    pub host_status: HostStatus,
    pub findings: Vec<PortFinding>,
}

/// Extract open ports from port-scanner text. Never fails; unrecognised lines are skipped.
pub fn parse_port_scan(text: &str) -> PortScanReport {
    let mut report = PortScanReport::default();
    let mut seen = HashSet::new();

    for line in text.lines() {
        if line.contains("Host is up") {
            report.host_status = HostStatus::Up;
            continue;
        }
        if line.contains("Host seems down") && report.host_status == HostStatus::Unknown {
            report.host_status = HostStatus::Down;
            continue;
        }
        if let Some(finding) = parse_port_line(line) {
            if seen.insert(finding.clone()) {
                report.findings.push(finding);
            }
        }
    }
    report
}

fn parse_port_line(line: &str) -> Option<PortFinding> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 3 {
        return None;
    }
    // "open" or a compound state such as "open|filtered"
    if !tokens.iter().any(|t| t.split('|').any(|part| part == "open")) {
        return None;
    }

    let caps = PORT_PROTO_RE.captures(tokens[0])?;
    let port: u16 = caps[1].parse().ok()?;
    let version = (tokens.len() > 3).then(|| tokens[3..].join(" "));

    Some(PortFinding {
        port,
        protocol: caps[2].to_string(),
        state: tokens[1].to_string(),
        service: tokens[2].to_string(),
        version,
    })
}
