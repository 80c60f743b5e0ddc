use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

pub const SQL_INJECTION: &str = "SQL Injection";

static GENERIC_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)injection vulnerability found").unwrap());
// covers both "Parameter 'id' is vulnerable" and sqlmap's "GET parameter 'id' is vulnerable"
static PARAMETER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)parameter '([^']+)' is vulnerable").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct InjectionFinding {
    /// `None` for the generic "vulnerability found" marker.
    pub parameter: Option<String>,
    pub technique: String,
}

/// Extract injection findings in first-seen order, one per distinct parameter.
pub fn parse_injection_scan(text: &str) -> Vec<InjectionFinding> {
    let mut findings = Vec::new();
    let mut seen = HashSet::new();

    for line in text.lines() {
        if GENERIC_MARKER_RE.is_match(line) {
            push_unique(&mut findings, &mut seen, None);
        }
        for caps in PARAMETER_RE.captures_iter(line) {
            push_unique(&mut findings, &mut seen, Some(caps[1].to_string()));
        }
    }
    findings
}

fn push_unique(findings: &mut Vec<InjectionFinding>, seen: &mut HashSet<Option<String>>, parameter: Option<String>) {
    if seen.insert(parameter.clone()) {
        findings.push(InjectionFinding {
            parameter,
            technique: SQL_INJECTION.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_line() {
        let findings = parse_injection_scan("Parameter 'id' is vulnerable");
        assert_eq!(
            findings,
            vec![InjectionFinding { parameter: Some("id".into()), technique: SQL_INJECTION.into() }]
        );
    }

    #[test]
    fn repeated_parameter_reported_once() {
        let text = "Parameter 'id' is vulnerable\nnoise\nParameter 'id' is vulnerable\n";
        assert_eq!(parse_injection_scan(text).len(), 1);
    }

    #[test]
    fn sqlmap_transcript() {
        let text = "\
[10:01:02] [INFO] testing connection to the target URL
[10:01:05] [INFO] GET parameter 'artist' appears to be 'AND boolean-based blind - WHERE or HAVING clause' injectable
GET parameter 'artist' is vulnerable. Do you want to keep testing the others (if any)? [y/N] N
sqlmap identified the following injection point(s) with a total of 46 HTTP(s) requests:
---
Parameter: artist (GET)
    Type: boolean-based blind
---
[10:01:09] [INFO] SQL injection vulnerability found
POST parameter 'user' is vulnerable.
";
        let findings = parse_injection_scan(text);
        let params: Vec<Option<&str>> = findings
            .iter()
            .map(|f| f.parameter.as_deref())
            .collect();
        assert_eq!(params, vec![Some("artist"), None, Some("user")]);
    }

    #[test]
    fn nothing_found() {
        assert!(parse_injection_scan("").is_empty());
        assert!(parse_injection_scan("all tested parameters do not appear to be injectable").is_empty());
        assert!(parse_injection_scan("Parameter 'unterminated is vulnerable").is_empty());
    }
}
