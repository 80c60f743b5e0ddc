use std::fmt;
use std::net::Ipv4Addr;

use serde::Serialize;
use thiserror::Error;

/// Input rejected before any resolver call or process spawn.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid domain format: {0:?}")]
    Domain(String),
    #[error("invalid IPv4 address format: {0:?}")]
    Ipv4(String),
    #[error("invalid URL format (must start with http:// or https://): {0:?}")]
    Url(String),
    #[error("invalid target (expected domain or IPv4 address): {0:?}")]
    Target(String),
    #[error("unsupported DNS record type: {0:?}")]
    RecordType(String),
    #[error("invalid scan type flag: {0:?}")]
    ScanType(String),
    #[error("invalid HTTP method: {0:?}")]
    Method(String),
}

/// A validated scan input. Only the `validate_*` functions construct one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Target {
    Domain(String),
    Ipv4(Ipv4Addr),
    Url(String),
}

impl Target {
    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        match self {
            Target::Domain(d) => d.as_str().into(),
            Target::Ipv4(ip) => ip.to_string().into(),
            Target::Url(u) => u.as_str().into(),
        }
    }

    /// Accepts an IPv4 address or a domain, trying the address form first.
    pub fn parse_host(input: &str) -> Result<Self, ValidationError> {
        validate_ipv4(input)
            .or_else(|_| validate_domain(input))
            .map_err(|_| ValidationError::Target(input.to_string()))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Domain(d) => f.write_str(d),
            Target::Ipv4(ip) => write!(f, "{}", ip),
            Target::Url(u) => f.write_str(u),
        }
    }
}

pub(crate) fn is_domain_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '-'
}

/// ASCII alphanumerics, `.` and `-` only. Case is preserved.
pub fn validate_domain(input: &str) -> Result<Target, ValidationError> {
    if input.is_empty() || !input.chars().all(is_domain_char) {
        return Err(ValidationError::Domain(input.to_string()));
    }
    Ok(Target::Domain(input.to_string()))
}

/// Exactly four dot-separated decimal groups, each in [0, 255].
pub fn validate_ipv4(input: &str) -> Result<Target, ValidationError> {
    let invalid = || ValidationError::Ipv4(input.to_string());

    let groups: Vec<&str> = input.split('.').collect();
    if groups.len() != 4 {
        return Err(invalid());
    }

    let mut octets = [0u8; 4];
    for (slot, group) in octets.iter_mut().zip(&groups) {
        if group.is_empty() || !group.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        // all-digit groups only fail to parse when above 255
        *slot = group.parse::<u8>().map_err(|_| invalid())?;
    }
    Ok(Target::Ipv4(Ipv4Addr::from(octets)))
}

/// Shallow scheme check; the injection scanner parses the rest itself.
pub fn validate_url(input: &str) -> Result<Target, ValidationError> {
    if input.starts_with("http://") || input.starts_with("https://") {
        Ok(Target::Url(input.to_string()))
    } else {
        Err(ValidationError::Url(input.to_string()))
    }
}
