use std::fs;
use std::path::Path;

use crate::validate::is_domain_char;

/// Subdomain prefixes tried when no wordlist file is given.
pub const COMMON_SUBDOMAINS: &[&str] = &[
    "www", "mail", "ftp", "blog", "dev", "test", "admin", "api", "webmail",
    "portal", "cpanel", "autodiscover", "vpn", "docs", "app", "cdn", "shop",
];

pub fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

pub fn default_wordlist() -> Vec<String> {
    COMMON_SUBDOMAINS.iter().map(|s| s.to_string()).collect()
}

/// Parse a newline-delimited wordlist. Blank lines and `#` comments are skipped,
/// as are entries that could not form part of a hostname.
pub fn parse_wordlist(data: &str) -> Vec<String> {
    let mut out = Vec::new();
    for line in data.lines() {
        let entry = line.trim();
        if entry.is_empty() || entry.starts_with('#') {
            continue;
        }
        if !entry.chars().all(is_domain_char) {
            tracing::warn!(entry, "skipping invalid wordlist entry");
            continue;
        }
        out.push(entry.to_string());
    }
    out
}

pub fn read_wordlist(path: &Path) -> anyhow::Result<Vec<String>> {
    let data = fs::read_to_string(path)?;
    Ok(parse_wordlist(&data))
}
