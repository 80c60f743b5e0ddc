use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Append one JSON document per item to `path`.
pub fn write_jsonl<T: Serialize>(path: &Path, items: &[T]) -> anyhow::Result<()> {
    let mut f = OpenOptions::new().append(true).create(true).open(path)?;
    for it in items {
        let line = serde_json::to_string(it)?;
        f.write_all(line.as_bytes())?;
        f.write_all(b"\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::injection::parse_injection_scan;

    #[test]
    fn appends_lines() {
        let path = std::env::temp_dir().join(format!("xploit_recon_jsonl_{}.jsonl", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let findings = parse_injection_scan("Parameter 'id' is vulnerable\nParameter 'q' is vulnerable");
        write_jsonl(&path, &findings).unwrap();
        write_jsonl(&path, &findings[..1]).unwrap();

        let data = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = data.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], r#"{"parameter":"id","technique":"SQL Injection"}"#);
        let _ = std::fs::remove_file(&path);
    }
}
