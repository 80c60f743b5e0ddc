use crate::discover::subdomain::SubdomainCandidate;
use crate::parse::port_scan::PortFinding;
use csv::Writer;
use std::fs::File;
use std::path::Path;

pub fn write_ports_csv(path: &Path, target: &str, items: &[PortFinding]) -> anyhow::Result<()> {
    let f = File::create(path)?;
    let mut w = Writer::from_writer(f);
    w.write_record(["target", "port", "protocol", "state", "service", "version"])?;
    for it in items {
        w.write_record(&[
            target.to_string(),
            it.port.to_string(),
            it.protocol.clone(),
            it.state.clone(),
            it.service.clone(),
            it.version.clone().unwrap_or_default(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_subdomains_csv(path: &Path, items: &[SubdomainCandidate]) -> anyhow::Result<()> {
    let f = File::create(path)?;
    let mut w = Writer::from_writer(f);
    w.write_record(["subdomain", "ip_address", "status", "probe_error"])?;
    for it in items {
        w.write_record(&[
            it.subdomain.clone(),
            it.ip_address.clone().unwrap_or_default(),
            it.status.to_string(),
            it.probe_error.clone().unwrap_or_default(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::port_scan::parse_port_scan;

    #[test]
    fn ports_csv_quotes_versions() {
        let path = std::env::temp_dir().join(format!("xploit_recon_ports_{}.csv", std::process::id()));
        let report = parse_port_scan("22/tcp open ssh OpenSSH 8.9p1, Ubuntu\n80/tcp open http");
        write_ports_csv(&path, "10.0.0.1", &report.findings).unwrap();

        let data = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = data.lines().collect();
        assert_eq!(lines[0], "target,port,protocol,state,service,version");
        assert_eq!(lines[1], r#"10.0.0.1,22,tcp,open,ssh,"OpenSSH 8.9p1, Ubuntu""#);
        assert_eq!(lines[2], "10.0.0.1,80,tcp,open,http,");
        let _ = std::fs::remove_file(&path);
    }
}
