use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::{Cli, Commands};
use xploit_recon::discover::dns::{parse_record_type, DnsClient, Resolution, ResolutionResult, Resolve};
use xploit_recon::discover::subdomain::{generate_report, SubdomainEnumerator};
use xploit_recon::external::runner::{ExitClass, ScanInvocation, ScanOutcome};
use xploit_recon::external::tools::{self, HttpMethod, InjectionScanRequest, PortScanRequest};
use xploit_recon::output::{write_jsonl, write_ports_csv, write_subdomains_csv};
use xploit_recon::{utils, validate_domain, validate_ipv4, validate_url, ReconConfig, Target};

pub async fn run_from_cli(cli: Cli) -> anyhow::Result<()> {
    // Our crate at the requested level; resolver and HTTP internals stay quiet.
    use tracing_subscriber::EnvFilter;
    let crate_level = if cli.debug { "debug" } else if cli.verbose { "info" } else { "warn" };
    let filter_str = format!(
        "xploit_recon={crate},hickory_resolver=warn,hickory_proto=warn,reqwest=info,hyper=info,h2=info",
        crate = crate_level
    );
    let env_filter = EnvFilter::try_new(&filter_str).unwrap_or_else(|_| EnvFilter::new(crate_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(true)
        .with_target(false)
        .init();

    let mut cfg = match &cli.config {
        Some(path) => ReconConfig::from_file(Path::new(path))?,
        None => ReconConfig::default(),
    };
    if !cli.nameservers.is_empty() {
        cfg.nameservers = cli.nameservers.clone();
    }

    let out_dir = match &cli.out {
        Some(out) => {
            let dir = PathBuf::from(out);
            utils::ensure_dir(&dir)?;
            Some(dir)
        }
        None => None,
    };

    match cli.command {
        Commands::Dns { domain, record_type } => {
            handle_dns(&cfg, &domain, &record_type, out_dir.as_deref()).await
        }
        Commands::Reverse { ip } => handle_reverse(&cfg, &ip, out_dir.as_deref()).await,
        Commands::Subdomains { domain, wordlist, check_active, concurrency } => {
            if let Some(c) = concurrency {
                cfg.probe_concurrency = c;
            }
            handle_subdomains(&cfg, &domain, wordlist.as_deref(), check_active, out_dir.as_deref()).await
        }
        Commands::Portscan { target, scan_type, timeout } => {
            if let Some(t) = timeout {
                cfg.port_scan_timeout_secs = t;
            }
            handle_portscan(&cfg, &target, &scan_type, out_dir.as_deref()).await
        }
        Commands::Sqli { url, method, data, timeout } => {
            if let Some(t) = timeout {
                cfg.injection_scan_timeout_secs = t;
            }
            handle_sqli(&cfg, &url, &method, data, out_dir.as_deref()).await
        }
    }
}

async fn handle_dns(cfg: &ReconConfig, domain: &str, record_type: &str, out: Option<&Path>) -> anyhow::Result<()> {
    let target = validate_domain(domain)?;
    let record_type = parse_record_type(record_type)?;

    println!("[*] DNS lookup: {} {}", record_type, target);
    let client = DnsClient::from_config(cfg);
    let result = client.resolve_forward(&target.as_str(), record_type).await?;
    print_resolution(&result);

    if let Some(dir) = out {
        write_jsonl(&dir.join("dns.jsonl"), &[&result])?;
    }
    Ok(())
}

async fn handle_reverse(cfg: &ReconConfig, ip: &str, out: Option<&Path>) -> anyhow::Result<()> {
    let Target::Ipv4(addr) = validate_ipv4(ip)? else {
        anyhow::bail!("validate_ipv4 returned a non-IPv4 target for {ip}");
    };

    println!("[*] Reverse lookup: {}", addr);
    let client = DnsClient::from_config(cfg);
    let result = client.resolve_reverse(addr).await?;
    print_resolution(&result);

    if let Some(dir) = out {
        write_jsonl(&dir.join("dns.jsonl"), &[&result])?;
    }
    Ok(())
}

fn print_resolution(result: &ResolutionResult) {
    match &result.resolution {
        Resolution::Answers(answers) => {
            println!("[+] {} {} record(s) for {}:", answers.len(), result.record_type, result.name);
            for a in answers {
                println!("    {}", a);
            }
        }
        Resolution::NoAnswer => println!("[-] No {} records found for {}.", result.record_type, result.name),
        Resolution::NonExistent => println!("[-] Domain '{}' does not exist (NXDOMAIN).", result.name),
        Resolution::TimedOut => println!("[!] DNS query for {} timed out.", result.name),
    }
}

async fn handle_subdomains(
    cfg: &ReconConfig,
    domain: &str,
    wordlist: Option<&str>,
    check_active: bool,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let target = validate_domain(domain)?;
    let words = match wordlist {
        Some(path) => utils::read_wordlist(Path::new(path))?,
        None => utils::default_wordlist(),
    };

    println!("[*] Subdomain enumeration: {} ({} candidates{})", target, words.len(),
        if check_active { ", liveness checks on" } else { "" });

    let enumerator = SubdomainEnumerator::from_config(cfg)?;
    let results = enumerator.enumerate(&target, &words, check_active).await;

    let report = generate_report(&target.as_str(), &results);
    println!("{}", report);

    if let Some(dir) = out {
        std::fs::write(dir.join("subdomains.txt"), &report)?;
        write_subdomains_csv(&dir.join("subdomains.csv"), &results)?;
        write_jsonl(&dir.join("subdomains.jsonl"), &results)?;
    }
    Ok(())
}

async fn handle_portscan(cfg: &ReconConfig, target: &str, scan_type: &str, out: Option<&Path>) -> anyhow::Result<()> {
    let target = Target::parse_host(target)?;
    let request = PortScanRequest::new(target.clone(), scan_type)?;
    warn_if_missing(&cfg.port_scanner);

    println!("[*] Port scan: {} {} (timeout {}s)", scan_type, target, cfg.port_scan_timeout().as_secs());
    let result = tools::run_port_scan(&request, cfg).await;
    print_outcome(&result.invocation, &result.outcome);

    if let Some(report) = &result.report {
        println!("[+] Host status: {:?}", report.host_status);
        if report.findings.is_empty() {
            println!("[-] No open ports reported.");
        }
        for f in &report.findings {
            println!("    {:>5}/{:<4} {:<14} {} {}", f.port, f.protocol, f.state, f.service,
                f.version.as_deref().unwrap_or(""));
        }
    }

    if let Some(dir) = out {
        write_jsonl(&dir.join("portscan.jsonl"), &[&result])?;
        if let Some(report) = &result.report {
            write_ports_csv(&dir.join("ports.csv"), &result.invocation.target, &report.findings)?;
        }
    }
    Ok(())
}

async fn handle_sqli(cfg: &ReconConfig, url: &str, method: &str, data: Option<String>, out: Option<&Path>) -> anyhow::Result<()> {
    let url = validate_url(url)?;
    let method: HttpMethod = method.parse()?;
    let request = InjectionScanRequest::new(url.clone(), method, data)?;
    warn_if_missing(&cfg.injection_scanner);

    println!("[*] SQL injection scan: {} {} (timeout {}s)", method, url, cfg.injection_scan_timeout().as_secs());
    let result = tools::run_injection_scan(&request, cfg).await;
    print_outcome(&result.invocation, &result.outcome);

    if let Some(findings) = &result.findings {
        if findings.is_empty() {
            println!("[-] No injectable parameters reported.");
        }
        for f in findings {
            match &f.parameter {
                Some(p) => println!("[+] {} (Parameter: {})", f.technique, p),
                None => println!("[+] {}", f.technique),
            }
        }
    }

    if let Some(dir) = out {
        write_jsonl(&dir.join("sqli.jsonl"), &[&result])?;
    }
    Ok(())
}

fn warn_if_missing(program: &str) {
    if !tools::tool_available(program) {
        println!("[!] {} not found on PATH; the scan will fail.", program);
    }
}

fn print_outcome(invocation: &ScanInvocation, outcome: &ScanOutcome) {
    let secs = Duration::from_millis(outcome.elapsed_ms).as_secs_f64();
    match outcome.class {
        ExitClass::Success => println!("[+] {} finished in {:.1}s", invocation.program, secs),
        ExitClass::NonZeroExit => {
            println!("[!] {} exited with code {}; showing partial results",
                invocation.program,
                outcome.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "?".into()));
            if !outcome.stderr.trim().is_empty() {
                println!("    {}", outcome.stderr.trim());
            }
        }
        ExitClass::NotFound => println!(
            "[!] {} command not found. Is it installed and in your PATH?", invocation.program),
        ExitClass::TimedOut => println!(
            "[!] {} timed out after {}s and was terminated", invocation.program, invocation.timeout.as_secs()),
        ExitClass::Cancelled => println!("[!] {} was cancelled", invocation.program),
        ExitClass::Unexpected => println!(
            "[!] {} failed: {}", invocation.program, outcome.error.as_deref().unwrap_or("unknown error")),
    }
}
